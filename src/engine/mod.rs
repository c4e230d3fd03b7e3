//! Booking availability and lifecycle engine.
//!
//! The engine decides whether a stay can be accepted, prices it, and guards
//! the booking and review state machines. Persistence is delegated to the
//! store traits; the engine holds no room or booking state of its own.

mod bookings;
mod catalog;
mod error;
mod images;
mod overlap;
mod pricing;
mod queries;
mod reviews;

pub use error::{BookingError, ErrorKind};
pub use pricing::{Quote, compute_price, nights, parse_dates, parse_stay, price_stay};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::model::{Ms, RoomId};
use crate::observability::record_error;
use crate::store::{BookingStore, MemoryStore, ReviewStore, RoomImageStore, RoomStore};

pub struct Engine {
    rooms: Arc<dyn RoomStore>,
    images: Arc<dyn RoomImageStore>,
    bookings: Arc<dyn BookingStore>,
    reviews: Arc<dyn ReviewStore>,
    config: EngineConfig,
    /// Held from the overlap check through the insert, around booking status
    /// writes and around room deletion, so same-room decisions never interleave.
    room_locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(
        rooms: Arc<dyn RoomStore>,
        images: Arc<dyn RoomImageStore>,
        bookings: Arc<dyn BookingStore>,
        reviews: Arc<dyn ReviewStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            rooms,
            images,
            bookings,
            reviews,
            config,
            room_locks: DashMap::new(),
        }
    }

    /// Engine backed by a single `MemoryStore` for every collaborator.
    pub fn with_store(store: Arc<MemoryStore>, config: EngineConfig) -> Self {
        Self::new(store.clone(), store.clone(), store.clone(), store, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn room_lock(&self, room_id: RoomId) -> Arc<Mutex<()>> {
        self.room_locks.entry(room_id).or_default().value().clone()
    }
}

pub(crate) fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

/// Count the failure, if any, and pass the result through.
fn track<T>(result: Result<T, BookingError>) -> Result<T, BookingError> {
    if let Err(e) = &result {
        record_error(e.kind());
    }
    result
}
