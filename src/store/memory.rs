use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::model::*;
use crate::observability::WAL_COMPACTIONS_TOTAL;
use crate::pagination::Pagination;
use crate::wal::Wal;

use super::writer::WalHandle;
use super::{BookingStore, ReviewStore, RoomImageStore, RoomStore, StoreError};

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// In-memory room, booking and review store, durable through an optional WAL.
///
/// Lock order: `write_gate` first, then `catalog_lock`/`review_lock`, then a
/// room's `RwLock`.
pub struct MemoryStore {
    rooms: DashMap<RoomId, SharedRoomState>,
    /// Reverse lookup: booking id → room id.
    booking_to_room: DashMap<BookingId, RoomId>,
    image_to_room: DashMap<ImageId, RoomId>,
    room_numbers: DashMap<String, RoomId>,
    reviews: DashMap<ReviewId, Review>,
    review_by_booking: DashMap<BookingId, ReviewId>,
    /// Serializes room create/update/delete so room-number uniqueness holds.
    catalog_lock: Mutex<()>,
    /// Serializes review writes so the one-review-per-booking check holds.
    review_lock: Mutex<()>,
    /// Mutations hold it shared; compaction holds it exclusively so no append
    /// lands between the snapshot and the file swap.
    write_gate: RwLock<()>,
    wal: Option<WalHandle>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a booking event to the room that owns it (caller holds the lock).
fn apply_to_room(rs: &mut RoomState, event: &Event) {
    match event {
        Event::RoomUpdated { room } => rs.room = room.clone(),
        Event::BookingCreated { booking } => rs.insert_booking(booking.clone()),
        Event::BookingStatusChanged { id, status, .. } => {
            if let Some(b) = rs.booking_mut(id) {
                b.booking_status = *status;
            }
        }
        Event::PaymentStatusChanged { id, status, .. } => {
            if let Some(b) = rs.booking_mut(id) {
                b.payment_status = *status;
            }
        }
        Event::ImageAdded { image } => rs.images.push(image.clone()),
        Event::ImageDeleted { id, .. } => rs.images.retain(|i| i.id != *id),
        Event::RoomImagesCleared { .. } => rs.images.clear(),
        // Room create/delete and reviews live at the map level, not here.
        Event::RoomCreated { .. }
        | Event::RoomDeleted { .. }
        | Event::ReviewCreated { .. }
        | Event::ReviewDeleted { .. } => {}
    }
}

impl MemoryStore {
    /// A store without a WAL; state is lost when it is dropped.
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            booking_to_room: DashMap::new(),
            image_to_room: DashMap::new(),
            room_numbers: DashMap::new(),
            reviews: DashMap::new(),
            review_by_booking: DashMap::new(),
            catalog_lock: Mutex::new(()),
            review_lock: Mutex::new(()),
            write_gate: RwLock::new(()),
            wal: None,
        }
    }

    /// Replay the WAL at `path` and keep appending to it. Spawns the WAL writer,
    /// so this must run inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let mut store = Self::new();
        store.replay(&events);
        store.wal = Some(WalHandle::spawn(wal));
        info!(
            "replayed {} events from {}: {} rooms, {} bookings, {} reviews",
            events.len(),
            path.display(),
            store.room_count(),
            store.booking_count(),
            store.review_count()
        );
        Ok(store)
    }

    /// Rebuild state from events. Room states are assembled unshared first, so
    /// no lock is ever taken.
    fn replay(&mut self, events: &[Event]) {
        let mut rooms: HashMap<RoomId, RoomState> = HashMap::new();
        for event in events {
            match event {
                Event::RoomCreated { room } => {
                    rooms.insert(room.id, RoomState::new(room.clone()));
                }
                Event::RoomDeleted { id } => {
                    rooms.remove(id);
                }
                Event::RoomUpdated { room } => {
                    if let Some(rs) = rooms.get_mut(&room.id) {
                        apply_to_room(rs, event);
                    }
                }
                Event::BookingCreated { booking } => {
                    if let Some(rs) = rooms.get_mut(&booking.room_id) {
                        apply_to_room(rs, event);
                    }
                }
                Event::BookingStatusChanged { room_id, .. }
                | Event::PaymentStatusChanged { room_id, .. } => {
                    if let Some(rs) = rooms.get_mut(room_id) {
                        apply_to_room(rs, event);
                    }
                }
                Event::ImageAdded { image } => {
                    if let Some(rs) = rooms.get_mut(&image.room_id) {
                        apply_to_room(rs, event);
                    }
                }
                Event::ImageDeleted { room_id, .. } | Event::RoomImagesCleared { room_id } => {
                    if let Some(rs) = rooms.get_mut(room_id) {
                        apply_to_room(rs, event);
                    }
                }
                Event::ReviewCreated { review } => {
                    self.review_by_booking.insert(review.booking_id, review.id);
                    self.reviews.insert(review.id, review.clone());
                }
                Event::ReviewDeleted { id, booking_id } => {
                    self.reviews.remove(id);
                    self.review_by_booking.remove(booking_id);
                }
            }
        }

        for (id, rs) in rooms {
            self.room_numbers.insert(rs.room.room_number.clone(), id);
            for booking in &rs.bookings {
                self.booking_to_room.insert(booking.id, id);
            }
            for image in &rs.images {
                self.image_to_room.insert(image.id, id);
            }
            self.rooms.insert(id, Arc::new(RwLock::new(rs)));
        }
    }

    /// Write event to the WAL, if there is one. Caller holds `write_gate`.
    async fn persist(&self, event: &Event) -> Result<(), StoreError> {
        match &self.wal {
            Some(wal) => wal.append(event).await,
            None => Ok(()),
        }
    }

    fn room_state(&self, id: &RoomId) -> Result<SharedRoomState, StoreError> {
        self.rooms
            .get(id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(*id))
    }

    fn room_state_for_booking(&self, id: &BookingId) -> Result<SharedRoomState, StoreError> {
        let room_id = self
            .booking_to_room
            .get(id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound(*id))?;
        self.room_state(&room_id)
    }

    /// False once `delete_room` has unlinked `rs`; anything written to it
    /// would be unreachable and dropped on replay. Caller holds the room lock.
    fn is_attached(&self, room_id: &RoomId, rs: &SharedRoomState) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|e| Arc::ptr_eq(e.value(), rs))
    }

    /// Clone the room handles out of the map so no shard guard is held across `.await`.
    fn all_room_states(&self) -> Vec<SharedRoomState> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    async fn collect_bookings(&self, keep: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut out = Vec::new();
        for rs in self.all_room_states() {
            let guard = rs.read().await;
            out.extend(guard.bookings.iter().filter(|b| keep(b)).cloned());
        }
        out
    }

    async fn set_booking_field(
        &self,
        id: BookingId,
        check: impl FnOnce(&Booking) -> Result<(), StoreError>,
        make_event: impl FnOnce(RoomId) -> Event,
    ) -> Result<(), StoreError> {
        let _gate = self.write_gate.read().await;
        let rs = self.room_state_for_booking(&id)?;
        let mut guard = rs.write().await;
        if !self.is_attached(&guard.room.id, &rs) {
            return Err(StoreError::NotFound(id));
        }
        check(guard.booking(&id).ok_or(StoreError::NotFound(id))?)?;
        let event = make_event(guard.room.id);
        self.persist(&event).await?;
        apply_to_room(&mut guard, &event);
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn booking_count(&self) -> usize {
        self.booking_to_room.len()
    }

    pub fn image_count(&self) -> usize {
        self.image_to_room.len()
    }

    pub fn review_count(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_durable(&self) -> bool {
        self.wal.is_some()
    }

    /// Events that recreate the current state: rooms, their images and their
    /// bookings with current statuses, then reviews.
    pub async fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for rs in self.all_room_states() {
            let guard = rs.read().await;
            events.push(Event::RoomCreated {
                room: guard.room.clone(),
            });
            events.extend(
                guard
                    .images
                    .iter()
                    .map(|image| Event::ImageAdded { image: image.clone() }),
            );
            for booking in &guard.bookings {
                events.push(Event::BookingCreated {
                    booking: booking.clone(),
                });
            }
        }
        let mut reviews: Vec<Review> = self.reviews.iter().map(|e| e.value().clone()).collect();
        reviews.sort_by_key(|r| r.id);
        events.extend(reviews.into_iter().map(|review| Event::ReviewCreated { review }));
        events
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let Some(wal) = &self.wal else {
            return Ok(());
        };
        let _gate = self.write_gate.write().await;
        let events = self.snapshot().await;
        let count = events.len();
        wal.compact(events).await?;
        metrics::counter!(WAL_COMPACTIONS_TOTAL).increment(1);
        info!("compacted WAL to {count} events");
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        match &self.wal {
            Some(wal) => wal.appends_since_compact().await,
            None => 0,
        }
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        let _gate = self.write_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        if self.room_numbers.contains_key(&room.room_number) {
            return Err(StoreError::Duplicate(room.room_number));
        }
        if self.rooms.contains_key(&room.id) {
            return Err(StoreError::Duplicate(room.id.to_string()));
        }
        let event = Event::RoomCreated { room: room.clone() };
        self.persist(&event).await?;
        self.room_numbers.insert(room.room_number.clone(), room.id);
        self.rooms.insert(room.id, Arc::new(RwLock::new(RoomState::new(room))));
        Ok(())
    }

    async fn update_room(&self, room: Room) -> Result<(), StoreError> {
        let _gate = self.write_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        let rs = self.room_state(&room.id)?;
        if let Some(owner) = self.room_numbers.get(&room.room_number).map(|e| *e.value())
            && owner != room.id
        {
            return Err(StoreError::Duplicate(room.room_number));
        }
        let mut guard = rs.write().await;
        let old_number = guard.room.room_number.clone();
        let event = Event::RoomUpdated { room };
        self.persist(&event).await?;
        apply_to_room(&mut guard, &event);
        if old_number != guard.room.room_number {
            self.room_numbers.remove(&old_number);
            self.room_numbers
                .insert(guard.room.room_number.clone(), guard.room.id);
        }
        Ok(())
    }

    async fn delete_room(&self, id: RoomId) -> Result<(), StoreError> {
        let _gate = self.write_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        let rs = self.room_state(&id)?;
        let guard = rs.write().await;
        if !guard.bookings.is_empty() {
            return Err(StoreError::InUse(id));
        }
        let event = Event::RoomDeleted { id };
        self.persist(&event).await?;
        for image in &guard.images {
            self.image_to_room.remove(&image.id);
        }
        self.room_numbers.remove(&guard.room.room_number);
        self.rooms.remove(&id);
        Ok(())
    }

    async fn find_room(&self, id: RoomId) -> Result<Room, StoreError> {
        let rs = self.room_state(&id)?;
        let guard = rs.read().await;
        Ok(guard.room.clone())
    }

    async fn list_rooms(&self, page: &Pagination) -> Result<Vec<Room>, StoreError> {
        let mut rooms = Vec::with_capacity(self.rooms.len());
        for rs in self.all_room_states() {
            rooms.push(rs.read().await.room.clone());
        }
        Ok(page.apply(rooms))
    }

    async fn list_available_rooms(
        &self,
        span: DateSpan,
        exclude: &[BookingStatus],
        page: &Pagination,
    ) -> Result<Vec<Room>, StoreError> {
        let mut rooms = Vec::new();
        for rs in self.all_room_states() {
            let guard = rs.read().await;
            if guard.room.status == RoomStatus::Available
                && guard.first_conflict(&span, exclude).is_none()
            {
                rooms.push(guard.room.clone());
            }
        }
        Ok(page.apply(rooms))
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, booking: Booking) -> Result<BookingId, StoreError> {
        let _gate = self.write_gate.read().await;
        let rs = self.room_state(&booking.room_id)?;
        let mut guard = rs.write().await;
        if !self.is_attached(&booking.room_id, &rs) {
            return Err(StoreError::NotFound(booking.room_id));
        }

        if booking.reserves_room()
            && let Some(existing) = guard.first_conflict(&booking.span, NON_RESERVING)
        {
            return Err(StoreError::Conflict(existing.id));
        }

        let (id, room_id) = (booking.id, booking.room_id);
        let event = Event::BookingCreated { booking };
        self.persist(&event).await?;
        apply_to_room(&mut guard, &event);
        self.booking_to_room.insert(id, room_id);
        Ok(id)
    }

    async fn find_booking(&self, id: BookingId) -> Result<Booking, StoreError> {
        let rs = self.room_state_for_booking(&id)?;
        let guard = rs.read().await;
        guard.booking(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn update_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        let check = |b: &Booking| {
            if b.booking_status.can_become(status) {
                Ok(())
            } else {
                Err(StoreError::IllegalTransition {
                    id,
                    from: b.booking_status,
                    to: status,
                })
            }
        };
        self.set_booking_field(id, check, |room_id| Event::BookingStatusChanged {
            id,
            room_id,
            status,
        })
        .await
    }

    async fn update_payment_status(
        &self,
        id: BookingId,
        status: PaymentStatus,
    ) -> Result<(), StoreError> {
        self.set_booking_field(id, |_| Ok(()), |room_id| Event::PaymentStatusChanged {
            id,
            room_id,
            status,
        })
        .await
    }

    async fn list_bookings_by_user(
        &self,
        user_id: UserId,
        page: &Pagination,
    ) -> Result<Vec<Booking>, StoreError> {
        let bookings = self.collect_bookings(|b| b.user_id == user_id).await;
        Ok(page.apply(bookings))
    }

    async fn list_bookings(&self, page: &Pagination) -> Result<Vec<Booking>, StoreError> {
        let bookings = self.collect_bookings(|_| true).await;
        Ok(page.apply(bookings))
    }

    async fn exists_overlap(
        &self,
        room_id: RoomId,
        span: DateSpan,
        exclude: &[BookingStatus],
    ) -> Result<bool, StoreError> {
        let rs = match self.rooms.get(&room_id) {
            Some(e) => e.value().clone(),
            None => return Ok(false),
        };
        let guard = rs.read().await;
        Ok(guard.first_conflict(&span, exclude).is_some())
    }
}

#[async_trait]
impl RoomImageStore for MemoryStore {
    async fn insert_image(&self, image: RoomImage) -> Result<ImageId, StoreError> {
        let _gate = self.write_gate.read().await;
        let rs = self.room_state(&image.room_id)?;
        let mut guard = rs.write().await;
        if !self.is_attached(&image.room_id, &rs) {
            return Err(StoreError::NotFound(image.room_id));
        }
        let (id, room_id) = (image.id, image.room_id);
        let event = Event::ImageAdded { image };
        self.persist(&event).await?;
        apply_to_room(&mut guard, &event);
        self.image_to_room.insert(id, room_id);
        Ok(id)
    }

    async fn find_image(&self, id: ImageId) -> Result<RoomImage, StoreError> {
        let room_id = self
            .image_to_room
            .get(&id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound(id))?;
        let rs = self.room_state(&room_id)?;
        let guard = rs.read().await;
        guard
            .images
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_images_by_room(&self, room_id: RoomId) -> Result<Vec<RoomImage>, StoreError> {
        let rs = self.room_state(&room_id)?;
        let guard = rs.read().await;
        Ok(guard.images.clone())
    }

    async fn delete_image(&self, id: ImageId) -> Result<(), StoreError> {
        let _gate = self.write_gate.read().await;
        let room_id = self
            .image_to_room
            .get(&id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound(id))?;
        let rs = self.room_state(&room_id)?;
        let mut guard = rs.write().await;
        if !self.is_attached(&room_id, &rs) || !guard.images.iter().any(|i| i.id == id) {
            return Err(StoreError::NotFound(id));
        }
        let event = Event::ImageDeleted { id, room_id };
        self.persist(&event).await?;
        apply_to_room(&mut guard, &event);
        self.image_to_room.remove(&id);
        Ok(())
    }

    async fn delete_images_by_room(&self, room_id: RoomId) -> Result<usize, StoreError> {
        let _gate = self.write_gate.read().await;
        let rs = self.room_state(&room_id)?;
        let mut guard = rs.write().await;
        if !self.is_attached(&room_id, &rs) {
            return Err(StoreError::NotFound(room_id));
        }
        let removed = guard.images.len();
        if removed == 0 {
            return Ok(0);
        }
        let event = Event::RoomImagesCleared { room_id };
        self.persist(&event).await?;
        for image in &guard.images {
            self.image_to_room.remove(&image.id);
        }
        apply_to_room(&mut guard, &event);
        Ok(removed)
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_review(&self, review: Review) -> Result<ReviewId, StoreError> {
        let _gate = self.write_gate.read().await;
        let _reviews = self.review_lock.lock().await;
        if let Some(existing) = self
            .review_by_booking
            .get(&review.booking_id)
            .map(|e| *e.value())
        {
            return Err(StoreError::Conflict(existing));
        }
        if !self.booking_to_room.contains_key(&review.booking_id) {
            return Err(StoreError::NotFound(review.booking_id));
        }
        let event = Event::ReviewCreated {
            review: review.clone(),
        };
        self.persist(&event).await?;
        let id = review.id;
        self.review_by_booking.insert(review.booking_id, id);
        self.reviews.insert(id, review);
        Ok(id)
    }

    async fn find_review(&self, id: ReviewId) -> Result<Review, StoreError> {
        self.reviews
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn find_review_by_booking(&self, booking_id: BookingId) -> Result<Review, StoreError> {
        let id = self
            .review_by_booking
            .get(&booking_id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound(booking_id))?;
        self.find_review(id).await
    }

    async fn list_reviews_by_room(
        &self,
        room_id: RoomId,
        page: &Pagination,
    ) -> Result<Vec<Review>, StoreError> {
        let reviews: Vec<Review> = self
            .reviews
            .iter()
            .filter(|e| {
                self.booking_to_room
                    .get(&e.value().booking_id)
                    .is_some_and(|r| *r.value() == room_id)
            })
            .map(|e| e.value().clone())
            .collect();
        Ok(page.apply(reviews))
    }

    async fn list_reviews_by_user(
        &self,
        user_id: UserId,
        page: &Pagination,
    ) -> Result<Vec<Review>, StoreError> {
        let reviews: Vec<Review> = self
            .reviews
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(page.apply(reviews))
    }

    async fn delete_review(&self, id: ReviewId) -> Result<(), StoreError> {
        let _gate = self.write_gate.read().await;
        let _reviews = self.review_lock.lock().await;
        let booking_id = self
            .reviews
            .get(&id)
            .map(|e| e.value().booking_id)
            .ok_or(StoreError::NotFound(id))?;
        let event = Event::ReviewDeleted { id, booking_id };
        self.persist(&event).await?;
        self.reviews.remove(&id);
        self.review_by_booking.remove(&booking_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{Direction, Sort, SortField};
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn span(a: &str, b: &str) -> DateSpan {
        DateSpan::new(
            NaiveDate::parse_from_str(a, "%Y-%m-%d").unwrap(),
            NaiveDate::parse_from_str(b, "%Y-%m-%d").unwrap(),
        )
    }

    fn room(number: &str) -> Room {
        Room {
            id: Ulid::new(),
            room_number: number.into(),
            room_type: "double".into(),
            price: 10_000,
            description: String::new(),
            status: RoomStatus::Available,
            max_occupancy: 2,
            created_at: 0,
        }
    }

    fn booking(room_id: RoomId, s: DateSpan) -> Booking {
        Booking {
            id: Ulid::new(),
            user_id: Ulid::new(),
            room_id,
            span: s,
            total_price: 10_000,
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            booking_status: BookingStatus::Confirmed,
            created_at: 0,
        }
    }

    fn all() -> Pagination {
        Pagination::unbounded(Sort::default())
    }

    #[tokio::test]
    async fn room_number_unique() {
        let store = MemoryStore::new();
        store.insert_room(room("101")).await.unwrap();
        let err = store.insert_room(room("101")).await.unwrap_err();
        assert_eq!(err, StoreError::Duplicate("101".into()));
    }

    #[tokio::test]
    async fn update_room_renumbers_index() {
        let store = MemoryStore::new();
        let mut r = room("101");
        store.insert_room(r.clone()).await.unwrap();
        let other = room("102");
        store.insert_room(other).await.unwrap();

        r.room_number = "102".into();
        assert!(matches!(
            store.update_room(r.clone()).await,
            Err(StoreError::Duplicate(_))
        ));

        r.room_number = "201".into();
        store.update_room(r.clone()).await.unwrap();
        // The old number is free again.
        store.insert_room(room("101")).await.unwrap();
        assert_eq!(store.find_room(r.id).await.unwrap().room_number, "201");
    }

    #[tokio::test]
    async fn exclusion_constraint_on_insert() {
        let store = MemoryStore::new();
        let r = room("101");
        store.insert_room(r.clone()).await.unwrap();

        let first = booking(r.id, span("2024-01-01", "2024-01-05"));
        let first_id = store.insert_booking(first).await.unwrap();

        let clash = booking(r.id, span("2024-01-04", "2024-01-06"));
        assert_eq!(
            store.insert_booking(clash).await,
            Err(StoreError::Conflict(first_id))
        );

        // Same-day turnover is fine.
        let next = booking(r.id, span("2024-01-05", "2024-01-06"));
        store.insert_booking(next).await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_booking_frees_the_room() {
        let store = MemoryStore::new();
        let r = room("101");
        store.insert_room(r.clone()).await.unwrap();
        let b = booking(r.id, span("2024-01-01", "2024-01-05"));
        let id = store.insert_booking(b).await.unwrap();

        let s = span("2024-01-02", "2024-01-03");
        assert!(store.exists_overlap(r.id, s, NON_RESERVING).await.unwrap());
        store
            .update_booking_status(id, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert!(!store.exists_overlap(r.id, s, NON_RESERVING).await.unwrap());
        store.insert_booking(booking(r.id, s)).await.unwrap();
    }

    #[tokio::test]
    async fn paid_status_alone_does_not_block() {
        let store = MemoryStore::new();
        let r = room("101");
        store.insert_room(r.clone()).await.unwrap();
        let id = store
            .insert_booking(booking(r.id, span("2024-01-01", "2024-01-05")))
            .await
            .unwrap();
        store
            .update_payment_status(id, PaymentStatus::Paid)
            .await
            .unwrap();
        store
            .update_booking_status(id, BookingStatus::Completed)
            .await
            .unwrap();
        assert!(
            !store
                .exists_overlap(r.id, span("2024-01-02", "2024-01-03"), NON_RESERVING)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn exists_overlap_unknown_room_is_false() {
        let store = MemoryStore::new();
        let result = store
            .exists_overlap(Ulid::new(), span("2024-01-01", "2024-01-02"), NON_RESERVING)
            .await;
        assert_eq!(result, Ok(false));
    }

    #[tokio::test]
    async fn delete_room_with_bookings_rejected() {
        let store = MemoryStore::new();
        let r = room("101");
        store.insert_room(r.clone()).await.unwrap();
        store
            .insert_booking(booking(r.id, span("2024-01-01", "2024-01-02")))
            .await
            .unwrap();
        assert_eq!(store.delete_room(r.id).await, Err(StoreError::InUse(r.id)));

        let empty = room("102");
        store.insert_room(empty.clone()).await.unwrap();
        store.delete_room(empty.id).await.unwrap();
        assert_eq!(
            store.find_room(empty.id).await,
            Err(StoreError::NotFound(empty.id))
        );
    }

    #[tokio::test]
    async fn one_review_per_booking() {
        let store = MemoryStore::new();
        let r = room("101");
        store.insert_room(r.clone()).await.unwrap();
        let b = booking(r.id, span("2024-01-01", "2024-01-02"));
        let (booking_id, user_id) = (b.id, b.user_id);
        store.insert_booking(b).await.unwrap();

        let review = Review {
            id: Ulid::new(),
            booking_id,
            user_id,
            rating: 4,
            comment: None,
            created_at: 0,
        };
        let first = store.insert_review(review.clone()).await.unwrap();
        let again = Review {
            id: Ulid::new(),
            ..review
        };
        assert_eq!(
            store.insert_review(again).await,
            Err(StoreError::Conflict(first))
        );

        store.delete_review(first).await.unwrap();
        assert_eq!(
            store.find_review_by_booking(booking_id).await,
            Err(StoreError::NotFound(booking_id))
        );
    }

    #[tokio::test]
    async fn reviews_filtered_by_room_and_user() {
        let store = MemoryStore::new();
        let (a, b) = (room("101"), room("102"));
        store.insert_room(a.clone()).await.unwrap();
        store.insert_room(b.clone()).await.unwrap();

        let ba = booking(a.id, span("2024-01-01", "2024-01-02"));
        let bb = booking(b.id, span("2024-01-01", "2024-01-02"));
        for bk in [&ba, &bb] {
            store.insert_booking(bk.clone()).await.unwrap();
            store
                .insert_review(Review {
                    id: Ulid::new(),
                    booking_id: bk.id,
                    user_id: bk.user_id,
                    rating: 5,
                    comment: Some("lovely".into()),
                    created_at: 0,
                })
                .await
                .unwrap();
        }

        let for_a = store.list_reviews_by_room(a.id, &all()).await.unwrap();
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].booking_id, ba.id);

        let by_user = store.list_reviews_by_user(bb.user_id, &all()).await.unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].booking_id, bb.id);
    }

    #[tokio::test]
    async fn available_rooms_skip_maintenance_and_booked() {
        let store = MemoryStore::new();
        let free = room("101");
        let taken = room("102");
        let mut closed = room("103");
        closed.status = RoomStatus::Maintenance;
        for r in [&free, &taken, &closed] {
            store.insert_room(r.clone()).await.unwrap();
        }
        store
            .insert_booking(booking(taken.id, span("2024-01-01", "2024-01-10")))
            .await
            .unwrap();

        let page = Pagination::unbounded(Sort::new(SortField::RoomNumber, Direction::Asc));
        let rooms = store
            .list_available_rooms(span("2024-01-05", "2024-01-06"), NON_RESERVING, &page)
            .await
            .unwrap();
        let numbers: Vec<_> = rooms.into_iter().map(|r| r.room_number).collect();
        assert_eq!(numbers, vec!["101"]);
    }

    #[tokio::test]
    async fn wal_replay_restores_state() {
        let path = test_wal_path("replay.wal");
        let r = room("101");
        let b = booking(r.id, span("2024-01-01", "2024-01-03"));
        let review = Review {
            id: Ulid::new(),
            booking_id: b.id,
            user_id: b.user_id,
            rating: 3,
            comment: None,
            created_at: 0,
        };

        {
            let store = MemoryStore::open(&path).unwrap();
            assert!(store.is_durable());
            store.insert_room(r.clone()).await.unwrap();
            store.insert_booking(b.clone()).await.unwrap();
            store
                .update_payment_status(b.id, PaymentStatus::Paid)
                .await
                .unwrap();
            store
                .update_booking_status(b.id, BookingStatus::Completed)
                .await
                .unwrap();
            store.insert_review(review.clone()).await.unwrap();
        }

        let store = MemoryStore::open(&path).unwrap();
        assert_eq!(store.room_count(), 1);
        let restored = store.find_booking(b.id).await.unwrap();
        assert_eq!(restored.payment_status, PaymentStatus::Paid);
        assert_eq!(restored.booking_status, BookingStatus::Completed);
        assert_eq!(store.find_review_by_booking(b.id).await.unwrap(), review);
        // Room-number index is rebuilt too.
        assert!(matches!(
            store.insert_room(room("101")).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn compaction_preserves_state() {
        let path = test_wal_path("compact.wal");
        let r = room("101");
        let b = booking(r.id, span("2024-01-01", "2024-01-03"));

        {
            let store = MemoryStore::open(&path).unwrap();
            store.insert_room(r.clone()).await.unwrap();
            store.insert_booking(b.clone()).await.unwrap();
            for _ in 0..10 {
                store
                    .update_payment_status(b.id, PaymentStatus::Failed)
                    .await
                    .unwrap();
                store
                    .update_payment_status(b.id, PaymentStatus::Pending)
                    .await
                    .unwrap();
            }
            assert_eq!(store.appends_since_compact().await, 22);
            let before = std::fs::metadata(&path).unwrap().len();
            store.compact().await.unwrap();
            let after = std::fs::metadata(&path).unwrap().len();
            assert!(after < before, "compacted WAL should be smaller: {after} < {before}");
            assert_eq!(store.appends_since_compact().await, 0);
        }

        let store = MemoryStore::open(&path).unwrap();
        assert_eq!(store.find_booking(b.id).await.unwrap(), b);
        assert_eq!(store.find_room(r.id).await.unwrap(), r);
    }

    #[tokio::test]
    async fn terminal_bookings_stay_terminal() {
        use BookingStatus::*;
        let store = MemoryStore::new();
        let r = room("101");
        store.insert_room(r.clone()).await.unwrap();

        let cancelled = store
            .insert_booking(booking(r.id, span("2024-01-01", "2024-01-05")))
            .await
            .unwrap();
        store.update_booking_status(cancelled, Cancelled).await.unwrap();
        // Another guest takes the freed nights.
        store
            .insert_booking(booking(r.id, span("2024-01-02", "2024-01-04")))
            .await
            .unwrap();

        let completed = store
            .insert_booking(booking(r.id, span("2024-02-01", "2024-02-03")))
            .await
            .unwrap();
        store.update_booking_status(completed, Completed).await.unwrap();

        for (id, from) in [(cancelled, Cancelled), (completed, Completed)] {
            for to in [Confirmed, Cancelled, Completed] {
                assert_eq!(
                    store.update_booking_status(id, to).await,
                    Err(StoreError::IllegalTransition { id, from, to })
                );
            }
            assert_eq!(store.find_booking(id).await.unwrap().booking_status, from);
        }
        // The cancelled stay still holds nothing.
        assert!(
            !store
                .exists_overlap(r.id, span("2024-01-01", "2024-01-02"), NON_RESERVING)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn confirmed_to_confirmed_rejected() {
        let store = MemoryStore::new();
        let r = room("101");
        store.insert_room(r.clone()).await.unwrap();
        let id = store
            .insert_booking(booking(r.id, span("2024-01-01", "2024-01-02")))
            .await
            .unwrap();
        assert!(matches!(
            store.update_booking_status(id, BookingStatus::Confirmed).await,
            Err(StoreError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn booking_never_lands_in_a_deleted_room() {
        let store = Arc::new(MemoryStore::new());
        let r = room("101");
        store.insert_room(r.clone()).await.unwrap();

        // Hold the room so the delete queues on its lock ahead of the insert.
        let rs = store.room_state(&r.id).unwrap();
        let held = rs.read().await;
        let deleter = {
            let store = store.clone();
            let room_id = r.id;
            tokio::spawn(async move { store.delete_room(room_id).await })
        };
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        let inserter = {
            let store = store.clone();
            let b = booking(r.id, span("2024-01-01", "2024-01-03"));
            tokio::spawn(async move { store.insert_booking(b).await })
        };
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        drop(held);

        assert_eq!(deleter.await.unwrap(), Ok(()));
        assert_eq!(inserter.await.unwrap(), Err(StoreError::NotFound(r.id)));
        assert_eq!(store.booking_count(), 0);
        assert_eq!(store.find_room(r.id).await, Err(StoreError::NotFound(r.id)));
    }

    fn image(room_id: RoomId, url: &str) -> RoomImage {
        RoomImage {
            id: Ulid::new(),
            room_id,
            url: url.into(),
            is_primary: false,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn images_follow_their_room() {
        let store = MemoryStore::new();
        let r = room("101");
        store.insert_room(r.clone()).await.unwrap();

        let front = store.insert_image(image(r.id, "https://cdn/101/a.jpg")).await.unwrap();
        let back = store.insert_image(image(r.id, "https://cdn/101/b.jpg")).await.unwrap();
        let urls: Vec<_> = store
            .list_images_by_room(r.id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.url)
            .collect();
        assert_eq!(urls, vec!["https://cdn/101/a.jpg", "https://cdn/101/b.jpg"]);

        store.delete_image(front).await.unwrap();
        assert_eq!(store.find_image(front).await, Err(StoreError::NotFound(front)));
        assert_eq!(store.delete_image(front).await, Err(StoreError::NotFound(front)));
        assert_eq!(store.find_image(back).await.unwrap().room_id, r.id);

        let missing = Ulid::new();
        assert_eq!(
            store.insert_image(image(missing, "x")).await,
            Err(StoreError::NotFound(missing))
        );

        store.insert_image(image(r.id, "https://cdn/101/c.jpg")).await.unwrap();
        assert_eq!(store.delete_images_by_room(r.id).await, Ok(2));
        assert_eq!(store.delete_images_by_room(r.id).await, Ok(0));
        assert_eq!(store.image_count(), 0);
    }

    #[tokio::test]
    async fn deleting_a_room_drops_its_images() {
        let store = MemoryStore::new();
        let r = room("101");
        store.insert_room(r.clone()).await.unwrap();
        let id = store.insert_image(image(r.id, "https://cdn/101/a.jpg")).await.unwrap();

        store.delete_room(r.id).await.unwrap();
        assert_eq!(store.find_image(id).await, Err(StoreError::NotFound(id)));
        assert_eq!(store.image_count(), 0);
    }

    #[tokio::test]
    async fn images_survive_replay_and_compaction() {
        let path = test_wal_path("images.wal");
        let r = room("101");
        let kept = image(r.id, "https://cdn/101/kept.jpg");

        {
            let store = MemoryStore::open(&path).unwrap();
            store.insert_room(r.clone()).await.unwrap();
            let dropped = store.insert_image(image(r.id, "https://cdn/101/old.jpg")).await.unwrap();
            store.insert_image(kept.clone()).await.unwrap();
            store.delete_image(dropped).await.unwrap();
        }
        {
            let store = MemoryStore::open(&path).unwrap();
            assert_eq!(store.list_images_by_room(r.id).await.unwrap(), vec![kept.clone()]);
            store.compact().await.unwrap();
        }

        let store = MemoryStore::open(&path).unwrap();
        assert_eq!(store.find_image(kept.id).await.unwrap(), kept);
        assert_eq!(store.image_count(), 1);
    }
}
