//! Persistence collaborators consumed by the engine.
//!
//! The engine only talks to these traits. `MemoryStore` is the bundled
//! implementation: in-memory indexes made durable by a write-ahead log.

mod memory;
mod writer;

pub use memory::{MemoryStore, SharedRoomState};

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::*;
use crate::pagination::Pagination;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(Ulid),
    /// Write rejected by an exclusion or one-per-parent constraint; carries the
    /// id of the record already holding the slot.
    #[error("conflicts with existing record: {0}")]
    Conflict(Ulid),
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("record still referenced: {0}")]
    InUse(Ulid),
    /// Booking status change out of a terminal state, or to a non-terminal one.
    #[error("booking {id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: Ulid,
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("WAL error: {0}")]
    Wal(String),
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Fails with `Duplicate` if the room number is taken.
    async fn insert_room(&self, room: Room) -> Result<(), StoreError>;

    /// Replace a room record. Fails with `Duplicate` if the new room number
    /// belongs to another room.
    async fn update_room(&self, room: Room) -> Result<(), StoreError>;

    /// Fails with `InUse` while any booking references the room. The room's
    /// images go with it.
    async fn delete_room(&self, id: RoomId) -> Result<(), StoreError>;

    async fn find_room(&self, id: RoomId) -> Result<Room, StoreError>;

    async fn list_rooms(&self, page: &Pagination) -> Result<Vec<Room>, StoreError>;

    /// Rooms in `available` status with no booking outside `exclude` overlapping `span`.
    async fn list_available_rooms(
        &self,
        span: DateSpan,
        exclude: &[BookingStatus],
        page: &Pagination,
    ) -> Result<Vec<Room>, StoreError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Exclusion constraint: a room-reserving booking overlapping another
    /// room-reserving booking on the same room fails with `Conflict`.
    async fn insert_booking(&self, booking: Booking) -> Result<BookingId, StoreError>;

    async fn find_booking(&self, id: BookingId) -> Result<Booking, StoreError>;

    /// Fails with `IllegalTransition` unless the booking is confirmed and
    /// `status` is cancelled or completed.
    async fn update_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), StoreError>;

    async fn update_payment_status(
        &self,
        id: BookingId,
        status: PaymentStatus,
    ) -> Result<(), StoreError>;

    async fn list_bookings_by_user(
        &self,
        user_id: UserId,
        page: &Pagination,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn list_bookings(&self, page: &Pagination) -> Result<Vec<Booking>, StoreError>;

    /// True if a booking on `room_id` whose status is not in `exclude` intersects `span`.
    async fn exists_overlap(
        &self,
        room_id: RoomId,
        span: DateSpan,
        exclude: &[BookingStatus],
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait RoomImageStore: Send + Sync {
    /// Fails with `NotFound` if the image's room does not exist.
    async fn insert_image(&self, image: RoomImage) -> Result<ImageId, StoreError>;

    async fn find_image(&self, id: ImageId) -> Result<RoomImage, StoreError>;

    /// Images of a room in upload order.
    async fn list_images_by_room(&self, room_id: RoomId) -> Result<Vec<RoomImage>, StoreError>;

    async fn delete_image(&self, id: ImageId) -> Result<(), StoreError>;

    /// Returns how many images were removed.
    async fn delete_images_by_room(&self, room_id: RoomId) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Fails with `Conflict` if the booking already has a review.
    async fn insert_review(&self, review: Review) -> Result<ReviewId, StoreError>;

    async fn find_review(&self, id: ReviewId) -> Result<Review, StoreError>;

    async fn find_review_by_booking(&self, booking_id: BookingId) -> Result<Review, StoreError>;

    async fn list_reviews_by_room(
        &self,
        room_id: RoomId,
        page: &Pagination,
    ) -> Result<Vec<Review>, StoreError>;

    async fn list_reviews_by_user(
        &self,
        user_id: UserId,
        page: &Pagination,
    ) -> Result<Vec<Review>, StoreError>;

    async fn delete_review(&self, id: ReviewId) -> Result<(), StoreError>;
}
