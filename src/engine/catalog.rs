use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::pagination::PageRequest;
use crate::store::StoreError;

use super::error::or_not_found;
use super::pricing::parse_stay;
use super::{BookingError, Engine, now_ms, track};

/// Trim text fields and check every room invariant.
fn validate_room(fields: NewRoom) -> Result<NewRoom, BookingError> {
    let room_number = fields.room_number.trim().to_string();
    let room_type = fields.room_type.trim().to_string();
    if room_number.is_empty() {
        return Err(BookingError::InvalidRoom("room number is required"));
    }
    if room_number.len() > MAX_ROOM_NUMBER_LEN {
        return Err(BookingError::LimitExceeded("room number too long"));
    }
    if room_type.is_empty() {
        return Err(BookingError::InvalidRoom("room type is required"));
    }
    if room_type.len() > MAX_ROOM_TYPE_LEN {
        return Err(BookingError::LimitExceeded("room type too long"));
    }
    if fields.description.len() > MAX_DESCRIPTION_LEN {
        return Err(BookingError::LimitExceeded("description too long"));
    }
    if fields.price == 0 {
        return Err(BookingError::InvalidRoom("price must be positive"));
    }
    if fields.max_occupancy == 0 {
        return Err(BookingError::InvalidRoom("max occupancy must be at least 1"));
    }
    Ok(NewRoom {
        room_number,
        room_type,
        ..fields
    })
}

fn catalog_error(e: StoreError) -> BookingError {
    match e {
        StoreError::NotFound(id) => BookingError::RoomNotFound(id),
        StoreError::Duplicate(number) => BookingError::RoomNumberTaken(number),
        StoreError::InUse(id) => BookingError::RoomInUse(id),
        other => other.into(),
    }
}

impl Engine {
    /// Add a room to the catalog in `available` status.
    pub async fn create_room(&self, fields: NewRoom) -> Result<Room, BookingError> {
        track(self.try_create_room(fields).await)
    }

    async fn try_create_room(&self, fields: NewRoom) -> Result<Room, BookingError> {
        let fields = validate_room(fields)?;
        let room = Room {
            id: Ulid::new(),
            room_number: fields.room_number,
            room_type: fields.room_type,
            price: fields.price,
            description: fields.description,
            status: RoomStatus::Available,
            max_occupancy: fields.max_occupancy,
            created_at: now_ms(),
        };
        self.rooms
            .insert_room(room.clone())
            .await
            .map_err(catalog_error)?;
        Ok(room)
    }

    /// Replace a room's editable fields and status. Existing bookings keep the
    /// price they were created with.
    pub async fn update_room(
        &self,
        room_id: RoomId,
        fields: NewRoom,
        status: RoomStatus,
    ) -> Result<Room, BookingError> {
        track(self.try_update_room(room_id, fields, status).await)
    }

    async fn try_update_room(
        &self,
        room_id: RoomId,
        fields: NewRoom,
        status: RoomStatus,
    ) -> Result<Room, BookingError> {
        let current = self.get_room(room_id).await?;
        let fields = validate_room(fields)?;
        let room = Room {
            room_number: fields.room_number,
            room_type: fields.room_type,
            price: fields.price,
            description: fields.description,
            status,
            max_occupancy: fields.max_occupancy,
            ..current
        };
        self.rooms
            .update_room(room.clone())
            .await
            .map_err(catalog_error)?;
        Ok(room)
    }

    /// Remove a room that has never been booked, together with its images.
    pub async fn delete_room(&self, room_id: RoomId) -> Result<(), BookingError> {
        track(self.try_delete_room(room_id).await)
    }

    async fn try_delete_room(&self, room_id: RoomId) -> Result<(), BookingError> {
        let lock = self.room_lock(room_id);
        let _room_guard = lock.lock().await;
        self.rooms
            .delete_room(room_id)
            .await
            .map_err(catalog_error)?;
        self.room_locks.remove(&room_id);
        Ok(())
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<Room, BookingError> {
        self.rooms
            .find_room(room_id)
            .await
            .map_err(or_not_found(BookingError::RoomNotFound))
    }

    pub async fn list_rooms(&self, req: &PageRequest) -> Result<Vec<Room>, BookingError> {
        let page = self.page_for::<Room>(req)?;
        Ok(self.rooms.list_rooms(&page).await?)
    }

    /// Rooms in `available` status with no confirmed booking overlapping the stay.
    pub async fn list_available_rooms(
        &self,
        check_in: &str,
        check_out: &str,
        req: &PageRequest,
    ) -> Result<Vec<Room>, BookingError> {
        let span = parse_stay(check_in, check_out, &self.config.date_format)?;
        let page = self.page_for::<Room>(req)?;
        Ok(self
            .rooms
            .list_available_rooms(span, NON_RESERVING, &page)
            .await?)
    }
}
