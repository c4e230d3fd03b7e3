use ulid::Ulid;

use crate::limits::MAX_IMAGE_URL_LEN;
use crate::model::*;

use super::error::or_not_found;
use super::{BookingError, Engine, now_ms, track};

impl Engine {
    /// Attach an image URL to an existing room.
    pub async fn add_room_image(
        &self,
        room_id: RoomId,
        url: &str,
        is_primary: bool,
    ) -> Result<RoomImage, BookingError> {
        track(self.try_add_room_image(room_id, url, is_primary).await)
    }

    async fn try_add_room_image(
        &self,
        room_id: RoomId,
        url: &str,
        is_primary: bool,
    ) -> Result<RoomImage, BookingError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(BookingError::InvalidImage("image url is required"));
        }
        if url.len() > MAX_IMAGE_URL_LEN {
            return Err(BookingError::LimitExceeded("image url too long"));
        }
        let image = RoomImage {
            id: Ulid::new(),
            room_id,
            url: url.to_string(),
            is_primary,
            created_at: now_ms(),
        };
        self.images
            .insert_image(image.clone())
            .await
            .map_err(or_not_found(BookingError::RoomNotFound))?;
        Ok(image)
    }

    pub async fn delete_room_image(&self, image_id: ImageId) -> Result<(), BookingError> {
        track(
            self.images
                .delete_image(image_id)
                .await
                .map_err(or_not_found(BookingError::ImageNotFound)),
        )
    }

    /// Remove every image of a room; returns how many were removed.
    pub async fn delete_room_images(&self, room_id: RoomId) -> Result<usize, BookingError> {
        track(
            self.images
                .delete_images_by_room(room_id)
                .await
                .map_err(or_not_found(BookingError::RoomNotFound)),
        )
    }

    pub async fn get_room_image(&self, image_id: ImageId) -> Result<RoomImage, BookingError> {
        self.images
            .find_image(image_id)
            .await
            .map_err(or_not_found(BookingError::ImageNotFound))
    }

    /// A room's images in upload order.
    pub async fn list_room_images(&self, room_id: RoomId) -> Result<Vec<RoomImage>, BookingError> {
        self.images
            .list_images_by_room(room_id)
            .await
            .map_err(or_not_found(BookingError::RoomNotFound))
    }
}
