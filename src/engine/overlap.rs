use crate::model::{DateSpan, NON_RESERVING, RoomId};

use super::{BookingError, Engine};

impl Engine {
    /// True if a confirmed booking on `room_id` shares a night with `span`.
    /// Payment status is not consulted. An unknown room has no overlaps.
    pub async fn has_overlap(&self, room_id: RoomId, span: DateSpan) -> Result<bool, BookingError> {
        Ok(self
            .bookings
            .exists_overlap(room_id, span, NON_RESERVING)
            .await?)
    }
}
