use ulid::Ulid;

use crate::limits::MAX_PAYMENT_METHOD_LEN;
use crate::model::*;
use crate::observability::{
    BOOKING_CONFLICTS_TOTAL, BOOKINGS_CANCELLED_TOTAL, BOOKINGS_CREATED_TOTAL,
    PAYMENT_UPDATES_TOTAL,
};
use crate::store::StoreError;

use super::error::or_not_found;
use super::pricing::{Quote, compute_price, nights, parse_dates, parse_stay};
use super::{BookingError, Engine, now_ms, track};

fn unavailable(room_id: RoomId, conflicting: Option<BookingId>, source: &'static str) -> BookingError {
    metrics::counter!(BOOKING_CONFLICTS_TOTAL, "source" => source).increment(1);
    BookingError::RoomUnavailable {
        room_id,
        conflicting,
    }
}

impl Engine {
    /// Reserve `room_id` for `[check_in, check_out)` on behalf of `user_id`.
    ///
    /// Checks run in order: unknown room, overlap, then the date range and
    /// price. Dates that do not parse at all are rejected up front. The
    /// overlap check and the insert run under the room's lock; the store's
    /// exclusion constraint backs that up, and its conflict is reported as
    /// `RoomUnavailable` as well.
    pub async fn create_booking(
        &self,
        user_id: UserId,
        room_id: RoomId,
        check_in: &str,
        check_out: &str,
        payment_method: Option<String>,
    ) -> Result<Booking, BookingError> {
        track(
            self.try_create_booking(user_id, room_id, check_in, check_out, payment_method)
                .await,
        )
    }

    async fn try_create_booking(
        &self,
        user_id: UserId,
        room_id: RoomId,
        check_in: &str,
        check_out: &str,
        payment_method: Option<String>,
    ) -> Result<Booking, BookingError> {
        let payment_method = payment_method
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        if let Some(m) = &payment_method
            && m.len() > MAX_PAYMENT_METHOD_LEN
        {
            return Err(BookingError::LimitExceeded("payment method too long"));
        }

        let span = parse_dates(check_in, check_out, &self.config.date_format)?;
        let room = self
            .rooms
            .find_room(room_id)
            .await
            .map_err(or_not_found(BookingError::RoomNotFound))?;

        let lock = self.room_lock(room_id);
        let _room_guard = lock.lock().await;

        if self.has_overlap(room_id, span).await? {
            return Err(unavailable(room_id, None, "check"));
        }
        let total_price = compute_price(self.config.rate_source.nightly_rate(&room), &span)?;

        let booking = Booking {
            id: Ulid::new(),
            user_id,
            room_id,
            span,
            total_price,
            payment_method,
            payment_status: PaymentStatus::Pending,
            booking_status: BookingStatus::Confirmed,
            created_at: now_ms(),
        };

        match self.bookings.insert_booking(booking.clone()).await {
            Ok(_) => {}
            Err(StoreError::Conflict(existing)) => {
                return Err(unavailable(room_id, Some(existing), "insert"));
            }
            // Room deleted between lookup and insert.
            Err(StoreError::NotFound(_)) => return Err(BookingError::RoomNotFound(room_id)),
            Err(e) => return Err(e.into()),
        }

        metrics::counter!(BOOKINGS_CREATED_TOTAL).increment(1);
        Ok(booking)
    }

    /// Guest cancellation. Only the owner may cancel, and only before the
    /// booking is paid or completed. Cancelling twice is a no-op.
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        user_id: UserId,
    ) -> Result<Booking, BookingError> {
        track(self.try_cancel_booking(booking_id, user_id).await)
    }

    async fn try_cancel_booking(
        &self,
        booking_id: BookingId,
        user_id: UserId,
    ) -> Result<Booking, BookingError> {
        let room_id = self.get_booking(booking_id).await?.room_id;
        let lock = self.room_lock(room_id);
        let _room_guard = lock.lock().await;

        // Re-read under the lock; a payment may have landed meanwhile.
        let mut booking = self.get_booking(booking_id).await?;
        if booking.user_id != user_id {
            return Err(BookingError::Forbidden {
                booking_id,
                user_id,
            });
        }
        if booking.booking_status == BookingStatus::Cancelled {
            return Ok(booking);
        }
        if booking.is_settled() {
            return Err(BookingError::AlreadySettled {
                booking_id,
                payment_status: booking.payment_status,
                booking_status: booking.booking_status,
            });
        }

        self.bookings
            .update_booking_status(booking_id, BookingStatus::Cancelled)
            .await
            .map_err(or_not_found(BookingError::BookingNotFound))?;
        booking.booking_status = BookingStatus::Cancelled;
        metrics::counter!(BOOKINGS_CANCELLED_TOTAL).increment(1);
        Ok(booking)
    }

    /// Admin overwrite of the payment status. Any enumerated status may follow
    /// any other, and repeating a write is harmless.
    pub async fn update_payment_status(
        &self,
        booking_id: BookingId,
        status: &str,
    ) -> Result<Booking, BookingError> {
        track(self.try_update_payment_status(booking_id, status).await)
    }

    async fn try_update_payment_status(
        &self,
        booking_id: BookingId,
        status: &str,
    ) -> Result<Booking, BookingError> {
        let room_id = self.get_booking(booking_id).await?.room_id;
        let status: PaymentStatus = status.parse().map_err(BookingError::InvalidStatus)?;

        let lock = self.room_lock(room_id);
        let _room_guard = lock.lock().await;
        self.bookings
            .update_payment_status(booking_id, status)
            .await
            .map_err(or_not_found(BookingError::BookingNotFound))?;
        metrics::counter!(PAYMENT_UPDATES_TOTAL, "status" => status.as_str()).increment(1);
        self.get_booking(booking_id).await
    }

    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        self.bookings
            .find_booking(booking_id)
            .await
            .map_err(or_not_found(BookingError::BookingNotFound))
    }

    /// Price a stay without reserving anything.
    pub async fn quote_stay(
        &self,
        room_id: RoomId,
        check_in: &str,
        check_out: &str,
    ) -> Result<Quote, BookingError> {
        let span = parse_stay(check_in, check_out, &self.config.date_format)?;
        let room = self
            .rooms
            .find_room(room_id)
            .await
            .map_err(or_not_found(BookingError::RoomNotFound))?;
        let nightly_rate = self.config.rate_source.nightly_rate(&room);
        let total = compute_price(nightly_rate, &span)?;
        Ok(Quote {
            room_id,
            span,
            nights: nights(&span),
            nightly_rate,
            total,
        })
    }
}
