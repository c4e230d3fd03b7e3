use ulid::Ulid;

use crate::limits::{MAX_COMMENT_LEN, MAX_RATING, MIN_RATING};
use crate::model::*;
use crate::observability::{REVIEWS_CREATED_TOTAL, REVIEWS_ON_BEHALF_TOTAL};
use crate::pagination::PageRequest;
use crate::store::StoreError;

use super::error::or_not_found;
use super::{BookingError, Engine, now_ms, track};

impl Engine {
    /// Review a completed booking. The review is always attributed to the
    /// booking's owner; `requested_by` only identifies who filed it.
    pub async fn create_review(
        &self,
        booking_id: BookingId,
        requested_by: UserId,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Review, BookingError> {
        track(
            self.try_create_review(booking_id, requested_by, rating, comment)
                .await,
        )
    }

    async fn try_create_review(
        &self,
        booking_id: BookingId,
        requested_by: UserId,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Review, BookingError> {
        let booking = self.get_booking(booking_id).await?;
        if booking.booking_status != BookingStatus::Completed {
            return Err(BookingError::BookingNotCompleted {
                booking_id,
                status: booking.booking_status,
            });
        }
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(BookingError::InvalidRating(rating));
        }
        let comment = comment.filter(|c| !c.trim().is_empty());
        if comment.as_ref().is_some_and(|c| c.len() > MAX_COMMENT_LEN) {
            return Err(BookingError::LimitExceeded("comment too long"));
        }

        match self.reviews.find_review_by_booking(booking_id).await {
            Ok(existing) => {
                return Err(BookingError::DuplicateReview {
                    booking_id,
                    existing: existing.id,
                });
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let review = Review {
            id: Ulid::new(),
            booking_id,
            user_id: booking.user_id,
            // Bounded to 1..=5 above.
            rating: rating as u8,
            comment,
            created_at: now_ms(),
        };
        match self.reviews.insert_review(review.clone()).await {
            Ok(_) => {}
            Err(StoreError::Conflict(existing)) => {
                return Err(BookingError::DuplicateReview {
                    booking_id,
                    existing,
                });
            }
            Err(StoreError::NotFound(_)) => return Err(BookingError::BookingNotFound(booking_id)),
            Err(e) => return Err(e.into()),
        }

        metrics::counter!(REVIEWS_CREATED_TOTAL).increment(1);
        if requested_by != booking.user_id {
            metrics::counter!(REVIEWS_ON_BEHALF_TOTAL).increment(1);
        }
        Ok(review)
    }

    pub async fn delete_review(&self, review_id: ReviewId) -> Result<(), BookingError> {
        track(
            self.reviews
                .delete_review(review_id)
                .await
                .map_err(or_not_found(BookingError::ReviewNotFound)),
        )
    }

    pub async fn get_review(&self, review_id: ReviewId) -> Result<Review, BookingError> {
        self.reviews
            .find_review(review_id)
            .await
            .map_err(or_not_found(BookingError::ReviewNotFound))
    }

    /// `ReviewNotFound` carries the booking id when the booking has no review.
    pub async fn get_booking_review(&self, booking_id: BookingId) -> Result<Review, BookingError> {
        self.reviews
            .find_review_by_booking(booking_id)
            .await
            .map_err(or_not_found(BookingError::ReviewNotFound))
    }

    pub async fn list_room_reviews(
        &self,
        room_id: RoomId,
        req: &PageRequest,
    ) -> Result<Vec<Review>, BookingError> {
        let page = self.page_for::<Review>(req)?;
        self.get_room(room_id).await?;
        Ok(self.reviews.list_reviews_by_room(room_id, &page).await?)
    }

    pub async fn list_user_reviews(
        &self,
        user_id: UserId,
        req: &PageRequest,
    ) -> Result<Vec<Review>, BookingError> {
        let page = self.page_for::<Review>(req)?;
        Ok(self.reviews.list_reviews_by_user(user_id, &page).await?)
    }
}
