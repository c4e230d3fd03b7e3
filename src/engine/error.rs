use ulid::Ulid;

use crate::model::{BookingId, BookingStatus, ImageId, PaymentStatus, ReviewId, RoomId, UserId};
use crate::store::StoreError;

/// Failure category, for callers that map outcomes to a response class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Permission,
    State,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),
    #[error("booking not found: {0}")]
    BookingNotFound(BookingId),
    #[error("review not found: {0}")]
    ReviewNotFound(ReviewId),
    #[error("image not found: {0}")]
    ImageNotFound(ImageId),

    #[error("invalid date range {check_in:?} → {check_out:?}: {reason}")]
    InvalidDateRange {
        check_in: String,
        check_out: String,
        reason: &'static str,
    },
    #[error("rating {0} outside 1..=5")]
    InvalidRating(i32),
    #[error("unknown status: {0:?}")]
    InvalidStatus(String),
    #[error("invalid room: {0}")]
    InvalidRoom(&'static str),
    #[error("invalid image: {0}")]
    InvalidImage(&'static str),
    #[error("invalid sort: {0:?}")]
    InvalidSort(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("room {room_id} is unavailable for the requested dates")]
    RoomUnavailable {
        room_id: RoomId,
        /// The booking holding the dates, when the store reports it.
        conflicting: Option<BookingId>,
    },
    #[error("booking {booking_id} already has review {existing}")]
    DuplicateReview {
        booking_id: BookingId,
        existing: ReviewId,
    },
    #[error("room number already taken: {0}")]
    RoomNumberTaken(String),

    #[error("user {user_id} does not own booking {booking_id}")]
    Forbidden {
        booking_id: BookingId,
        user_id: UserId,
    },

    #[error("booking {booking_id} is settled (payment {payment_status}, status {booking_status})")]
    AlreadySettled {
        booking_id: BookingId,
        payment_status: PaymentStatus,
        booking_status: BookingStatus,
    },
    #[error("booking {booking_id} is {status}, not completed")]
    BookingNotCompleted {
        booking_id: BookingId,
        status: BookingStatus,
    },
    #[error("booking {booking_id} cannot move from {from} to {to}")]
    IllegalTransition {
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("room {0} still has bookings")]
    RoomInUse(RoomId),

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::RoomNotFound(_)
            | BookingError::BookingNotFound(_)
            | BookingError::ReviewNotFound(_)
            | BookingError::ImageNotFound(_) => ErrorKind::NotFound,
            BookingError::InvalidDateRange { .. }
            | BookingError::InvalidRating(_)
            | BookingError::InvalidStatus(_)
            | BookingError::InvalidRoom(_)
            | BookingError::InvalidImage(_)
            | BookingError::InvalidSort(_)
            | BookingError::LimitExceeded(_) => ErrorKind::Validation,
            BookingError::RoomUnavailable { .. }
            | BookingError::DuplicateReview { .. }
            | BookingError::RoomNumberTaken(_) => ErrorKind::Conflict,
            BookingError::Forbidden { .. } => ErrorKind::Permission,
            BookingError::AlreadySettled { .. }
            | BookingError::BookingNotCompleted { .. }
            | BookingError::IllegalTransition { .. }
            | BookingError::RoomInUse(_) => ErrorKind::State,
            BookingError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Fallback translation for store failures a call site does not handle itself.
/// A refused status change keeps its meaning; anything else is `Storage`.
impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::IllegalTransition { id, from, to } => BookingError::IllegalTransition {
                booking_id: id,
                from,
                to,
            },
            other => BookingError::Storage(other),
        }
    }
}

/// Map `StoreError::NotFound` to `not_found`, everything else through `From`.
pub(super) fn or_not_found(
    not_found: impl FnOnce(Ulid) -> BookingError,
) -> impl FnOnce(StoreError) -> BookingError {
    move |e| match e {
        StoreError::NotFound(id) => not_found(id),
        other => other.into(),
    }
}
