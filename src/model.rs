use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, used for record creation times.
pub type Ms = i64;

/// Money in minor units (cents).
pub type Cents = u64;

pub type RoomId = Ulid;
pub type BookingId = Ulid;
pub type ReviewId = Ulid;
pub type UserId = Ulid;
pub type ImageId = Ulid;

/// Half-open stay `[check_in, check_out)` in calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateSpan {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "check-in must be before check-out");
        Self { check_in, check_out }
    }

    /// Whole hours between check-in and check-out midnight.
    pub fn duration_hours(&self) -> i64 {
        (self.check_out - self.check_in).num_hours()
    }

    /// Checkout on day X and check-in on day X do not overlap.
    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

/// Defines `as_str`, `Display` and `FromStr` for a lowercase status enum.
macro_rules! status_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(s.to_string()),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomStatus {
    Available,
    Booked,
    Maintenance,
}

status_enum!(RoomStatus {
    Available => "available",
    Booked => "booked",
    Maintenance => "maintenance",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

status_enum!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

status_enum!(BookingStatus {
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
});

/// Statuses whose bookings no longer hold the room. Payment status plays no part:
/// confirmation, not payment, reserves inventory.
pub const NON_RESERVING: &[BookingStatus] = &[BookingStatus::Cancelled, BookingStatus::Completed];

impl BookingStatus {
    /// Cancelled and completed bookings never leave their state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// `confirmed → cancelled` and `confirmed → completed` are the only moves.
    pub fn can_become(&self, next: BookingStatus) -> bool {
        !self.is_terminal() && next.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub room_number: String,
    pub room_type: String,
    /// Nightly price.
    pub price: Cents,
    pub description: String,
    pub status: RoomStatus,
    pub max_occupancy: u32,
    pub created_at: Ms,
}

/// Admin input for a new room; the engine assigns id, status and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub room_number: String,
    pub room_type: String,
    pub price: Cents,
    pub description: String,
    pub max_occupancy: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub span: DateSpan,
    pub total_price: Cents,
    pub payment_method: Option<String>,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    pub created_at: Ms,
}

impl Booking {
    /// Paid or completed: past the point where the guest may cancel.
    pub fn is_settled(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
            || self.booking_status == BookingStatus::Completed
    }

    /// Only confirmed bookings reserve inventory, whatever their payment state.
    pub fn reserves_room(&self) -> bool {
        self.booking_status == BookingStatus::Confirmed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub booking_id: BookingId,
    /// Always the owner of the reviewed booking.
    pub user_id: UserId,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomImage {
    pub id: ImageId,
    pub room_id: RoomId,
    pub url: String,
    pub is_primary: bool,
    pub created_at: Ms,
}

/// Room record plus its images and every booking made against it, the
/// bookings sorted by check-in.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub images: Vec<RoomImage>,
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            images: Vec::new(),
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by check-in.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.check_in, |b| b.span.check_in)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: &BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn booking_mut(&mut self, id: &BookingId) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }

    /// Bookings whose stay intersects `query`, whatever their status.
    /// Uses binary search to skip bookings checking in at or after `query.check_out`.
    pub fn overlapping(&self, query: &DateSpan) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.check_in < query.check_out);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.check_out > query.check_in)
    }

    /// First overlapping booking whose status is not in `exclude`.
    pub fn first_conflict(&self, query: &DateSpan, exclude: &[BookingStatus]) -> Option<&Booking> {
        self.overlapping(query)
            .find(|b| !exclude.contains(&b.booking_status))
    }
}

/// The WAL record format. Each variant carries everything needed to replay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        room: Room,
    },
    RoomUpdated {
        room: Room,
    },
    RoomDeleted {
        id: RoomId,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingStatusChanged {
        id: BookingId,
        room_id: RoomId,
        status: BookingStatus,
    },
    PaymentStatusChanged {
        id: BookingId,
        room_id: RoomId,
        status: PaymentStatus,
    },
    ImageAdded {
        image: RoomImage,
    },
    ImageDeleted {
        id: ImageId,
        room_id: RoomId,
    },
    RoomImagesCleared {
        room_id: RoomId,
    },
    ReviewCreated {
        review: Review,
    },
    ReviewDeleted {
        id: ReviewId,
        booking_id: BookingId,
    },
}
