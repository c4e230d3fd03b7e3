use chrono::NaiveDate;

use crate::limits::MAX_STAY_NIGHTS;
use crate::model::{Cents, DateSpan, RoomId};

use super::BookingError;

/// Price breakdown for a stay, returned by `Engine::quote_stay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub room_id: RoomId,
    pub span: DateSpan,
    pub nights: i64,
    pub nightly_rate: Cents,
    pub total: Cents,
}

fn invalid(check_in: &str, check_out: &str, reason: &'static str) -> BookingError {
    BookingError::InvalidDateRange {
        check_in: check_in.to_string(),
        check_out: check_out.to_string(),
        reason,
    }
}

/// Parse both dates without judging their order. The span may be empty or
/// reversed; `compute_price` rejects those.
pub fn parse_dates(check_in: &str, check_out: &str, format: &str) -> Result<DateSpan, BookingError> {
    let parse = |raw: &str| NaiveDate::parse_from_str(raw.trim(), format).ok();
    let (Some(start), Some(end)) = (parse(check_in), parse(check_out)) else {
        return Err(invalid(check_in, check_out, "unparseable date"));
    };
    Ok(DateSpan {
        check_in: start,
        check_out: end,
    })
}

/// Parse caller-supplied check-in/check-out dates into a non-empty stay.
pub fn parse_stay(check_in: &str, check_out: &str, format: &str) -> Result<DateSpan, BookingError> {
    let span = parse_dates(check_in, check_out, format)?;
    if span.check_out <= span.check_in {
        return Err(invalid(check_in, check_out, "check-out must be after check-in"));
    }
    Ok(span)
}

/// Chargeable nights: whole 24-hour units, rounded up.
pub fn nights(span: &DateSpan) -> i64 {
    (span.duration_hours() + 23) / 24
}

/// `nightly_rate × nights`, for stays between one night and `MAX_STAY_NIGHTS`.
pub fn compute_price(nightly_rate: Cents, span: &DateSpan) -> Result<Cents, BookingError> {
    let n = nights(span);
    if n < 1 {
        return Err(BookingError::InvalidDateRange {
            check_in: span.check_in.to_string(),
            check_out: span.check_out.to_string(),
            reason: "check-out must be after check-in",
        });
    }
    if n > MAX_STAY_NIGHTS {
        return Err(BookingError::LimitExceeded("stay too long"));
    }
    // n is in 1..=MAX_STAY_NIGHTS here, so the cast is lossless.
    nightly_rate
        .checked_mul(n as u64)
        .ok_or(BookingError::LimitExceeded("price overflow"))
}

/// Parse and price in one step, for callers holding raw date strings.
pub fn price_stay(
    nightly_rate: Cents,
    check_in: &str,
    check_out: &str,
    format: &str,
) -> Result<Cents, BookingError> {
    let span = parse_stay(check_in, check_out, format)?;
    compute_price(nightly_rate, &span)
}
