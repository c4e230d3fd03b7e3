//! Hard bounds on inputs accepted by the engine.

/// Longest stay a single booking may cover.
pub const MAX_STAY_NIGHTS: i64 = 365;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

pub const MAX_ROOM_NUMBER_LEN: usize = 10;
pub const MAX_ROOM_TYPE_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_PAYMENT_METHOD_LEN: usize = 50;
pub const MAX_COMMENT_LEN: usize = 4096;
pub const MAX_IMAGE_URL_LEN: usize = 255;

/// Upper bound for any page size, whatever the configured maximum.
pub const MAX_PAGE_LIMIT: u32 = 1000;
