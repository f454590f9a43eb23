use chrono::{DateTime, Utc};

pub type UserId = i64;
pub type BoardId = i64;
pub type StickerId = i64;

pub type Timestamp = DateTime<Utc>;

/// Sticker defaults applied when a create request leaves a field out.
pub const DEFAULT_STICKER_SIZE: f64 = 200.0;
pub const DEFAULT_STICKER_COLOR: &str = "#FFEB3B";
