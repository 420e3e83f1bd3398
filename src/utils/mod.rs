use std::time::{SystemTime, UNIX_EPOCH};

pub mod glob;

/// Milliseconds since the Unix epoch, `0` if the clock is set before it.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
