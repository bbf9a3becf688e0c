//! Timestamp utilities

use chrono::{Local, NaiveDateTime};

/// Get current local wall-clock time
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// True when `earlier` lies on the same calendar day as `now` and no more
/// than `window` away from it in either direction.
pub fn within_same_day_window(
    earlier: NaiveDateTime,
    now: NaiveDateTime,
    window: chrono::Duration,
) -> bool {
    if earlier.date() != now.date() {
        return false;
    }
    let delta = now.signed_duration_since(earlier);
    delta.abs() <= window
}
