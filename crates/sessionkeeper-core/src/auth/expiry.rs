//! Access-token expiry evaluation.

use chrono::{DateTime, Utc};
use tracing::warn;

/// A token counts as expired this many seconds before its literal expiry,
/// so a request is never sent with a token that lapses mid-flight.
pub const EXPIRY_MARGIN_SECS: i64 = 1;

/// Whether a credential with `stored_expiry` (epoch seconds) is expired at `now`.
///
/// An absent expiry is never considered expired.
pub fn is_expired(now: DateTime<Utc>, stored_expiry: Option<i64>) -> bool {
    match stored_expiry {
        None => false,
        Some(exp) => {
            let threshold_ms = exp.saturating_sub(EXPIRY_MARGIN_SECS).saturating_mul(1000);
            now.timestamp_millis() >= threshold_ms
        }
    }
}

/// Parse the stored expiry string. Garbage is treated as absent.
pub fn parse_expiry(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    match raw.parse::<i64>() {
        Ok(exp) => Some(exp),
        Err(_) => {
            warn!(value = raw, "Ignoring unparseable stored expiry");
            None
        }
    }
}

/// Seconds left before the token is considered expired (for display).
pub fn seconds_until_expiry(now: DateTime<Utc>, stored_expiry: Option<i64>) -> Option<i64> {
    stored_expiry.map(|exp| (exp - EXPIRY_MARGIN_SECS - now.timestamp()).max(0))
}
