//! Monotonic-enough UTC clock, ISO-8601 parsing, and the backoff formula.
//!
//! Every timestamp that crosses a repository boundary is UTC and
//! timezone-aware; this module is the single place that enforces it.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Current UTC instant.
pub fn utcnow() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an ISO-8601 string into a UTC instant.
///
/// A trailing `Z` is treated as `+00:00`; a string with no offset is assumed
/// to already be UTC (matching `ensure_utc` in the original implementation).
pub fn parse_iso(s: &str) -> Result<DateTime<Utc>> {
    let normalized = if let Some(stripped) = s.strip_suffix('Z') {
        format!("{stripped}+00:00")
    } else {
        s.to_string()
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Naive timestamp with no offset: interpret as UTC.
    chrono::NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .map_err(|_| Error::Validation(format!("invalid ISO-8601 timestamp: {s}")))
}

/// Whether a held lock has expired (or was never held).
pub fn is_lock_expired(locked_at: Option<DateTime<Utc>>, lock_timeout_s: i64) -> bool {
    match locked_at {
        None => true,
        Some(locked_at) => utcnow() >= locked_at + chrono::Duration::seconds(lock_timeout_s),
    }
}

/// Exponential backoff with jitter: `min(max_backoff_s, base^attempts) + U(0, 0.5*base)`.
///
/// The cap applies before jitter; jitter is always added, so the result is
/// never exactly the capped exponential.
pub fn backoff_delay(attempts: u32, base: f64, max_backoff_s: f64) -> f64 {
    let exponential = base.powi(attempts as i32);
    let capped = exponential.min(max_backoff_s);
    let jitter = fastrand::f64() * 0.5 * base;
    capped + jitter
}

/// Next `run_at` after a failed attempt.
pub fn next_run_at(attempts: u32, base: f64, max_backoff_s: f64) -> DateTime<Utc> {
    let delay = backoff_delay(attempts, base, max_backoff_s);
    utcnow() + chrono::Duration::milliseconds((delay * 1000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_z_suffix_as_utc_offset() {
        let a = parse_iso("2026-01-01T00:00:00Z").unwrap();
        let b = parse_iso("2026-01-01T00:00:00+00:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn naive_timestamp_is_interpreted_as_utc() {
        let dt = parse_iso("2026-01-01T12:30:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-01-01T12:30:00+00:00");
    }

    #[test]
    fn lock_with_no_timestamp_is_expired() {
        assert!(is_lock_expired(None, 300));
    }

    #[test]
    fn fresh_lock_is_not_expired() {
        assert!(!is_lock_expired(Some(utcnow()), 300));
    }

    #[test]
    fn backoff_respects_cap_and_jitter_bounds() {
        for attempts in 0..10 {
            let delay = backoff_delay(attempts, 2.0, 3600.0);
            assert!(delay > 0.0);
            assert!(delay <= 3600.0 + 0.5 * 2.0 + 1e-9);
            let exp = 2f64.powi(attempts as i32);
            if exp <= 3600.0 {
                assert!(delay >= exp);
            }
        }
    }

    #[test]
    fn backoff_jitter_varies_across_calls() {
        let samples: std::collections::HashSet<u64> = (0..10)
            .map(|_| backoff_delay(3, 2.0, 3600.0).to_bits())
            .collect();
        assert!(samples.len() >= 2);
    }
}
