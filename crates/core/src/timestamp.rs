//! Microsecond-precision timestamp type
//!
//! Timestamps are stored as microseconds since Unix epoch (1970-01-01 00:00:00 UTC).
//! Tracers report time as floating-point seconds; `from_secs_f64` converts
//! that representation, rounding to the nearest microsecond.
//!
//! ```
//! use tracerec_core::Timestamp;
//!
//! let now = Timestamp::now();
//! let from_secs = Timestamp::from_secs(1000);
//! let from_float = Timestamp::from_secs_f64(1000.5).unwrap();
//! assert!(from_float.is_after(from_secs));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Microsecond-precision timestamp
///
/// ## Invariants
///
/// - Timestamps are always non-negative (u64)
/// - Timestamps are always in microseconds
/// - The zero timestamp represents Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Create a timestamp for the current moment
    ///
    /// Returns epoch (0) if the system clock is before Unix epoch.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as u64)
    }

    /// Create a timestamp from microseconds since epoch
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    /// Create a timestamp from seconds since epoch
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000))
    }

    /// Create a timestamp from fractional seconds since epoch
    ///
    /// Returns None for negative, NaN or infinite input.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let micros = (secs * 1_000_000.0).round();
        if micros >= u64::MAX as f64 {
            return Some(Timestamp(u64::MAX));
        }
        Some(Timestamp(micros as u64))
    }

    /// Interpret a JSON payload value (seconds, integer or float)
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => match n.as_u64() {
                Some(secs) => Some(Timestamp::from_secs(secs)),
                None => n.as_f64().and_then(Timestamp::from_secs_f64),
            },
            _ => None,
        }
    }

    /// Get microseconds since Unix epoch
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get seconds since Unix epoch (truncates)
    #[inline]
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Compute duration since an earlier timestamp
    ///
    /// Returns `None` if `earlier` is actually later than `self`.
    pub fn duration_since(&self, earlier: Timestamp) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration::from_micros)
    }

    /// Check if this timestamp is after another
    #[inline]
    pub fn is_after(&self, other: Timestamp) -> bool {
        self.0 > other.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::EPOCH
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // "seconds.microseconds"
        let secs = self.0 / 1_000_000;
        let micros = self.0 % 1_000_000;
        write!(f, "{}.{:06}", secs, micros)
    }
}

impl From<u64> for Timestamp {
    /// Create from raw microseconds
    fn from(micros: u64) -> Self {
        Timestamp::from_micros(micros)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_epoch() {
        assert_eq!(Timestamp::EPOCH.as_micros(), 0);
        assert_eq!(Timestamp::EPOCH.as_secs(), 0);
        assert_eq!(Timestamp::default(), Timestamp::EPOCH);
    }

    #[test]
    fn test_from_secs_f64_rounds_to_micros() {
        let ts = Timestamp::from_secs_f64(1.000_000_4).unwrap();
        assert_eq!(ts.as_micros(), 1_000_000);
        let ts = Timestamp::from_secs_f64(1_700_000_000.25).unwrap();
        assert_eq!(ts.as_micros(), 1_700_000_000_250_000);
    }

    #[test]
    fn test_from_secs_f64_rejects_invalid() {
        assert!(Timestamp::from_secs_f64(-1.0).is_none());
        assert!(Timestamp::from_secs_f64(f64::NAN).is_none());
        assert!(Timestamp::from_secs_f64(f64::INFINITY).is_none());
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Timestamp::from_json(&json!(3)), Some(Timestamp::from_secs(3)));
        assert_eq!(
            Timestamp::from_json(&json!(2.5)),
            Some(Timestamp::from_micros(2_500_000))
        );
        assert_eq!(Timestamp::from_json(&json!("3")), None);
        assert_eq!(Timestamp::from_json(&json!(-3)), None);
    }

    #[test]
    fn test_duration_since() {
        let a = Timestamp::from_secs(10);
        let b = Timestamp::from_secs(12);
        assert_eq!(b.duration_since(a), Some(Duration::from_secs(2)));
        assert_eq!(a.duration_since(b), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Timestamp::from_micros(1_500_000).to_string(), "1.500000");
    }

    #[test]
    fn test_now_is_after_2020() {
        let year_2020 = Timestamp::from_secs(1_577_836_800);
        assert!(Timestamp::now().is_after(year_2020));
    }
}
