//! Shared Match Clock
//!
//! Shared-mode timing derives from one wall-clock anchor supplied by the match
//! service. Every client computes countdown and remaining time from
//! `now - anchor`, so timers converge on the same end instant no matter how
//! each client's frame deltas accumulate.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::game::state::TimestampMs;

// =============================================================================
// WALL CLOCKS
// =============================================================================

/// Source of wall-clock time.
pub trait WallClock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> TimestampMs;
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock reading `start_ms`.
    pub fn new(start_ms: TimestampMs) -> Self {
        Self { now: Arc::new(AtomicI64::new(start_ms)) }
    }

    /// Move time forward.
    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Jump to an instant.
    pub fn set(&self, now_ms: TimestampMs) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl WallClock for ManualClock {
    fn now_ms(&self) -> TimestampMs {
        self.now.load(Ordering::SeqCst)
    }
}

/// Parse an RFC 3339 timestamp (as stored by the match service).
pub fn parse_timestamp(value: &str) -> Result<TimestampMs, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc3339(value)?;
    Ok(parsed.with_timezone(&Utc).timestamp_millis())
}

/// Format epoch milliseconds as RFC 3339 UTC; `None` if out of range.
pub fn format_timestamp(ms: TimestampMs) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// =============================================================================
// SIMULATION CLOCK
// =============================================================================

/// Countdown and match timers anchored to the shared start instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationClock {
    /// Shared start instant (countdown begins here)
    match_start_ms: TimestampMs,
    /// Correction added to local readings to approximate shared time
    clock_offset_ms: i64,
    countdown_ms: i64,
    duration_ms: i64,
}

impl SimulationClock {
    /// Anchor a clock at the shared start instant.
    pub fn anchored(match_start_ms: TimestampMs, countdown_ms: i64, duration_ms: i64) -> Self {
        Self {
            match_start_ms,
            clock_offset_ms: 0,
            countdown_ms,
            duration_ms,
        }
    }

    /// Apply a known local-clock correction.
    pub fn with_offset(mut self, clock_offset_ms: i64) -> Self {
        self.clock_offset_ms = clock_offset_ms;
        self
    }

    /// Local reading mapped onto shared time.
    #[inline]
    fn shared_now(&self, local_now_ms: TimestampMs) -> TimestampMs {
        local_now_ms + self.clock_offset_ms
    }

    /// Shared start instant.
    pub fn match_start_ms(&self) -> TimestampMs {
        self.match_start_ms
    }

    /// Instant the match goes active.
    pub fn active_at_ms(&self) -> TimestampMs {
        self.match_start_ms + self.countdown_ms
    }

    /// Instant the match ends.
    pub fn ends_at_ms(&self) -> TimestampMs {
        self.active_at_ms() + self.duration_ms
    }

    /// Time elapsed since the shared start.
    pub fn elapsed_ms(&self, local_now_ms: TimestampMs) -> i64 {
        self.shared_now(local_now_ms) - self.match_start_ms
    }

    /// Countdown left, clamped at 0.
    pub fn countdown_remaining_ms(&self, local_now_ms: TimestampMs) -> i64 {
        (self.active_at_ms() - self.shared_now(local_now_ms)).max(0)
    }

    /// Match time left, clamped to `[0, duration]`.
    pub fn time_remaining_ms(&self, local_now_ms: TimestampMs) -> i64 {
        (self.ends_at_ms() - self.shared_now(local_now_ms)).clamp(0, self.duration_ms)
    }

    /// Countdown finished.
    pub fn is_active(&self, local_now_ms: TimestampMs) -> bool {
        self.shared_now(local_now_ms) >= self.active_at_ms()
    }

    /// Match time used up.
    pub fn is_expired(&self, local_now_ms: TimestampMs) -> bool {
        self.shared_now(local_now_ms) >= self.ends_at_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchored_instants() {
        let clock = SimulationClock::anchored(1_000_000, 3000, 60_000);
        assert_eq!(clock.active_at_ms(), 1_003_000);
        assert_eq!(clock.ends_at_ms(), 1_063_000);
    }

    #[test]
    fn test_countdown_and_remaining() {
        let clock = SimulationClock::anchored(1_000_000, 3000, 60_000);

        assert_eq!(clock.countdown_remaining_ms(1_000_000), 3000);
        assert_eq!(clock.countdown_remaining_ms(1_002_500), 500);
        assert_eq!(clock.countdown_remaining_ms(1_010_000), 0);

        assert_eq!(clock.time_remaining_ms(1_000_000), 60_000);
        assert_eq!(clock.time_remaining_ms(1_033_000), 30_000);
        assert_eq!(clock.time_remaining_ms(2_000_000), 0);

        assert!(!clock.is_active(1_002_999));
        assert!(clock.is_active(1_003_000));
        assert!(!clock.is_expired(1_062_999));
        assert!(clock.is_expired(1_063_000));
    }

    #[test]
    fn test_offset_corrects_skew() {
        // Local clock runs 250 ms behind shared time
        let clock = SimulationClock::anchored(1_000_000, 3000, 60_000).with_offset(250);
        assert!(clock.is_expired(1_062_750));
        assert!(!clock.is_expired(1_062_749));
        assert_eq!(clock.elapsed_ms(999_750), 0);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(10);
        let other = clock.clone();
        clock.advance(5);
        assert_eq!(other.now_ms(), 15);
        other.set(100);
        assert_eq!(clock.now_ms(), 100);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1970-01-01T00:00:01Z").ok(), Some(1000));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00.250+00:00").ok(), Some(1_714_564_800_250));
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_format_timestamp_parses_back() {
        assert_eq!(format_timestamp(1_714_564_800_250).as_deref(), Some("2024-05-01T12:00:00.250Z"));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00.250Z").ok(), Some(1_714_564_800_250));
        assert_eq!(format_timestamp(i64::MAX), None);
    }
}
