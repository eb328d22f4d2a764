//! Time sources and wall-clock arithmetic.
//!
//! # Design
//!
//! All engine timestamps are `DateTime<Utc>`; durations that feed the
//! pause/resume bookkeeping are whole milliseconds (`i64`), so accumulated
//! paused time is exact and never drifts.
//!
//! The engine never calls `Utc::now()` directly.  It asks a [`Clock`]:
//!
//! - [`TokioClock`] anchors a wall-clock origin to `tokio::time::Instant`.
//!   In production this is ordinary monotonic time; under
//!   `#[tokio::test(start_paused = true)]` it follows tokio's virtual clock,
//!   so timer-driven tests see timestamps that agree with the timers.
//! - [`ManualClock`] is advanced explicitly, for pure state-machine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

pub const MS_PER_SECOND: i64 = 1_000;
pub const MS_PER_HOUR: i64 = 3_600_000;
pub const MS_PER_DAY: i64 = 86_400_000;

/// Source of "now" for every engine component.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

// ── TokioClock ────────────────────────────────────────────────────────────────

/// Wall-clock anchor plus tokio monotonic offset.
#[derive(Clone, Debug)]
pub struct TokioClock {
    wall_origin: DateTime<Utc>,
    mono_origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Anchor the clock so that "now" equals `wall_origin` at construction.
    pub fn anchored_at(wall_origin: DateTime<Utc>) -> Self {
        Self {
            wall_origin,
            mono_origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().saturating_duration_since(self.mono_origin);
        self.wall_origin + Duration::milliseconds(elapsed.as_millis() as i64)
    }
}

// ── ManualClock ───────────────────────────────────────────────────────────────

/// A clock that only moves when told to.  Cheap to clone; clones share state.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_mins(&self, mins: i64) {
        self.advance_ms(mins * 60 * MS_PER_SECOND);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.now_ms.store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.now_ms.load(Ordering::SeqCst);
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
    }
}

// ── Arithmetic helpers ────────────────────────────────────────────────────────

/// Milliseconds from `earlier` to `later` (negative if reversed).
#[inline]
pub fn ms_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_milliseconds()
}

/// `at + hours`, with fractional hours rounded to the millisecond.  `None`
/// if `hours` is not finite or the result falls outside chrono's range.
pub fn add_hours(at: DateTime<Utc>, hours: f64) -> Option<DateTime<Utc>> {
    let ms = to_whole_ms(hours * MS_PER_HOUR as f64)?;
    at.checked_add_signed(Duration::try_milliseconds(ms)?)
}

/// Planned trip duration for a delivery window of `days` (fractional allowed).
/// `None` if the window does not fit in an `i64` of milliseconds.
pub fn days_to_ms(days: f64) -> Option<i64> {
    to_whole_ms(days * MS_PER_DAY as f64)
}

fn to_whole_ms(ms: f64) -> Option<i64> {
    let ms = ms.round();
    (ms.is_finite() && ms.abs() < i64::MAX as f64).then_some(ms as i64)
}
