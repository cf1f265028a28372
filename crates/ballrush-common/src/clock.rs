//! Wall-clock abstraction.
//!
//! Lives regeneration is measured against wall-clock time so that a player
//! who closes the game still regenerates. Everything that needs "now" takes a
//! [`Clock`] so tests can drive time by hand.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// A point in wall-clock time.
pub type Timestamp = DateTime<Utc>;

/// .NET ticks (100 ns units since 0001-01-01) at the Unix epoch.
pub const DOTNET_TICKS_AT_UNIX_EPOCH: i64 = 621_355_968_000_000_000;

/// .NET ticks per second.
pub const DOTNET_TICKS_PER_SECOND: i64 = 10_000_000;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}

impl std::fmt::Debug for dyn Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Clock({})", self.now())
    }
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Creates a clock frozen at the given Unix second.
    #[must_use]
    pub fn at_unix(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Moves the clock forward (or backward for negative values).
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Moves the clock forward by whole seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance(chrono::Duration::seconds(secs));
    }

    /// Jumps to an absolute time.
    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Converts a timestamp to .NET ticks.
///
/// Returns `None` if the value does not fit in an `i64`.
#[must_use]
pub fn to_dotnet_ticks(ts: Timestamp) -> Option<i64> {
    let secs = ts.timestamp().checked_mul(DOTNET_TICKS_PER_SECOND)?;
    let sub = i64::from(ts.timestamp_subsec_nanos() / 100);
    DOTNET_TICKS_AT_UNIX_EPOCH.checked_add(secs)?.checked_add(sub)
}

/// Converts .NET ticks to a timestamp.
///
/// Returns `None` for negative ticks or values chrono cannot represent.
#[must_use]
pub fn from_dotnet_ticks(ticks: i64) -> Option<Timestamp> {
    if ticks < 0 {
        return None;
    }
    let rel = ticks - DOTNET_TICKS_AT_UNIX_EPOCH;
    let secs = rel.div_euclid(DOTNET_TICKS_PER_SECOND);
    let nanos = (rel.rem_euclid(DOTNET_TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}
