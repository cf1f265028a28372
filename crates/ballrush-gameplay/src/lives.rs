//! Lives and regeneration.
//!
//! Lives regenerate one at a time on a wall-clock interval while below max.
//! The regeneration baseline is set when the player drops below max and is
//! only ever advanced by whole intervals, so partial progress toward the next
//! life survives restarts and catch-up.
//!
//! Losing a life while already below max does not restart the timer.

use chrono::Duration;
use tracing::{debug, info, warn};

use ballrush_common::Timestamp;

use crate::events::GameEvent;

/// Default maximum lives.
pub const DEFAULT_MAX_LIVES: u32 = 5;

/// Default regeneration interval in seconds (15 minutes).
pub const DEFAULT_REGEN_INTERVAL_SECS: i64 = 15 * 60;

/// Default rapid taps needed for the reset easter egg.
pub const DEFAULT_EASTER_EGG_TAPS: u32 = 5;

/// Default maximum gap between easter egg taps in milliseconds.
pub const DEFAULT_EASTER_EGG_WINDOW_MS: i64 = 2_000;

/// Tunables for [`LivesState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivesConfig {
    /// Maximum lives.
    pub max_lives: u32,
    /// Time to regenerate one life.
    pub regen_interval: Duration,
    /// Consecutive taps that trigger the easter egg.
    pub easter_egg_taps: u32,
    /// Largest allowed gap between two easter egg taps.
    pub easter_egg_window: Duration,
}

impl Default for LivesConfig {
    fn default() -> Self {
        Self {
            max_lives: DEFAULT_MAX_LIVES,
            regen_interval: Duration::seconds(DEFAULT_REGEN_INTERVAL_SECS),
            easter_egg_taps: DEFAULT_EASTER_EGG_TAPS,
            easter_egg_window: Duration::milliseconds(DEFAULT_EASTER_EGG_WINDOW_MS),
        }
    }
}

impl LivesConfig {
    /// Clamps values into workable ranges.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.max_lives = self.max_lives.max(1);
        if self.regen_interval < Duration::seconds(1) {
            self.regen_interval = Duration::seconds(1);
        }
        self.easter_egg_taps = self.easter_egg_taps.max(2);
        if self.easter_egg_window < Duration::zero() {
            self.easter_egg_window = Duration::zero();
        }
        self
    }
}

/// Current lives, regeneration timer and easter egg counter.
#[derive(Debug, Clone)]
pub struct LivesState {
    config: LivesConfig,
    current: u32,
    /// Start of the running regeneration interval. `None` while full.
    baseline: Option<Timestamp>,
    taps: u32,
    last_tap: Option<Timestamp>,
    dirty: bool,
    events: Vec<GameEvent>,
}

impl Default for LivesState {
    fn default() -> Self {
        Self::new(LivesConfig::default())
    }
}

impl LivesState {
    /// Full lives.
    #[must_use]
    pub fn new(config: LivesConfig) -> Self {
        let config = config.validated();
        Self {
            config,
            current: config.max_lives,
            baseline: None,
            taps: 0,
            last_tap: None,
            dirty: false,
            events: Vec::new(),
        }
    }

    /// Rebuilds state from persisted values and applies offline regeneration.
    ///
    /// A missing baseline while below max is treated as "lost just now".
    #[must_use]
    pub fn restore(
        config: LivesConfig,
        current: u32,
        baseline: Option<Timestamp>,
        now: Timestamp,
    ) -> Self {
        let mut state = Self::new(config);
        state.current = current.min(state.config.max_lives);
        state.baseline = if state.is_full() {
            None
        } else {
            Some(baseline.unwrap_or_else(|| {
                warn!("Lives below max without a regeneration baseline, restarting timer");
                now
            }))
        };

        let awarded = state.catch_up(now);
        if awarded > 0 {
            info!(awarded, lives = state.current, "Regenerated lives while away");
        }
        state
    }

    /// Tunables in effect.
    #[must_use]
    pub fn config(&self) -> &LivesConfig {
        &self.config
    }

    /// Current lives.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Maximum lives.
    #[must_use]
    pub fn max(&self) -> u32 {
        self.config.max_lives
    }

    /// Regeneration baseline, `None` while full.
    #[must_use]
    pub fn baseline(&self) -> Option<Timestamp> {
        self.baseline
    }

    /// Whether lives are at max.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current >= self.config.max_lives
    }

    /// Whether no lives are left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current == 0
    }

    /// Spends a life. Returns `false` (and changes nothing) at zero.
    pub fn lose_life(&mut self, now: Timestamp) -> bool {
        if self.current == 0 {
            warn!("Tried to lose a life with none left");
            return false;
        }

        let was_full = self.is_full();
        self.current -= 1;
        if was_full || self.baseline.is_none() {
            self.baseline = Some(now);
        }

        debug!(lives = self.current, restarted_timer = was_full, "Life lost");
        self.changed();
        true
    }

    /// Adds one life. See [`add_lives`](Self::add_lives).
    pub fn add_life(&mut self) -> u32 {
        self.add_lives(1)
    }

    /// Adds up to `n` lives, clamped to max. Returns how many were added.
    pub fn add_lives(&mut self, n: u32) -> u32 {
        if self.is_full() {
            debug!(lives = self.current, "Lives already full, nothing added");
            return 0;
        }

        let before = self.current;
        self.current = self.current.saturating_add(n).min(self.config.max_lives);
        if self.is_full() {
            self.baseline = None;
        }

        let added = self.current - before;
        if added > 0 {
            self.changed();
        }
        added
    }

    /// Sets lives to `n` (clamped). The timer restarts from `now` if below max.
    pub fn reset_lives(&mut self, n: u32, now: Timestamp) {
        let before = self.current;
        self.current = n.min(self.config.max_lives);
        self.baseline = (!self.is_full()).then_some(now);
        info!(lives = self.current, "Lives reset");

        self.dirty = true;
        if self.current != before {
            self.events.push(GameEvent::LivesChanged {
                lives: self.current,
            });
        }
    }

    /// Awards every whole interval elapsed since the baseline. Returns lives awarded.
    ///
    /// The baseline moves forward by the intervals consumed, never to `now`.
    pub fn tick(&mut self, now: Timestamp) -> u32 {
        if self.is_full() {
            return 0;
        }
        let Some(baseline) = self.baseline else {
            self.baseline = Some(now);
            return 0;
        };

        let elapsed_ms = (now - baseline).num_milliseconds();
        let interval_ms = self.config.regen_interval.num_milliseconds();
        if elapsed_ms < interval_ms {
            return 0;
        }

        let intervals = elapsed_ms / interval_ms;
        let missing = i64::from(self.config.max_lives - self.current);
        let awarded = intervals.min(missing) as u32;

        self.current += awarded;
        self.baseline = if self.is_full() {
            None
        } else {
            Some(baseline + self.config.regen_interval * awarded as i32)
        };

        debug!(awarded, lives = self.current, "Lives regenerated");
        self.changed();
        awarded
    }

    /// Same as [`tick`](Self::tick); named for the load-time call.
    pub fn catch_up(&mut self, now: Timestamp) -> u32 {
        self.tick(now)
    }

    /// Time until the next life, zero while full.
    #[must_use]
    pub fn time_until_next_life(&self, now: Timestamp) -> Duration {
        if self.is_full() {
            return Duration::zero();
        }
        let interval = self.config.regen_interval;
        let Some(baseline) = self.baseline else {
            return interval;
        };

        let remaining = interval - (now - baseline);
        if remaining < Duration::zero() {
            Duration::zero()
        } else if remaining > interval {
            interval
        } else {
            remaining
        }
    }

    /// Counts a tap on a life slot. Enough rapid taps reset lives to `slot`.
    ///
    /// Returns `true` when the easter egg fired.
    pub fn on_tap_for_easter_egg(&mut self, slot: u32, now: Timestamp) -> bool {
        let in_window = self.last_tap.is_some_and(|last| {
            let gap = now - last;
            gap >= Duration::zero() && gap <= self.config.easter_egg_window
        });

        self.taps = if in_window { self.taps + 1 } else { 1 };
        self.last_tap = Some(now);

        if self.taps < self.config.easter_egg_taps {
            return false;
        }

        self.taps = 0;
        info!(slot, "Life slot easter egg triggered");
        self.reset_lives(slot, now);
        true
    }

    /// Returns and clears the "needs saving" flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Take pending events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn changed(&mut self) {
        self.dirty = true;
        self.events.push(GameEvent::LivesChanged {
            lives: self.current,
        });
    }
}
