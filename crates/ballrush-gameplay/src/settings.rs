//! Player settings data model.
//!
//! This module provides settings structures for:
//! - Difficulty (a speed/force multiplier stored as a float)
//! - Control scheme (exactly one input method active)

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ============================================================================
// Difficulty
// ============================================================================

/// Game difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    /// Slower ball, gentler forces.
    Easy,
    /// Baseline.
    #[default]
    Normal,
    /// Faster ball, stronger forces.
    Hard,
}

impl Difficulty {
    /// All difficulties, easiest first.
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Normal, Self::Hard];

    /// Multiplier as persisted.
    #[must_use]
    pub const fn multiplier(&self) -> f32 {
        match self {
            Self::Easy => 0.8,
            Self::Normal => 1.0,
            Self::Hard => 1.2,
        }
    }

    /// Nearest difficulty to a stored multiplier. Non-finite values read as Normal.
    #[must_use]
    pub fn from_multiplier(value: f32) -> Self {
        if !value.is_finite() {
            warn!(value, "Non-finite difficulty multiplier, using Normal");
            return Self::Normal;
        }
        let mut best = Self::Normal;
        for candidate in Self::ALL {
            if (candidate.multiplier() - value).abs() < (best.multiplier() - value).abs() {
                best = candidate;
            }
        }
        best
    }

    /// Display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Normal => "Normal",
            Self::Hard => "Hard",
        }
    }
}

// ============================================================================
// Controls
// ============================================================================

/// Input method for rolling the ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlScheme {
    /// Tap a target point.
    Target,
    /// Tilt the device.
    Accelerometer,
    /// On-screen joystick.
    Joystick,
    /// Arrow keys / WASD.
    Keyboard,
}

impl ControlScheme {
    /// Scheme used when none is enabled.
    pub const PLATFORM_DEFAULT: ControlScheme = ControlScheme::Joystick;
}

/// Control flags as persisted. Exactly one should be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Tap-to-target.
    pub use_target: bool,
    /// Tilt.
    pub use_accelerometer: bool,
    /// On-screen joystick.
    pub use_joystick: bool,
    /// Keyboard.
    pub use_keyboard: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self::only(ControlScheme::PLATFORM_DEFAULT)
    }
}

impl ControlSettings {
    /// Settings with only `scheme` enabled.
    #[must_use]
    pub fn only(scheme: ControlScheme) -> Self {
        let mut controls = Self {
            use_target: false,
            use_accelerometer: false,
            use_joystick: false,
            use_keyboard: false,
        };
        controls.select(scheme);
        controls
    }

    /// Enables `scheme` and disables the others.
    pub fn select(&mut self, scheme: ControlScheme) {
        self.use_target = scheme == ControlScheme::Target;
        self.use_accelerometer = scheme == ControlScheme::Accelerometer;
        self.use_joystick = scheme == ControlScheme::Joystick;
        self.use_keyboard = scheme == ControlScheme::Keyboard;
        debug!(?scheme, "Control scheme selected");
    }

    /// First enabled scheme, in declaration order.
    #[must_use]
    pub fn active(&self) -> Option<ControlScheme> {
        [
            (self.use_target, ControlScheme::Target),
            (self.use_accelerometer, ControlScheme::Accelerometer),
            (self.use_joystick, ControlScheme::Joystick),
            (self.use_keyboard, ControlScheme::Keyboard),
        ]
        .into_iter()
        .find_map(|(on, scheme)| on.then_some(scheme))
    }

    /// Makes exactly one scheme active. Returns `true` if anything changed.
    pub fn normalize(&mut self) -> bool {
        let before = *self;
        let scheme = self.active().unwrap_or_else(|| {
            warn!("No control scheme enabled, falling back to {:?}", ControlScheme::PLATFORM_DEFAULT);
            ControlScheme::PLATFORM_DEFAULT
        });
        self.select(scheme);
        *self != before
    }
}

// ============================================================================
// Combined
// ============================================================================

/// All player settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Difficulty.
    pub difficulty: Difficulty,
    /// Control scheme flags.
    pub controls: ControlSettings,
}
