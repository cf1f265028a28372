//! # Ballrush Gameplay
//!
//! Engine-free gameplay core for Ballrush.
//!
//! This crate provides the progression and session rules of the five ball minigames:
//! - Game mode catalog and unlock chain
//! - Scene name building, parsing and existence checks
//! - Level progress per mode
//! - Lives with wall-clock regeneration
//! - Difficulty and control settings
//! - Pickup counting
//! - Event bus toward the UI layer
//! - Session state machine with additive overlays

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod events;
pub mod lives;
pub mod mode;
pub mod pause;
pub mod pickups;
pub mod progress;
pub mod scene;
pub mod session;
pub mod settings;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::events::*;
    pub use crate::lives::*;
    pub use crate::mode::*;
    pub use crate::pause::*;
    pub use crate::pickups::*;
    pub use crate::progress::*;
    pub use crate::scene::*;
    pub use crate::session::*;
    pub use crate::settings::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use ballrush_common::{Clock, ManualClock};

    #[test]
    fn test_fresh_install_scenario() {
        let mut progress = ProgressState::new();
        assert_eq!(progress.highest_level(GameMode::Collect), 1);
        assert!(!progress.is_unlocked(GameMode::Balance));

        progress.complete_level(&build_scene_name(GameMode::Collect, 1));
        assert_eq!(progress.highest_level(GameMode::Collect), 2);
        assert!(progress.is_unlocked(GameMode::Balance));
    }

    #[test]
    fn test_session_round_through_a_level() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let mut progress = ProgressState::new();
        let mut lives = LivesState::default();
        let mut pickups = PickupTracker::new();
        let resolver = SceneNameResolver::new(Box::new(StaticManifest::with_levels(3)));
        let mut session = SessionController::new();

        let mut ctx = SessionContext {
            progress: &mut progress,
            lives: &mut lives,
            pickups: &mut pickups,
            resolver: &resolver,
            now: clock.now(),
        };
        session.enter_level(GameMode::Collect, &mut ctx).unwrap();
        session.player_died(&mut ctx).unwrap();
        session.retry(&mut ctx).unwrap();
        session.win(&mut ctx).unwrap();
        session.main_menu(&mut ctx).unwrap();

        assert_eq!(session.state(), SessionState::MainMenu);
        assert_eq!(progress.highest_level(GameMode::Collect), 2);
        assert_eq!(lives.current(), 4);
    }
}
