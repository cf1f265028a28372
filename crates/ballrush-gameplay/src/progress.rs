//! Level progression.
//!
//! Each mode has a highest-unlocked level, starting at 1. Finishing the level
//! you are currently "on" moves it up by one; replaying an older level does
//! nothing. Modes show in menus once their unlock-chain predecessor is past
//! level 1.

use tracing::{debug, info};

use crate::events::GameEvent;
use crate::mode::{GameMode, UNLOCK_CHAIN};
use crate::scene::parse_scene_name;

/// Level every mode starts on.
pub const FIRST_LEVEL: u32 = 1;

/// What `complete_level` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The scene name is not a level scene.
    NotALevelScene,
    /// A level other than the current highest was finished.
    Replay {
        /// Mode of the finished level.
        mode: GameMode,
        /// Level that was finished.
        level: u32,
        /// Highest level of the mode, unchanged.
        highest: u32,
    },
    /// Progress moved forward.
    Advanced {
        /// Mode that advanced.
        mode: GameMode,
        /// New highest level.
        highest: u32,
        /// Whether a mode became visible as a result.
        unlocks_changed: bool,
    },
}

impl CompletionOutcome {
    /// Whether progress moved.
    #[must_use]
    pub fn advanced(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

/// Per-mode highest-unlocked levels.
#[derive(Debug, Clone)]
pub struct ProgressState {
    levels: [u32; GameMode::COUNT],
    unlocked: Vec<GameMode>,
    dirty: bool,
    events: Vec<GameEvent>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    /// Fresh progress: every mode on level 1.
    #[must_use]
    pub fn new() -> Self {
        Self::from_levels([FIRST_LEVEL; GameMode::COUNT])
    }

    /// Progress from stored per-mode levels (indexed by [`GameMode::index`]).
    /// Zero is read as 1.
    #[must_use]
    pub fn from_levels(levels: [u32; GameMode::COUNT]) -> Self {
        let mut state = Self {
            levels: levels.map(|l| l.max(FIRST_LEVEL)),
            unlocked: Vec::new(),
            dirty: false,
            events: Vec::new(),
        };
        state.unlocked = state.compute_unlocked();
        state
    }

    /// Raw per-mode levels, indexed by [`GameMode::index`].
    #[must_use]
    pub fn levels(&self) -> [u32; GameMode::COUNT] {
        self.levels
    }

    /// Highest unlocked level of a mode.
    #[must_use]
    pub fn highest_level(&self, mode: GameMode) -> u32 {
        self.levels[mode.index()]
    }

    /// Whether the mode shows in menus.
    #[must_use]
    pub fn is_unlocked(&self, mode: GameMode) -> bool {
        match mode.unlock_predecessor() {
            None => true,
            Some(prev) => self.highest_level(prev) > FIRST_LEVEL,
        }
    }

    /// Visible modes in unlock-chain order.
    #[must_use]
    pub fn unlocked_modes(&self) -> &[GameMode] {
        &self.unlocked
    }

    /// Records a finished level.
    ///
    /// Only finishing the mode's current highest level advances it.
    pub fn complete_level(&mut self, scene_name: &str) -> CompletionOutcome {
        let Some(desc) = parse_scene_name(scene_name) else {
            debug!(scene = scene_name, "Completed scene is not a level, progress unchanged");
            return CompletionOutcome::NotALevelScene;
        };

        let highest = self.highest_level(desc.mode);
        if desc.level != highest {
            debug!(
                mode = %desc.mode,
                level = desc.level,
                highest,
                "Replayed level finished, progress unchanged"
            );
            return CompletionOutcome::Replay {
                mode: desc.mode,
                level: desc.level,
                highest,
            };
        }

        let new_highest = highest.saturating_add(1);
        self.levels[desc.mode.index()] = new_highest;
        self.dirty = true;
        let unlocks_changed = self.refresh_unlocked();

        info!(mode = %desc.mode, highest = new_highest, "Level progress advanced");
        CompletionOutcome::Advanced {
            mode: desc.mode,
            highest: new_highest,
            unlocks_changed,
        }
    }

    /// Puts every mode back on level 1.
    pub fn reset_all(&mut self) {
        self.levels = [FIRST_LEVEL; GameMode::COUNT];
        self.dirty = true;
        self.refresh_unlocked();
        info!("All progress reset");
    }

    /// Overwrites a mode's level. Used when applying loaded data.
    pub fn set_highest_level(&mut self, mode: GameMode, level: u32) {
        self.levels[mode.index()] = level.max(FIRST_LEVEL);
        self.dirty = true;
        self.refresh_unlocked();
    }

    /// Keeps the larger level of each mode.
    pub fn merge_max(&mut self, other: &ProgressState) {
        for mode in GameMode::all() {
            let i = mode.index();
            if other.levels[i] > self.levels[i] {
                self.levels[i] = other.levels[i];
                self.dirty = true;
            }
        }
        self.refresh_unlocked();
    }

    /// Returns and clears the "needs saving" flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Take pending events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn compute_unlocked(&self) -> Vec<GameMode> {
        UNLOCK_CHAIN
            .iter()
            .copied()
            .filter(|m| self.is_unlocked(*m))
            .collect()
    }

    /// Recomputes visibility; emits `UnlocksChanged` if it moved.
    fn refresh_unlocked(&mut self) -> bool {
        let unlocked = self.compute_unlocked();
        if unlocked == self.unlocked {
            return false;
        }
        self.unlocked = unlocked;
        self.events.push(GameEvent::UnlocksChanged {
            unlocked: self.unlocked.clone(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::build_scene_name;
    use proptest::prelude::*;

    #[test]
    fn test_fresh_install() {
        let progress = ProgressState::new();
        assert_eq!(progress.highest_level(GameMode::Collect), 1);
        assert!(progress.is_unlocked(GameMode::Collect));
        assert!(!progress.is_unlocked(GameMode::Balance));
        assert_eq!(progress.unlocked_modes(), &[GameMode::Collect]);
    }

    #[test]
    fn test_complete_first_collect_level_unlocks_balance() {
        let mut progress = ProgressState::new();
        let outcome = progress.complete_level("Ball Collector 1");

        assert_eq!(
            outcome,
            CompletionOutcome::Advanced {
                mode: GameMode::Collect,
                highest: 2,
                unlocks_changed: true,
            }
        );
        assert_eq!(progress.highest_level(GameMode::Collect), 2);
        assert!(progress.is_unlocked(GameMode::Balance));
        assert!(progress.take_dirty());
        assert!(!progress.take_dirty());

        let events = progress.take_events();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::UnlocksChanged { unlocked } if unlocked.contains(&GameMode::Balance)
        )));
    }

    #[test]
    fn test_complete_is_idempotent() {
        let mut progress = ProgressState::new();
        assert!(progress.complete_level("Ball Collector 1").advanced());
        let second = progress.complete_level("Ball Collector 1");
        assert_eq!(
            second,
            CompletionOutcome::Replay {
                mode: GameMode::Collect,
                level: 1,
                highest: 2
            }
        );
        assert_eq!(progress.highest_level(GameMode::Collect), 2);
    }

    #[test]
    fn test_complete_ahead_of_progress_is_ignored() {
        let mut progress = ProgressState::new();
        let outcome = progress.complete_level("Ball Jumper 4");
        assert!(matches!(outcome, CompletionOutcome::Replay { level: 4, highest: 1, .. }));
        assert_eq!(progress.highest_level(GameMode::Jump), 1);
    }

    #[test]
    fn test_complete_non_level_scene() {
        let mut progress = ProgressState::new();
        assert_eq!(progress.complete_level("WIN"), CompletionOutcome::NotALevelScene);
        assert!(!progress.take_dirty());
    }

    #[test]
    fn test_unlock_chain_order() {
        let mut progress = ProgressState::new();
        progress.set_highest_level(GameMode::Balance, 2);
        assert!(progress.is_unlocked(GameMode::Push));
        assert!(!progress.is_unlocked(GameMode::Jump));

        progress.set_highest_level(GameMode::Push, 3);
        assert!(progress.is_unlocked(GameMode::Jump));
        assert!(!progress.is_unlocked(GameMode::Dodge));
    }

    #[test]
    fn test_reset_all() {
        let mut progress = ProgressState::from_levels([4, 3, 2, 5, 6]);
        progress.reset_all();
        for mode in GameMode::all() {
            assert_eq!(progress.highest_level(mode), 1);
        }
        assert_eq!(progress.unlocked_modes(), &[GameMode::Collect]);
        assert!(progress.take_dirty());
    }

    #[test]
    fn test_from_levels_clamps_zero() {
        let progress = ProgressState::from_levels([0, 0, 0, 0, 0]);
        assert_eq!(progress.levels(), [1; GameMode::COUNT]);
    }

    #[test]
    fn test_merge_max() {
        let mut local = ProgressState::from_levels([3, 1, 1, 1, 2]);
        let cloud = ProgressState::from_levels([2, 4, 1, 1, 1]);
        local.merge_max(&cloud);
        assert_eq!(local.levels(), [3, 4, 1, 1, 2]);
    }

    proptest! {
        #[test]
        fn prop_unlock_is_monotonic(completions in prop::collection::vec((0usize..GameMode::COUNT, 1u32..6), 0..60)) {
            let mut progress = ProgressState::new();
            let mut seen_unlocked = vec![false; GameMode::COUNT];
            let modes: Vec<GameMode> = GameMode::all().collect();

            for (mode_idx, level) in completions {
                let before = progress.levels();
                progress.complete_level(&build_scene_name(modes[mode_idx], level));
                let after = progress.levels();
                for i in 0..GameMode::COUNT {
                    prop_assert!(after[i] >= before[i]);
                }
                for mode in &modes {
                    let now = progress.is_unlocked(*mode);
                    prop_assert!(now || !seen_unlocked[mode.index()]);
                    seen_unlocked[mode.index()] = now;
                }
            }
        }

        #[test]
        fn prop_double_complete_increments_once(mode_idx in 0usize..GameMode::COUNT, steps in 0u32..5) {
            let mode = GameMode::all().nth(mode_idx).unwrap();
            let mut progress = ProgressState::new();
            for level in 1..=steps {
                progress.complete_level(&build_scene_name(mode, level));
            }
            let current = progress.highest_level(mode);
            let name = build_scene_name(mode, current);
            progress.complete_level(&name);
            progress.complete_level(&name);
            prop_assert_eq!(progress.highest_level(mode), current + 1);
        }
    }
}
