//! Additive overlay handling.
//!
//! Pause, splash, the reset confirmation and the level picker are loaded on
//! top of whatever scene is active instead of replacing it. The scene below
//! stays alive with time frozen until the last overlay is removed.

use tracing::debug;

use crate::scene::ReservedScene;

/// Time scale while nothing is overlaid.
pub const NORMAL_TIME_SCALE: f32 = 1.0;

/// Time scale while an overlay is up.
pub const FROZEN_TIME_SCALE: f32 = 0.0;

/// Stack of additive overlays, topmost last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayStack {
    stack: Vec<ReservedScene>,
}

impl OverlayStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an overlay. Returns `false` if it is not additive or already shown.
    pub fn push(&mut self, overlay: ReservedScene) -> bool {
        if !overlay.is_additive() || self.contains(overlay) {
            debug!(overlay = overlay.scene_name(), "Overlay not pushed");
            return false;
        }
        self.stack.push(overlay);
        true
    }

    /// Remove the topmost overlay.
    pub fn pop(&mut self) -> Option<ReservedScene> {
        self.stack.pop()
    }

    /// Remove a specific overlay wherever it sits. Returns `false` if absent.
    pub fn remove(&mut self, overlay: ReservedScene) -> bool {
        let before = self.stack.len();
        self.stack.retain(|o| *o != overlay);
        self.stack.len() != before
    }

    /// Remove everything, topmost first.
    pub fn clear(&mut self) -> Vec<ReservedScene> {
        let mut drained: Vec<_> = self.stack.drain(..).collect();
        drained.reverse();
        drained
    }

    /// Topmost overlay.
    #[must_use]
    pub fn top(&self) -> Option<ReservedScene> {
        self.stack.last().copied()
    }

    /// Whether `overlay` is shown.
    #[must_use]
    pub fn contains(&self, overlay: ReservedScene) -> bool {
        self.stack.contains(&overlay)
    }

    /// Whether the pause overlay is shown.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.contains(ReservedScene::Pause)
    }

    /// Number of overlays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Whether nothing is overlaid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Game time multiplier for the scene underneath.
    #[must_use]
    pub fn time_scale(&self) -> f32 {
        if self.stack.is_empty() {
            NORMAL_TIME_SCALE
        } else {
            FROZEN_TIME_SCALE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_pop() {
        let mut overlays = OverlayStack::new();
        assert!(overlays.push(ReservedScene::Pause));
        assert!(overlays.is_paused());
        assert_eq!(overlays.time_scale(), FROZEN_TIME_SCALE);
        assert_eq!(overlays.pop(), Some(ReservedScene::Pause));
        assert_eq!(overlays.time_scale(), NORMAL_TIME_SCALE);
    }

    #[test]
    fn test_full_scenes_rejected() {
        let mut overlays = OverlayStack::new();
        assert!(!overlays.push(ReservedScene::Win));
        assert!(!overlays.push(ReservedScene::GameOver));
        assert!(!overlays.push(ReservedScene::MainMenu));
        assert!(overlays.is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut overlays = OverlayStack::new();
        assert!(overlays.push(ReservedScene::LevelSelect));
        assert!(!overlays.push(ReservedScene::LevelSelect));
        assert_eq!(overlays.len(), 1);
    }

    #[test]
    fn test_remove_from_middle() {
        let mut overlays = OverlayStack::new();
        overlays.push(ReservedScene::Pause);
        overlays.push(ReservedScene::ResetConfirmation);
        assert!(overlays.remove(ReservedScene::Pause));
        assert_eq!(overlays.top(), Some(ReservedScene::ResetConfirmation));
        assert!(!overlays.remove(ReservedScene::Pause));
    }

    #[test]
    fn test_clear_topmost_first() {
        let mut overlays = OverlayStack::new();
        overlays.push(ReservedScene::Splash);
        overlays.push(ReservedScene::Pause);
        assert_eq!(
            overlays.clear(),
            vec![ReservedScene::Pause, ReservedScene::Splash]
        );
        assert!(overlays.is_empty());
    }
}
