//! Session state machine.
//!
//! This module decides which scene the engine should show:
//! - Entering a level from the main menu (with a one-level-back fallback)
//! - Winning, dying, retrying and moving on to the next level
//! - Additive overlays (pause, confirmation dialogs) on top of any screen
//!
//! The controller never loads scenes itself. Every transition returns a
//! [`SceneRequest`] for the engine and queues the matching
//! [`GameEvent::SceneRequested`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use ballrush_common::Timestamp;

use crate::events::GameEvent;
use crate::lives::LivesState;
use crate::mode::{GameMode, WinCondition};
use crate::pause::OverlayStack;
use crate::pickups::{PickupOutcome, PickupTracker};
use crate::progress::ProgressState;
use crate::scene::{ReservedScene, SceneDescriptor, SceneNameResolver};

// ============================================================================
// Session State
// ============================================================================

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SessionState {
    /// At the main menu.
    #[default]
    MainMenu,
    /// Playing a level.
    InLevel {
        /// Mode of the level.
        mode: GameMode,
        /// Level number.
        level: u32,
    },
    /// Pause overlay on top of a level.
    Paused,
    /// Win screen.
    Won,
    /// Game-over screen.
    GameOver,
    /// Splash, confirmation dialog or level picker on top.
    NonInteractiveOverlay,
}

impl SessionState {
    /// Check if a level is being played (not paused).
    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::InLevel { .. })
    }

    /// Check if the player can interact with gameplay.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::MainMenu | Self::InLevel { .. })
    }
}

/// Full scene underneath any overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    MainMenu,
    InLevel(SceneDescriptor),
    Won(SceneDescriptor),
    GameOver(SceneDescriptor),
}

// ============================================================================
// Scene Request
// ============================================================================

/// Scene change the engine should perform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneRequest {
    /// Replace the active scene.
    Load(String),
    /// Load on top of the active scene.
    LoadAdditive(String),
    /// Unload an additive scene.
    UnloadAdditive(String),
    /// Reload the active scene from scratch.
    Reload(String),
}

impl SceneRequest {
    /// Scene the request is about.
    #[must_use]
    pub fn scene_name(&self) -> &str {
        match self {
            Self::Load(name)
            | Self::LoadAdditive(name)
            | Self::UnloadAdditive(name)
            | Self::Reload(name) => name,
        }
    }

    fn load_reserved(scene: ReservedScene) -> Self {
        Self::Load(scene.scene_name().to_string())
    }
}

// ============================================================================
// Session Action
// ============================================================================

/// Player-facing actions, used to report refused transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionAction {
    /// Start a level.
    EnterLevel,
    /// Win the current level.
    Win,
    /// Lose the current level.
    Die,
    /// Continue to the next level.
    NextLevel,
    /// Go back to the main menu.
    MainMenu,
    /// Replay after a game over.
    Retry,
    /// Restart the running level.
    Restart,
    /// Pause or resume.
    TogglePause,
    /// Show an overlay.
    PushOverlay,
}

// ============================================================================
// Session Error
// ============================================================================

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session operation error. State is unchanged whenever one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Action not allowed in the current state.
    #[error("cannot {action:?} while {from:?}")]
    InvalidTransition {
        /// Current state.
        from: SessionState,
        /// Refused action.
        action: SessionAction,
    },
    /// No lives left to start a level.
    #[error("no lives left")]
    OutOfLives,
    /// Mode is not visible yet.
    #[error("mode {0} is locked")]
    ModeLocked(GameMode),
    /// Level is past the mode's progress.
    #[error("level {level} of {mode} is locked")]
    LevelLocked {
        /// Mode.
        mode: GameMode,
        /// Requested level.
        level: u32,
    },
    /// Neither the level nor its fallback was built.
    #[error("scene {0:?} was not built")]
    SceneMissing(String),
    /// Overlay is not additive or already shown.
    #[error("overlay {0:?} cannot be shown")]
    OverlayRejected(ReservedScene),
}

// ============================================================================
// Session Context
// ============================================================================

/// State the controller reads and updates during a transition.
pub struct SessionContext<'a> {
    /// Level progress.
    pub progress: &'a mut ProgressState,
    /// Lives.
    pub lives: &'a mut LivesState,
    /// Pickup counter for the running level.
    pub pickups: &'a mut PickupTracker,
    /// Scene names and existence checks.
    pub resolver: &'a SceneNameResolver,
    /// Current wall-clock time.
    pub now: Timestamp,
}

// ============================================================================
// Session Controller
// ============================================================================

/// Drives menu, level, win, game-over and overlay transitions.
#[derive(Debug, Default)]
pub struct SessionController {
    /// Full scene underneath overlays.
    screen: Screen,
    /// Additive overlays.
    overlays: OverlayStack,
    /// Pending events.
    events: Vec<GameEvent>,
}

impl SessionController {
    /// Create a controller sitting on the main menu.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match self.overlays.top() {
            Some(ReservedScene::Pause) => SessionState::Paused,
            Some(_) => SessionState::NonInteractiveOverlay,
            None => match self.screen {
                Screen::MainMenu => SessionState::MainMenu,
                Screen::InLevel(desc) => SessionState::InLevel {
                    mode: desc.mode,
                    level: desc.level,
                },
                Screen::Won(_) => SessionState::Won,
                Screen::GameOver(_) => SessionState::GameOver,
            },
        }
    }

    /// Level being played, or the one just won or lost.
    #[must_use]
    pub fn current_level(&self) -> Option<SceneDescriptor> {
        match self.screen {
            Screen::MainMenu => None,
            Screen::InLevel(desc) | Screen::Won(desc) | Screen::GameOver(desc) => Some(desc),
        }
    }

    /// Whether the main menu is the full scene.
    #[must_use]
    pub fn on_main_menu(&self) -> bool {
        self.screen == Screen::MainMenu
    }

    /// Overlays currently shown.
    #[must_use]
    pub fn overlays(&self) -> &OverlayStack {
        &self.overlays
    }

    /// Game time multiplier.
    #[must_use]
    pub fn time_scale(&self) -> f32 {
        self.overlays.time_scale()
    }

    /// Take pending events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Starts the mode's highest level, or the one before it if that was not built.
    pub fn enter_level(
        &mut self,
        mode: GameMode,
        ctx: &mut SessionContext<'_>,
    ) -> SessionResult<SceneRequest> {
        let highest = ctx.progress.highest_level(mode);
        self.start_level(SceneDescriptor::new(mode, highest), true, ctx)
    }

    /// Starts a specific unlocked level, e.g. from the level picker.
    pub fn select_level(
        &mut self,
        desc: SceneDescriptor,
        ctx: &mut SessionContext<'_>,
    ) -> SessionResult<SceneRequest> {
        if desc.level == 0 || desc.level > ctx.progress.highest_level(desc.mode) {
            return Err(SessionError::LevelLocked {
                mode: desc.mode,
                level: desc.level,
            });
        }
        self.start_level(desc, false, ctx)
    }

    /// Records a pickup; winning the level when a collect-all mode is complete.
    pub fn pickup_collected(
        &mut self,
        id: u32,
        ctx: &mut SessionContext<'_>,
    ) -> SessionResult<Option<SceneRequest>> {
        let Screen::InLevel(desc) = self.screen else {
            debug!(id, "Pickup outside a level ignored");
            return Ok(None);
        };

        match ctx.pickups.collect(id) {
            PickupOutcome::Complete { total }
                if desc.mode.win_condition() == WinCondition::CollectAll =>
            {
                info!(total, "All pickups collected");
                self.win(ctx).map(Some)
            },
            _ => Ok(None),
        }
    }

    /// Level won: records progress and shows the win screen.
    pub fn win(&mut self, ctx: &mut SessionContext<'_>) -> SessionResult<SceneRequest> {
        let desc = match self.screen {
            Screen::InLevel(desc) if self.overlays.is_empty() => desc,
            _ => return Err(self.invalid(SessionAction::Win)),
        };

        ctx.progress.complete_level(&desc.scene_name());
        ctx.pickups.end();
        self.events.push(GameEvent::LevelComplete {
            mode: desc.mode,
            level: desc.level,
        });
        self.screen = Screen::Won(desc);
        info!(level = %desc, "Level won");
        Ok(self.request(SceneRequest::load_reserved(ReservedScene::Win)))
    }

    /// Player died. Costs a life in a level; nothing on the main menu.
    pub fn player_died(&mut self, ctx: &mut SessionContext<'_>) -> SessionResult<Option<SceneRequest>> {
        match self.screen {
            Screen::MainMenu => {
                debug!("Player died on the main menu, no life lost");
                Ok(None)
            },
            Screen::InLevel(desc) => {
                ctx.lives.lose_life(ctx.now);
                ctx.pickups.end();
                self.overlays.clear();
                self.screen = Screen::GameOver(desc);
                info!(level = %desc, lives = ctx.lives.current(), "Level lost");
                Ok(Some(
                    self.request(SceneRequest::load_reserved(ReservedScene::GameOver)),
                ))
            },
            Screen::Won(_) | Screen::GameOver(_) => Err(self.invalid(SessionAction::Die)),
        }
    }

    /// From the win screen: next level if it was built, else the main menu.
    pub fn next_level(&mut self, ctx: &mut SessionContext<'_>) -> SessionResult<SceneRequest> {
        let desc = match self.screen {
            Screen::Won(desc) if self.overlays.is_empty() => desc,
            _ => return Err(self.invalid(SessionAction::NextLevel)),
        };

        if ctx.lives.is_empty() {
            return Ok(self.out_of_lives());
        }

        match ctx.resolver.next_level(desc) {
            Some(next) => {
                self.screen = Screen::InLevel(next);
                info!(level = %next, "Continuing to next level");
                Ok(self.request(SceneRequest::Load(next.scene_name())))
            },
            None => {
                warn!(level = %desc, "No next level was built, returning to main menu");
                Ok(self.go_to_menu())
            },
        }
    }

    /// Back to the main menu from a level, the win screen or game over.
    pub fn main_menu(&mut self, ctx: &mut SessionContext<'_>) -> SessionResult<SceneRequest> {
        if self.screen == Screen::MainMenu {
            return Err(self.invalid(SessionAction::MainMenu));
        }
        ctx.pickups.end();
        Ok(self.go_to_menu())
    }

    /// From game over: replay the same level, or the main menu with no lives left.
    pub fn retry(&mut self, ctx: &mut SessionContext<'_>) -> SessionResult<SceneRequest> {
        let desc = match self.screen {
            Screen::GameOver(desc) if self.overlays.is_empty() => desc,
            _ => return Err(self.invalid(SessionAction::Retry)),
        };

        if ctx.lives.is_empty() {
            return Ok(self.out_of_lives());
        }

        self.screen = Screen::InLevel(desc);
        info!(level = %desc, "Retrying level");
        Ok(self.request(SceneRequest::Load(desc.scene_name())))
    }

    /// Reloads the running level, dropping any overlays.
    pub fn restart(&mut self, ctx: &mut SessionContext<'_>) -> SessionResult<SceneRequest> {
        let Screen::InLevel(desc) = self.screen else {
            return Err(self.invalid(SessionAction::Restart));
        };
        ctx.pickups.end();
        self.overlays.clear();
        Ok(self.request(SceneRequest::Reload(desc.scene_name())))
    }

    /// Pauses or resumes a level. Same effect from hotkey or button.
    pub fn toggle_pause(&mut self) -> SessionResult<SceneRequest> {
        if !matches!(self.screen, Screen::InLevel(_)) {
            return Err(self.invalid(SessionAction::TogglePause));
        }

        let name = ReservedScene::Pause.scene_name().to_string();
        match self.overlays.top() {
            None => {
                self.overlays.push(ReservedScene::Pause);
                debug!("Paused");
                Ok(self.request(SceneRequest::LoadAdditive(name)))
            },
            Some(ReservedScene::Pause) => {
                self.overlays.pop();
                debug!("Resumed");
                Ok(self.request(SceneRequest::UnloadAdditive(name)))
            },
            Some(_) => Err(self.invalid(SessionAction::TogglePause)),
        }
    }

    /// Shows the level picker over the main menu.
    pub fn open_level_select(&mut self) -> SessionResult<SceneRequest> {
        if self.screen != Screen::MainMenu {
            return Err(self.invalid(SessionAction::PushOverlay));
        }
        self.push_overlay(ReservedScene::LevelSelect)
    }

    /// Shows an additive overlay other than pause.
    pub fn push_overlay(&mut self, overlay: ReservedScene) -> SessionResult<SceneRequest> {
        if overlay == ReservedScene::Pause {
            return Err(self.invalid(SessionAction::PushOverlay));
        }
        if !self.overlays.push(overlay) {
            return Err(SessionError::OverlayRejected(overlay));
        }
        Ok(self.request(SceneRequest::LoadAdditive(overlay.scene_name().to_string())))
    }

    /// Hides the topmost overlay.
    pub fn pop_overlay(&mut self) -> Option<SceneRequest> {
        let overlay = self.overlays.pop()?;
        Some(self.request(SceneRequest::UnloadAdditive(overlay.scene_name().to_string())))
    }

    /// Hides a specific overlay wherever it is in the stack.
    pub fn dismiss_overlay(&mut self, overlay: ReservedScene) -> Option<SceneRequest> {
        self.overlays
            .remove(overlay)
            .then(|| self.request(SceneRequest::UnloadAdditive(overlay.scene_name().to_string())))
    }

    fn start_level(
        &mut self,
        desc: SceneDescriptor,
        allow_fallback: bool,
        ctx: &mut SessionContext<'_>,
    ) -> SessionResult<SceneRequest> {
        if self.screen != Screen::MainMenu {
            return Err(self.invalid(SessionAction::EnterLevel));
        }
        if !ctx.progress.is_unlocked(desc.mode) {
            return Err(SessionError::ModeLocked(desc.mode));
        }
        if ctx.lives.is_empty() {
            warn!(level = %desc, "Level refused, no lives left");
            self.events.push(GameEvent::OutOfLives);
            return Err(SessionError::OutOfLives);
        }

        let target = if ctx.resolver.exists(&desc.scene_name()) {
            desc
        } else {
            match ctx.resolver.previous_level(desc).filter(|_| allow_fallback) {
                Some(prev) => {
                    warn!(wanted = %desc, using = %prev, "Level scene not built, falling back");
                    prev
                },
                None => {
                    warn!(level = %desc, "Level scene not built");
                    return Err(SessionError::SceneMissing(desc.scene_name()));
                },
            }
        };

        self.overlays.clear();
        ctx.pickups.end();
        self.screen = Screen::InLevel(target);
        info!(level = %target, "Entering level");
        Ok(self.request(SceneRequest::Load(target.scene_name())))
    }

    fn out_of_lives(&mut self) -> SceneRequest {
        info!("Out of lives, returning to main menu");
        self.events.push(GameEvent::OutOfLives);
        self.go_to_menu()
    }

    fn go_to_menu(&mut self) -> SceneRequest {
        self.overlays.clear();
        self.screen = Screen::MainMenu;
        self.request(SceneRequest::load_reserved(ReservedScene::MainMenu))
    }

    fn request(&mut self, request: SceneRequest) -> SceneRequest {
        self.events.push(GameEvent::SceneRequested(request.clone()));
        request
    }

    fn invalid(&self, action: SessionAction) -> SessionError {
        let from = self.state();
        warn!(?from, ?action, "Session transition refused");
        SessionError::InvalidTransition { from, action }
    }
}

// ============================================================================
// Tests
// ============================================================================
