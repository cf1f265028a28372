//! Top-level game session.
//!
//! [`GameSession`] owns every piece of per-player state for one running game
//! and is the single entry point for the UI layer: inputs go in through
//! [`GameSession::handle`], time advances through [`GameSession::tick`], and
//! outward events reach subscribers on the next tick.
//!
//! Any change to progress, lives or settings is saved before `handle` or
//! `tick` returns.

use std::sync::Arc;

use ballrush_common::{BallrushResult, Clock, Timestamp};
use ballrush_gameplay::{
    ControlScheme, Difficulty, EventBus, EventHandler, GameEvent, GameMode, InputEvent,
    LivesState, PickupTracker, ProgressState, ReservedScene, SceneDescriptor, SceneManifest,
    SceneNameResolver, SceneRequest, SessionContext, SessionController, SessionResult,
    SessionState, Settings, Subscription, SubscriptionId,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::account::{ensure_account_id, AccountState};
use crate::cloud_storage::{StorageBackend, SyncStatus};
use crate::config::AppConfig;
use crate::save_record::SaveRecord;
use crate::save_sync::{SaveSyncService, SyncEvent};

/// Serializable snapshot for UIs and the headless driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    /// Session state
    pub state: SessionState,
    /// Lives left
    pub lives: u32,
    /// Maximum lives
    pub max_lives: u32,
    /// Seconds until the next life, 0 while full
    pub next_life_in_secs: i64,
    /// Highest level per mode, in declaration order
    pub levels: Vec<(GameMode, u32)>,
    /// Modes shown in menus
    pub unlocked: Vec<GameMode>,
    /// Difficulty
    pub difficulty: Difficulty,
    /// Active control scheme
    pub controls: Option<ControlScheme>,
    /// Pickups collected and placed in the running level
    pub pickups: (u32, u32),
    /// Game time multiplier
    pub time_scale: f32,
    /// Cloud sync state
    pub sync: SyncStatus,
    /// Sign-in state
    pub account: AccountState,
    /// Local account id
    pub account_id: String,
}

/// One player's running game.
#[derive(Debug)]
pub struct GameSession {
    config: AppConfig,
    clock: Arc<dyn Clock>,

    // === Gameplay State ===
    progress: ProgressState,
    lives: LivesState,
    settings: Settings,
    settings_dirty: bool,
    pickups: PickupTracker,
    resolver: SceneNameResolver,
    controller: SessionController,

    // === Persistence ===
    sync: SaveSyncService,
    account: AccountState,

    // === Events ===
    bus: EventBus,
}

impl GameSession {
    /// Loads the save (applying offline regeneration) and starts on the main menu.
    pub fn open(
        config: AppConfig,
        local: Arc<dyn StorageBackend>,
        cloud: Option<Arc<dyn StorageBackend>>,
        manifest: Box<dyn SceneManifest>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut sync = SaveSyncService::new(local, cloud, config.sync_options());
        let mut record = sync.load();
        let now = clock.now();

        let lives_config = config.lives_config();
        if record.saved_at().is_none() {
            debug!("Fresh save, starting with full lives");
            record.current_lives = lives_config.max_lives;
            record.set_lives_baseline(None);
        }
        ensure_account_id(&mut record);
        record.stamp_loaded(now);

        let progress = ProgressState::from_levels(record.levels());
        let lives =
            LivesState::restore(lives_config, record.current_lives, record.lives_baseline(), now);
        let settings = record.settings();

        let mut session = Self {
            config,
            clock,
            progress,
            lives,
            settings,
            settings_dirty: false,
            pickups: PickupTracker::new(),
            resolver: SceneNameResolver::new(manifest),
            controller: SessionController::new(),
            sync,
            account: AccountState::default(),
            bus: EventBus::default(),
        };

        info!(
            lives = session.lives.current(),
            unlocked = session.progress.unlocked_modes().len(),
            "Session opened"
        );
        // Write back the load stamp, account id and any regenerated lives
        let _ = session.persist();
        session.bus.publish_all([
            GameEvent::LivesChanged {
                lives: session.lives.current(),
            },
            GameEvent::UnlocksChanged {
                unlocked: session.progress.unlocked_modes().to_vec(),
            },
        ]);
        session
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Level progress.
    #[must_use]
    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    /// Lives.
    #[must_use]
    pub fn lives(&self) -> &LivesState {
        &self.lives
    }

    /// Player settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Scene state machine.
    #[must_use]
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Scene name resolver.
    #[must_use]
    pub fn resolver(&self) -> &SceneNameResolver {
        &self.resolver
    }

    /// Save persistence.
    #[must_use]
    pub fn sync(&self) -> &SaveSyncService {
        &self.sync
    }

    /// Sign-in state.
    #[must_use]
    pub fn account(&self) -> &AccountState {
        &self.account
    }

    /// Levels the level picker offers for `mode`: built levels up to the highest reached.
    #[must_use]
    pub fn available_levels(&self, mode: GameMode) -> Vec<SceneDescriptor> {
        self.resolver
            .available_levels(mode, self.progress.highest_level(mode))
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    /// Snapshot of everything a UI would show.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let now = self.clock.now();
        SessionStatus {
            state: self.controller.state(),
            lives: self.lives.current(),
            max_lives: self.lives.max(),
            next_life_in_secs: self.lives.time_until_next_life(now).num_seconds(),
            levels: GameMode::all()
                .map(|mode| (mode, self.progress.highest_level(mode)))
                .collect(),
            unlocked: self.progress.unlocked_modes().to_vec(),
            difficulty: self.settings.difficulty,
            controls: self.settings.controls.active(),
            pickups: (self.pickups.current(), self.pickups.total()),
            time_scale: self.controller.time_scale(),
            sync: self.sync.status(),
            account: self.account.clone(),
            account_id: self.sync.record().account_id.clone(),
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Registers an outward event handler.
    pub fn subscribe(&mut self, handler: impl EventHandler + 'static) -> SubscriptionId {
        self.bus.subscribe(handler)
    }

    /// Registers a handler that is removed when the guard drops.
    #[must_use = "dropping the guard unsubscribes immediately"]
    pub fn subscribe_scoped(&mut self, handler: impl EventHandler + 'static) -> Subscription {
        self.bus.subscribe_scoped(handler)
    }

    /// Removes a handler.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Applies one input from the UI or gameplay layer.
    ///
    /// Refused transitions leave every piece of state unchanged.
    pub fn handle(&mut self, input: InputEvent) -> SessionResult<Option<SceneRequest>> {
        let now = self.clock.now();
        if input == InputEvent::ResetConfirmed {
            let Some(request) = self.controller.dismiss_overlay(ReservedScene::ResetConfirmation)
            else {
                warn!("Reset confirmed without the confirmation dialog, ignored");
                return Ok(None);
            };
            self.reset_all_at(now);
            return Ok(Some(request));
        }

        let mut ctx = SessionContext {
            progress: &mut self.progress,
            lives: &mut self.lives,
            pickups: &mut self.pickups,
            resolver: &self.resolver,
            now,
        };
        let controller = &mut self.controller;

        let result = match &input {
            InputEvent::LevelReady { pickups } => {
                if controller.state().is_playing() {
                    ctx.pickups.begin(*pickups);
                } else {
                    debug!(pickups, "Level ready outside a level ignored");
                }
                Ok(None)
            },
            InputEvent::PickupCollected { id } => controller.pickup_collected(*id, &mut ctx),
            InputEvent::PlayerDied => controller.player_died(&mut ctx),
            InputEvent::LevelStartTriggerEntered { mode } => {
                controller.enter_level(*mode, &mut ctx).map(Some)
            },
            InputEvent::AdRewardGranted { lives } => {
                let added = ctx.lives.add_lives(*lives);
                info!(granted = lives, added, "Ad reward applied");
                Ok(None)
            },
            InputEvent::PauseToggled => controller.toggle_pause().map(Some),
            InputEvent::WinReached => controller.win(&mut ctx).map(Some),
            InputEvent::NextLevelChosen => controller.next_level(&mut ctx).map(Some),
            InputEvent::MainMenuChosen => controller.main_menu(&mut ctx).map(Some),
            InputEvent::RetryChosen => controller.retry(&mut ctx).map(Some),
            InputEvent::LifeSlotTapped { slot } => {
                ctx.lives.on_tap_for_easter_egg(*slot, now);
                Ok(None)
            },
            InputEvent::LevelSelectOpened => controller.open_level_select().map(Some),
            InputEvent::LevelSelectClosed => {
                Ok(controller.dismiss_overlay(ReservedScene::LevelSelect))
            },
            InputEvent::LevelSelected { mode, level } => controller
                .select_level(SceneDescriptor::new(*mode, *level), &mut ctx)
                .map(Some),
            InputEvent::ResetConfirmed => Ok(None),
        };

        if let Err(e) = &result {
            warn!(?input, "Input refused: {e}");
        }
        self.flush();
        result
    }

    /// Advances time: regenerates lives, applies cloud results, and delivers
    /// queued events. Returns the number of events delivered.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        self.lives.tick(now);

        for event in self.sync.poll() {
            match event {
                SyncEvent::AccountLoaded(record) => {
                    self.apply_record(&record, now);
                    self.bus.publish(GameEvent::AccountLoaded);
                },
                SyncEvent::AccountCreated => {
                    self.bus.publish(GameEvent::AccountCreated);
                },
            }
        }

        self.flush();
        self.bus.dispatch()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Shows the reset confirmation dialog.
    pub fn request_reset(&mut self) -> SessionResult<SceneRequest> {
        let result = self.controller.push_overlay(ReservedScene::ResetConfirmation);
        self.flush();
        result
    }

    /// Resets progress and refills lives, then saves.
    pub fn reset_all(&mut self) {
        let now = self.clock.now();
        self.reset_all_at(now);
    }

    fn reset_all_at(&mut self, now: Timestamp) {
        self.progress.reset_all();
        self.lives.reset_lives(self.lives.max(), now);
        self.flush();
    }

    /// Deletes local and cloud saves and starts over in memory.
    ///
    /// Nothing is written until the next change.
    pub fn clear_all(&mut self) -> BallrushResult<()> {
        self.sync.clear_all()?;
        let now = self.clock.now();

        self.progress.reset_all();
        self.lives.reset_lives(self.lives.max(), now);
        self.settings = Settings::default();
        self.settings_dirty = false;
        self.progress.take_dirty();
        self.lives.take_dirty();
        self.publish_component_events();
        Ok(())
    }

    /// Changes difficulty.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        if self.settings.difficulty != difficulty {
            self.settings.difficulty = difficulty;
            self.settings_dirty = true;
            self.flush();
        }
    }

    /// Switches to a single control scheme.
    pub fn select_controls(&mut self, scheme: ControlScheme) {
        if self.settings.controls.active() != Some(scheme) {
            self.settings.controls.select(scheme);
            self.settings_dirty = true;
            self.flush();
        }
    }

    /// Saves immediately. Failures are also published as [`GameEvent::SaveFailed`].
    pub fn save_now(&mut self) -> BallrushResult<()> {
        self.persist()
    }

    /// Starts platform sign-in. Returns `false` if already signed in or waiting.
    pub fn begin_sign_in(&mut self) -> bool {
        self.account.begin_sign_in()
    }

    /// Applies the platform's sign-in answer.
    ///
    /// Success starts the cloud account check; its result arrives on a later tick.
    pub fn on_auth_result(&mut self, result: Result<String, String>) {
        match self.account.on_auth_result(result) {
            Some(event) => {
                self.sync.set_authenticated(false);
                self.bus.publish(event);
            },
            None => {
                self.sync.set_authenticated(true);
                if !self.sync.begin_account_check() {
                    warn!("Signed in but cloud storage is not reachable");
                }
            },
        }
    }

    /// Signs out; cloud sync stops until the next sign-in.
    pub fn sign_out(&mut self) {
        self.account.sign_out();
        self.sync.set_authenticated(false);
        info!("Signed out, continuing local-only");
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn apply_record(&mut self, record: &SaveRecord, now: Timestamp) {
        let levels = record.levels();
        for mode in GameMode::all() {
            let level = levels[mode.index()];
            if self.progress.highest_level(mode) != level {
                self.progress.set_highest_level(mode, level);
            }
        }

        self.lives = LivesState::restore(
            self.config.lives_config(),
            record.current_lives,
            record.lives_baseline(),
            now,
        );
        // Catch-up events are folded into the single notification below
        let _ = self.lives.take_events();
        self.bus.publish(GameEvent::LivesChanged {
            lives: self.lives.current(),
        });

        let settings = record.settings();
        if settings != self.settings {
            self.settings = settings;
            self.settings_dirty = true;
        }
        info!("Applied cloud save");
    }

    fn publish_component_events(&mut self) {
        let events = self
            .controller
            .take_events()
            .into_iter()
            .chain(self.progress.take_events())
            .chain(self.lives.take_events())
            .chain(self.pickups.take_events());
        for event in events {
            self.bus.publish(event);
        }
    }

    /// Publishes component events and saves if anything persistent changed.
    fn flush(&mut self) {
        self.publish_component_events();
        let dirty = self.progress.take_dirty() | self.lives.take_dirty();
        if dirty || std::mem::take(&mut self.settings_dirty) {
            let _ = self.persist();
        }
    }

    fn build_record(&self, now: Timestamp) -> SaveRecord {
        let mut record = self.sync.record().clone();
        record.set_levels(self.progress.levels());
        record.current_lives = self.lives.current();
        record.set_lives_baseline(self.lives.baseline());
        record.set_settings(&self.settings);
        ensure_account_id(&mut record);
        record.stamp_saved(now);
        record
    }

    fn persist(&mut self) -> BallrushResult<()> {
        let record = self.build_record(self.clock.now());
        let result = self.sync.save(&record);
        if let Err(e) = &result {
            warn!("Save failed: {e}");
            self.bus.publish(GameEvent::SaveFailed {
                reason: e.to_string(),
            });
        }
        result
    }
}
