//! End-to-end integration tests for Ballrush.
//!
//! These tests drive a full [`GameSession`] the way the UI layer would,
//! against real storage backends, and check what the player would see.

#![cfg(test)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ballrush_common::{Clock, ManualClock};
use ballrush_gameplay::{
    GameEvent, GameMode, InputEvent, SceneRequest, SessionError, SessionState, StaticManifest,
};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::cloud_storage::{LocalStorage, MemoryStorage, StorageBackend, SyncStatus};
use crate::config::AppConfig;
use crate::game_session::GameSession;
use crate::save_record::SaveRecord;
use crate::save_sync::{SaveSyncService, SyncOptions};

const START: i64 = 1_700_000_000;

struct World {
    clock: Arc<ManualClock>,
    local: Arc<dyn StorageBackend>,
    cloud: Option<Arc<MemoryStorage>>,
    levels: u32,
}

impl World {
    fn local_only(local: Arc<dyn StorageBackend>) -> Self {
        Self {
            clock: Arc::new(ManualClock::at_unix(START)),
            local,
            cloud: None,
            levels: 5,
        }
    }

    fn with_cloud() -> Self {
        Self {
            cloud: Some(Arc::new(MemoryStorage::new("cloud"))),
            ..Self::local_only(Arc::new(MemoryStorage::new("local")))
        }
    }

    fn open(&self) -> (GameSession, Arc<Mutex<Vec<GameEvent>>>) {
        let cloud = self
            .cloud
            .clone()
            .map(|c| c as Arc<dyn StorageBackend>);
        let mut session = GameSession::open(
            AppConfig::default(),
            Arc::clone(&self.local),
            cloud,
            Box::new(StaticManifest::with_levels(self.levels)),
            self.clock.clone(),
        );
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        session.subscribe(move |e: &GameEvent| sink.lock().push(e.clone()));
        (session, log)
    }
}

fn enter(session: &mut GameSession, mode: GameMode) -> Result<Option<SceneRequest>, SessionError> {
    session.handle(InputEvent::LevelStartTriggerEntered { mode })
}

fn win_level(session: &mut GameSession, mode: GameMode) {
    enter(session, mode).expect("level starts");
    session.handle(InputEvent::WinReached).expect("level won");
    session.handle(InputEvent::MainMenuChosen).expect("back to menu");
}

fn tick_until(session: &mut GameSession, done: impl Fn(&GameSession) -> bool) {
    for _ in 0..500 {
        session.tick();
        if done(session) {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("session never reached the expected state: {:?}", session.status());
}

fn stored(backend: &dyn StorageBackend) -> SaveRecord {
    SaveRecord::decode(&backend.read("save.dat").expect("save exists")).expect("save decodes")
}

/// Progression through the unlock chain
mod progression_tests {
    use super::*;

    #[test]
    fn e2e_fresh_install_then_first_win() {
        let world = World::local_only(Arc::new(MemoryStorage::default()));
        let (mut session, _log) = world.open();

        assert_eq!(session.progress().highest_level(GameMode::Collect), 1);
        assert!(!session.progress().is_unlocked(GameMode::Balance));

        win_level(&mut session, GameMode::Collect);

        assert_eq!(session.progress().highest_level(GameMode::Collect), 2);
        assert!(
            session.progress().is_unlocked(GameMode::Balance),
            "Beating Collect 1 should reveal Balance"
        );
    }

    #[test]
    fn e2e_unlock_chain_order() {
        let world = World::local_only(Arc::new(MemoryStorage::default()));
        let (mut session, log) = world.open();

        let locked = enter(&mut session, GameMode::Push);
        assert!(matches!(locked, Err(SessionError::ModeLocked(GameMode::Push))));

        win_level(&mut session, GameMode::Collect);
        win_level(&mut session, GameMode::Balance);
        win_level(&mut session, GameMode::Push);
        win_level(&mut session, GameMode::Jump);

        assert_eq!(
            session.progress().unlocked_modes(),
            &[
                GameMode::Collect,
                GameMode::Balance,
                GameMode::Push,
                GameMode::Jump,
                GameMode::Dodge
            ]
        );

        session.tick();
        let unlock_events = log
            .lock()
            .iter()
            .filter(|e| matches!(e, GameEvent::UnlocksChanged { .. }))
            .count();
        // One on open, one per newly revealed mode
        assert_eq!(unlock_events, 5);
    }

    #[test]
    fn e2e_replaying_old_level_does_not_advance() {
        let world = World::local_only(Arc::new(MemoryStorage::default()));
        let (mut session, _log) = world.open();
        win_level(&mut session, GameMode::Collect);
        win_level(&mut session, GameMode::Collect);
        assert_eq!(session.progress().highest_level(GameMode::Collect), 3);

        let mut progress = session.progress().clone();
        let outcome = progress.complete_level("Ball Collector 1");
        assert!(!outcome.advanced(), "Replays must not move progress");
        assert_eq!(progress.highest_level(GameMode::Collect), 3);
    }

    #[test]
    fn e2e_level_select_replay_keeps_progress() {
        let world = World::local_only(Arc::new(MemoryStorage::default()));
        let (mut session, _log) = world.open();
        win_level(&mut session, GameMode::Collect);
        win_level(&mut session, GameMode::Collect);

        let offered: Vec<String> = session
            .available_levels(GameMode::Collect)
            .iter()
            .map(|desc| desc.scene_name())
            .collect();
        assert_eq!(
            offered,
            ["Ball Collector 1", "Ball Collector 2", "Ball Collector 3"]
        );

        session
            .handle(InputEvent::LevelSelectOpened)
            .expect("picker opens");
        assert_eq!(session.state(), SessionState::NonInteractiveOverlay);

        let locked = session.handle(InputEvent::LevelSelected {
            mode: GameMode::Collect,
            level: 4,
        });
        assert!(matches!(locked, Err(SessionError::LevelLocked { level: 4, .. })));

        let request = session
            .handle(InputEvent::LevelSelected {
                mode: GameMode::Collect,
                level: 1,
            })
            .expect("replay starts");
        assert_eq!(request, Some(SceneRequest::Load("Ball Collector 1".to_string())));

        session.handle(InputEvent::WinReached).expect("won");
        assert_eq!(
            session.progress().highest_level(GameMode::Collect),
            3,
            "Replaying level 1 must not advance progress"
        );
        assert_eq!(stored(world.local.as_ref()).collect_level, 3);
    }

    #[test]
    fn e2e_next_level_chain_ends_at_main_menu() {
        let mut world = World::local_only(Arc::new(MemoryStorage::default()));
        world.levels = 2;
        let (mut session, _log) = world.open();

        enter(&mut session, GameMode::Collect).expect("starts");
        session.handle(InputEvent::WinReached).expect("won");
        let next = session.handle(InputEvent::NextLevelChosen).expect("next");
        assert_eq!(next, Some(SceneRequest::Load("Ball Collector 2".to_string())));

        session.handle(InputEvent::WinReached).expect("won");
        let next = session.handle(InputEvent::NextLevelChosen).expect("next");
        assert_eq!(next, Some(SceneRequest::Load("Active Main Menu".to_string())));
        assert_eq!(session.state(), SessionState::MainMenu);
    }

    #[test]
    fn e2e_unbuilt_highest_level_falls_back() {
        let local: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::default());
        let mut record = SaveRecord::default();
        record.collect_level = 3;
        record.stamp_saved(ManualClock::at_unix(START).now());
        local
            .write("save.dat", &record.encode().expect("encodes"))
            .expect("written");

        let mut world = World::local_only(local);
        world.levels = 2;
        let (mut session, _log) = world.open();

        let request = enter(&mut session, GameMode::Collect).expect("starts");
        assert_eq!(
            request,
            Some(SceneRequest::Load("Ball Collector 2".to_string())),
            "Missing level 3 should fall back to level 2"
        );
    }

    #[test]
    fn e2e_pause_freezes_time() {
        let world = World::local_only(Arc::new(MemoryStorage::default()));
        let (mut session, _log) = world.open();
        enter(&mut session, GameMode::Collect).expect("starts");

        session.handle(InputEvent::PauseToggled).expect("paused");
        assert_eq!(session.state(), SessionState::Paused);
        assert!(session.status().time_scale.abs() < f32::EPSILON);
        assert!(
            session.handle(InputEvent::WinReached).is_err(),
            "Cannot win while paused"
        );

        session.handle(InputEvent::PauseToggled).expect("resumed");
        assert!(session.state().is_playing());
        assert!((session.status().time_scale - 1.0).abs() < f32::EPSILON);
    }
}

/// Lives, regeneration and the out-of-lives gate
mod lives_tests {
    use super::*;

    #[test]
    fn e2e_out_of_lives_blocks_levels() {
        let world = World::local_only(Arc::new(MemoryStorage::default()));
        let (mut session, log) = world.open();

        for _ in 0..5 {
            enter(&mut session, GameMode::Collect).expect("starts");
            session.handle(InputEvent::PlayerDied).expect("died");
            session.handle(InputEvent::MainMenuChosen).expect("menu");
        }
        assert_eq!(session.lives().current(), 0);

        let refused = enter(&mut session, GameMode::Collect);
        assert!(matches!(refused, Err(SessionError::OutOfLives)));
        session.tick();
        assert!(log.lock().contains(&GameEvent::OutOfLives));

        session
            .handle(InputEvent::AdRewardGranted { lives: 1 })
            .expect("reward");
        assert!(enter(&mut session, GameMode::Collect).is_ok());
    }

    #[test]
    fn e2e_regeneration_catch_up_after_restart() {
        let world = World::local_only(Arc::new(MemoryStorage::default()));
        let (mut session, _log) = world.open();

        // Lose three lives: the timer starts at the first loss
        for _ in 0..3 {
            enter(&mut session, GameMode::Collect).expect("starts");
            session.handle(InputEvent::PlayerDied).expect("died");
            session.handle(InputEvent::MainMenuChosen).expect("menu");
            world.clock.advance_secs(10);
        }
        assert_eq!(session.lives().current(), 2);
        let baseline = session.lives().baseline().expect("timer running");
        drop(session);

        // Closed for 40 minutes after the first loss
        world.clock.set(baseline + chrono::Duration::seconds(2400));
        let (session, _log) = world.open();

        assert_eq!(session.lives().current(), 4);
        assert_eq!(
            session.lives().baseline(),
            Some(baseline + chrono::Duration::seconds(1800)),
            "Baseline must advance by whole intervals, not jump to now"
        );
        assert_eq!(session.status().next_life_in_secs, 300);
    }

    #[test]
    fn e2e_regeneration_caps_at_max() {
        let world = World::local_only(Arc::new(MemoryStorage::default()));
        let (mut session, _log) = world.open();
        for _ in 0..2 {
            enter(&mut session, GameMode::Collect).expect("starts");
            session.handle(InputEvent::PlayerDied).expect("died");
            session.handle(InputEvent::MainMenuChosen).expect("menu");
        }
        assert_eq!(session.lives().current(), 3);

        world.clock.advance_secs(2000);
        session.tick();
        assert_eq!(session.lives().current(), 5);
        assert_eq!(session.status().next_life_in_secs, 0);
    }
}

/// Local persistence
mod persistence_tests {
    use super::*;

    #[test]
    fn e2e_save_load_round_trip_on_disk() {
        let dir = TempDir::new().expect("temp dir");
        let local: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(dir.path()));

        let mut record = SaveRecord::default();
        record.set_levels([4, 3, 2, 1, 1]);
        record.current_lives = 1;
        record.account_id = "player".to_string();

        let mut service = SaveSyncService::new(Arc::clone(&local), None, SyncOptions::default());
        service.save(&record).expect("saved");
        drop(service);

        let mut service = SaveSyncService::new(local, None, SyncOptions::default());
        assert_eq!(service.load(), record);
    }

    #[test]
    fn e2e_session_survives_restart() {
        let dir = TempDir::new().expect("temp dir");
        let world = World::local_only(Arc::new(LocalStorage::new(dir.path())));

        let (mut session, _log) = world.open();
        win_level(&mut session, GameMode::Collect);
        win_level(&mut session, GameMode::Collect);
        session.set_difficulty(ballrush_gameplay::Difficulty::Easy);
        let account_id = session.status().account_id;
        drop(session);

        let (session, _log) = world.open();
        assert_eq!(session.progress().highest_level(GameMode::Collect), 3);
        assert_eq!(
            session.settings().difficulty,
            ballrush_gameplay::Difficulty::Easy
        );
        assert_eq!(session.status().account_id, account_id);
    }

    #[test]
    fn e2e_corrupt_save_starts_fresh() {
        let dir = TempDir::new().expect("temp dir");
        let local: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(dir.path()));
        local.write("save.dat", b"BRSV\x01\x00garbage").expect("written");

        let world = World::local_only(Arc::clone(&local));
        let (session, _log) = world.open();
        assert_eq!(session.progress().highest_level(GameMode::Collect), 1);
        assert_eq!(session.lives().current(), 5);

        // Replaced with a valid save
        assert_eq!(stored(local.as_ref()).collect_level, 1);
    }

    #[test]
    fn e2e_clear_all_removes_save() {
        let dir = TempDir::new().expect("temp dir");
        let world = World::local_only(Arc::new(LocalStorage::new(dir.path())));
        let (mut session, _log) = world.open();
        win_level(&mut session, GameMode::Collect);

        session.clear_all().expect("cleared");
        assert!(!dir.path().join("save.dat").exists());
        assert_eq!(session.progress().highest_level(GameMode::Collect), 1);
    }
}

/// Cloud sync and accounts
mod cloud_tests {
    use super::*;

    #[test]
    fn e2e_cloud_write_failure_keeps_playing() {
        let world = World::with_cloud();
        let cloud = world.cloud.clone().expect("cloud");
        cloud.set_fail_writes(true);

        let (mut session, _log) = world.open();
        session.on_auth_result(Ok("player-1".to_string()));
        tick_until(&mut session, |s| s.sync().status() == SyncStatus::Failed);

        win_level(&mut session, GameMode::Collect);
        assert_eq!(stored(world.local.as_ref()).collect_level, 2);
        tick_until(&mut session, |s| s.sync().status() == SyncStatus::Failed);
    }

    #[test]
    fn e2e_sign_in_creates_cloud_account() {
        let world = World::with_cloud();
        let (mut session, log) = world.open();
        win_level(&mut session, GameMode::Collect);

        assert!(session.begin_sign_in());
        session.on_auth_result(Ok("player-1".to_string()));
        tick_until(&mut session, |s| s.sync().status() == SyncStatus::Synced);

        assert!(log.lock().contains(&GameEvent::AccountCreated));
        let cloud = world.cloud.as_ref().expect("cloud");
        assert_eq!(stored(cloud.as_ref()).collect_level, 2);
    }

    #[test]
    fn e2e_sign_in_loads_cloud_progress() {
        let world = World::with_cloud();
        let mut cloud_record = SaveRecord::default();
        cloud_record.set_levels([3, 2, 1, 1, 1]);
        cloud_record.last_save_time = 1;
        world
            .cloud
            .as_ref()
            .expect("cloud")
            .write("save.dat", &cloud_record.encode().expect("encodes"))
            .expect("written");

        let (mut session, log) = world.open();
        session.begin_sign_in();
        session.on_auth_result(Ok("player-1".to_string()));
        tick_until(&mut session, |s| {
            s.progress().highest_level(GameMode::Balance) == 2
        });

        assert_eq!(session.progress().highest_level(GameMode::Collect), 3);
        assert!(session.progress().is_unlocked(GameMode::Push));
        session.tick();
        assert!(log.lock().contains(&GameEvent::AccountLoaded));
        assert_eq!(stored(world.local.as_ref()).balance_level, 2);
    }

    #[test]
    fn e2e_unreachable_cloud_degrades_to_local() {
        let world = World::with_cloud();
        world.cloud.as_ref().expect("cloud").set_available(false);

        let (mut session, log) = world.open();
        session.on_auth_result(Ok("player-1".to_string()));
        win_level(&mut session, GameMode::Collect);
        session.tick();

        assert_eq!(session.sync().status(), SyncStatus::LocalOnly);
        assert_eq!(stored(world.local.as_ref()).collect_level, 2);
        assert!(!log
            .lock()
            .iter()
            .any(|e| matches!(e, GameEvent::AccountLoaded | GameEvent::AccountCreated)));
    }

    #[test]
    fn e2e_auth_failure_stays_local() {
        let world = World::with_cloud();
        let (mut session, log) = world.open();
        session.begin_sign_in();
        session.on_auth_result(Err("cancelled".to_string()));
        win_level(&mut session, GameMode::Collect);
        session.tick();

        assert!(world.cloud.as_ref().expect("cloud").is_empty());
        assert!(log.lock().contains(&GameEvent::AuthFailed {
            reason: "cancelled".to_string()
        }));
        assert!(!session.sync().is_authenticated());
    }

    #[test]
    fn e2e_cloud_load_announces_lives_once() {
        let world = World::with_cloud();
        let now = world.clock.now();
        let mut cloud_record = SaveRecord::default();
        cloud_record.current_lives = 3;
        cloud_record.set_lives_baseline(Some(now - chrono::Duration::seconds(1000)));
        cloud_record.stamp_saved(now + chrono::Duration::seconds(10));
        world
            .cloud
            .as_ref()
            .expect("cloud")
            .write("save.dat", &cloud_record.encode().expect("encodes"))
            .expect("written");

        let (mut session, log) = world.open();
        session.tick();
        log.lock().clear();

        session.on_auth_result(Ok("player-1".to_string()));
        tick_until(&mut session, |s| s.lives().current() == 4);
        session.tick();

        let lives_events: Vec<GameEvent> = log
            .lock()
            .iter()
            .filter(|e| matches!(e, GameEvent::LivesChanged { .. }))
            .cloned()
            .collect();
        assert_eq!(
            lives_events,
            vec![GameEvent::LivesChanged { lives: 4 }],
            "Regeneration on a cloud load should be announced once"
        );
    }
}
