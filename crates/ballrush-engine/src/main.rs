//! # Ballrush
//!
//! Headless driver for the Ballrush progression core.
//!
//! Reads one command per line from stdin, applies it to a [`GameSession`]
//! and prints every outward event as a JSON line. Type `help` for commands.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ballrush_common::SystemClock;
use ballrush_engine::{AppConfig, GameSession, LocalStorage, StorageBackend};
use ballrush_gameplay::{
    ControlScheme, Difficulty, GameEvent, GameMode, InputEvent, SceneManifest, StaticManifest,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const HELP: &str = "\
commands:
  status                    show session status
  play <mode>               enter the highest level of a mode
  ready <pickups>           level finished loading with N pickups
  pickup <id>               collect a pickup
  win | die | pause         level events
  next | menu | retry       win / game over screen choices
  tap <slot>                tap a life icon
  reward <lives>            ad reward granted
  levels <mode>             list levels the picker offers
  pick | close              open / close the level picker
  select <mode> <level>     start a level from the picker
  reset | confirm           reset progress (asks first)
  difficulty <easy|normal|hard>
  controls <target|accelerometer|joystick|keyboard>
  login <account> | login-fail <reason> | logout
  save | clear | quit";

/// Main entry point.
fn main() -> Result<()> {
    let config = AppConfig::load();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_filter))?)
        .init();

    info!("Ballrush starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut session = open_session(config)?;
    session.subscribe(|event: &GameEvent| match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("Could not print event: {e}"),
    });
    session.tick();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        if let Err(e) = run_command(&mut session, line) {
            eprintln!("error: {e}");
        }
        session.tick();
        io::stdout().flush()?;
    }

    session.save_now().context("final save")?;
    info!("Ballrush shutdown complete");
    Ok(())
}

fn open_session(config: AppConfig) -> Result<GameSession> {
    let save_dir = config.resolved_save_dir();
    info!("Saves in {}", save_dir.display());
    let local: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&save_dir));

    let cloud: Option<Arc<dyn StorageBackend>> = match (config.cloud_enabled, &config.cloud_dir) {
        (true, Some(dir)) => {
            info!("Cloud store in {}", dir.display());
            Some(Arc::new(LocalStorage::new(dir)))
        },
        (true, None) => {
            warn!("Cloud enabled without cloud_dir, running local-only");
            None
        },
        (false, _) => None,
    };

    let manifest: Box<dyn SceneManifest> = match &config.manifest_path {
        Some(path) => Box::new(
            StaticManifest::from_json_file(path)
                .with_context(|| format!("loading scene manifest {}", path.display()))?,
        ),
        None => Box::new(StaticManifest::with_levels(config.levels_per_mode)),
    };

    Ok(GameSession::open(
        config,
        local,
        cloud,
        manifest,
        Arc::new(SystemClock),
    ))
}

fn run_command(session: &mut GameSession, line: &str) -> Result<()> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let arg = parts.collect::<Vec<_>>().join(" ");

    let input = match command {
        "help" => {
            println!("{HELP}");
            return Ok(());
        },
        "status" => {
            println!("{}", serde_json::to_string_pretty(&session.status())?);
            return Ok(());
        },
        "play" => InputEvent::LevelStartTriggerEntered {
            mode: parse_mode(&arg)?,
        },
        "ready" => InputEvent::LevelReady {
            pickups: number(&arg)?,
        },
        "pickup" => InputEvent::PickupCollected { id: number(&arg)? },
        "win" => InputEvent::WinReached,
        "die" => InputEvent::PlayerDied,
        "pause" => InputEvent::PauseToggled,
        "next" => InputEvent::NextLevelChosen,
        "menu" => InputEvent::MainMenuChosen,
        "retry" => InputEvent::RetryChosen,
        "tap" => InputEvent::LifeSlotTapped { slot: number(&arg)? },
        "reward" => InputEvent::AdRewardGranted {
            lives: number(&arg)?,
        },
        "confirm" => InputEvent::ResetConfirmed,
        "pick" => InputEvent::LevelSelectOpened,
        "close" => InputEvent::LevelSelectClosed,
        "select" => {
            let (mode, level) = arg
                .rsplit_once(' ')
                .with_context(|| format!("expected '<mode> <level>', got '{arg}'"))?;
            InputEvent::LevelSelected {
                mode: parse_mode(mode)?,
                level: number(level)?,
            }
        },
        "levels" => {
            let levels = session.available_levels(parse_mode(&arg)?);
            let names: Vec<String> = levels.iter().map(|desc| desc.scene_name()).collect();
            println!("{}", serde_json::to_string(&names)?);
            return Ok(());
        },
        "reset" => {
            session.request_reset()?;
            return Ok(());
        },
        "difficulty" => {
            session.set_difficulty(parse_difficulty(&arg)?);
            return Ok(());
        },
        "controls" => {
            session.select_controls(parse_controls(&arg)?);
            return Ok(());
        },
        "login" => {
            session.begin_sign_in();
            session.on_auth_result(Ok(arg));
            return Ok(());
        },
        "logout" => {
            session.sign_out();
            return Ok(());
        },
        "login-fail" => {
            session.begin_sign_in();
            session.on_auth_result(Err(arg));
            return Ok(());
        },
        "save" => {
            session.save_now()?;
            return Ok(());
        },
        "clear" => {
            session.clear_all()?;
            return Ok(());
        },
        other => bail!("unknown command '{other}', try 'help'"),
    };

    // Scene requests reach stdout through the SceneRequested event
    session.handle(input)?;
    Ok(())
}

fn parse_mode(arg: &str) -> Result<GameMode> {
    GameMode::from_name(arg).with_context(|| format!("unknown mode '{arg}'"))
}

fn number(arg: &str) -> Result<u32> {
    arg.parse()
        .with_context(|| format!("expected a number, got '{arg}'"))
}

fn parse_difficulty(arg: &str) -> Result<Difficulty> {
    Ok(match arg.to_ascii_lowercase().as_str() {
        "easy" => Difficulty::Easy,
        "normal" => Difficulty::Normal,
        "hard" => Difficulty::Hard,
        _ => bail!("unknown difficulty '{arg}'"),
    })
}

fn parse_controls(arg: &str) -> Result<ControlScheme> {
    Ok(match arg.to_ascii_lowercase().as_str() {
        "target" => ControlScheme::Target,
        "accelerometer" | "tilt" => ControlScheme::Accelerometer,
        "joystick" => ControlScheme::Joystick,
        "keyboard" => ControlScheme::Keyboard,
        _ => bail!("unknown control scheme '{arg}'"),
    })
}
