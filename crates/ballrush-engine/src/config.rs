//! Application configuration.
//!
//! Provides tunables for lives, cloud sync, storage locations, and logging.
//! Configuration can be loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use ballrush_gameplay::LivesConfig;

use crate::save_record::ConflictPolicy;
use crate::save_sync::SyncOptions;

/// Configuration file name.
const CONFIG_FILE: &str = "ballrush.toml";

/// Application directory under the platform config dir.
const APP_DIR: &str = "ballrush";

/// Longest accepted regeneration interval (30 days).
const MAX_REGEN_INTERVAL_SECS: u64 = 30 * 24 * 60 * 60;

/// Longest accepted easter egg tap gap.
const MAX_EASTER_EGG_WINDOW_MS: u64 = 60_000;

/// Application configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // === Lives ===
    /// Maximum lives (1-99)
    pub max_lives: u32,
    /// Seconds to regenerate one life
    pub regen_interval_secs: u64,
    /// Taps on a life icon that trigger the refill easter egg
    pub easter_egg_taps: u32,
    /// Largest gap between easter egg taps in milliseconds
    pub easter_egg_window_ms: u64,

    // === Cloud ===
    /// Enable cloud sync
    pub cloud_enabled: bool,
    /// Cloud load timeout in milliseconds (100-60000)
    pub cloud_timeout_ms: u64,
    /// How to reconcile local and cloud saves
    pub conflict_policy: ConflictPolicy,
    /// Directory standing in for the cloud store in the headless driver
    pub cloud_dir: Option<PathBuf>,

    // === Storage ===
    /// Save directory (None = platform config dir)
    pub save_dir: Option<PathBuf>,
    /// Key the save is stored under
    pub save_key: String,

    // === Scenes ===
    /// JSON list of built scene names (None = built-in manifest)
    pub manifest_path: Option<PathBuf>,
    /// Levels per mode in the built-in manifest
    pub levels_per_mode: u32,

    // === Debug ===
    /// Tracing filter directive
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            // Lives
            max_lives: 5,
            regen_interval_secs: 900, // 15 minutes
            easter_egg_taps: 5,
            easter_egg_window_ms: 2000,

            // Cloud
            cloud_enabled: false,
            cloud_timeout_ms: 3000,
            conflict_policy: ConflictPolicy::MergeProgress,
            cloud_dir: None,

            // Storage
            save_dir: None,
            save_key: "save.dat".to_string(),

            // Scenes
            manifest_path: None,
            levels_per_mode: 10,

            // Debug
            log_filter: "ballrush=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let mut config: Self = match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        return Self::default();
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                return Self::default();
            },
        };
        config.validate();
        config
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        app_dir().map_or_else(|| PathBuf::from(CONFIG_FILE), |dir| dir.join(CONFIG_FILE))
    }

    /// Directory the local save lives in.
    #[must_use]
    pub fn resolved_save_dir(&self) -> PathBuf {
        self.save_dir
            .clone()
            .or_else(|| app_dir().map(|dir| dir.join("saves")))
            .unwrap_or_else(|| PathBuf::from("saves"))
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Lives
        self.max_lives = self.max_lives.clamp(1, 99);
        self.regen_interval_secs = self.regen_interval_secs.clamp(1, MAX_REGEN_INTERVAL_SECS);
        self.easter_egg_taps = self.easter_egg_taps.max(2);
        self.easter_egg_window_ms = self.easter_egg_window_ms.min(MAX_EASTER_EGG_WINDOW_MS);

        // Cloud
        self.cloud_timeout_ms = self.cloud_timeout_ms.clamp(100, 60_000);

        // Storage
        if self.save_key.trim().is_empty() {
            warn!("Empty save key, using default");
            self.save_key = Self::default().save_key;
        }

        // Scenes
        self.levels_per_mode = self.levels_per_mode.clamp(1, 999);
    }

    /// Lives tunables.
    #[must_use]
    pub fn lives_config(&self) -> LivesConfig {
        LivesConfig {
            max_lives: self.max_lives,
            regen_interval: chrono::Duration::seconds(
                i64::try_from(self.regen_interval_secs.min(MAX_REGEN_INTERVAL_SECS)).unwrap_or(1),
            ),
            easter_egg_taps: self.easter_egg_taps,
            easter_egg_window: chrono::Duration::milliseconds(
                i64::try_from(self.easter_egg_window_ms.min(MAX_EASTER_EGG_WINDOW_MS)).unwrap_or(0),
            ),
        }
        .validated()
    }

    /// Save sync tunables.
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            key: self.save_key.clone(),
            policy: self.conflict_policy,
            timeout: Duration::from_millis(self.cloud_timeout_ms),
        }
    }
}

/// Platform config directory for this application.
fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_lives, 5);
        assert_eq!(config.regen_interval_secs, 900);
        assert!(!config.cloud_enabled);
        assert_eq!(config.conflict_policy, ConflictPolicy::MergeProgress);
        assert_eq!(config.save_key, "save.dat");
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        // Set invalid values
        config.max_lives = 0;
        config.cloud_timeout_ms = 5;
        config.easter_egg_taps = 1;
        config.save_key = "  ".to_string();

        config.validate();

        // Should be clamped
        assert_eq!(config.max_lives, 1);
        assert_eq!(config.cloud_timeout_ms, 100);
        assert_eq!(config.easter_egg_taps, 2);
        assert_eq!(config.save_key, "save.dat");
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("ballrush.toml");

        let mut config = AppConfig::default();
        config.max_lives = 3;
        config.cloud_enabled = true;
        config.conflict_policy = ConflictPolicy::NewestWins;
        config.save_dir = Some(temp_dir.path().join("saves"));

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = AppConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = AppConfig::load_from("/nonexistent/path/ballrush.toml");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_config_load_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("ballrush.toml");
        fs::write(&path, "max_lives = \"many\"").expect("write");
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("ballrush.toml");
        fs::write(&path, "max_lives = 500\nconflict_policy = \"prefer_local\"\n").expect("write");

        let config = AppConfig::load_from(&path);
        assert_eq!(config.max_lives, 99);
        assert_eq!(config.conflict_policy, ConflictPolicy::PreferLocal);
        assert_eq!(config.regen_interval_secs, 900);
    }

    #[test]
    fn test_lives_config() {
        let mut config = AppConfig::default();
        config.regen_interval_secs = 60;
        config.easter_egg_window_ms = 1500;
        let lives = config.lives_config();
        assert_eq!(lives.max_lives, 5);
        assert_eq!(lives.regen_interval, chrono::Duration::seconds(60));
        assert_eq!(lives.easter_egg_window, chrono::Duration::milliseconds(1500));
    }

    #[test]
    fn test_sync_options() {
        let mut config = AppConfig::default();
        config.cloud_timeout_ms = 750;
        let options = config.sync_options();
        assert_eq!(options.timeout, Duration::from_millis(750));
        assert_eq!(options.key, "save.dat");
    }

    #[test]
    fn test_resolved_save_dir_override() {
        let mut config = AppConfig::default();
        config.save_dir = Some(PathBuf::from("/tmp/ballrush-saves"));
        assert_eq!(config.resolved_save_dir(), PathBuf::from("/tmp/ballrush-saves"));
    }

    #[test]
    fn test_config_toml_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize");

        assert!(toml_str.contains("max_lives"));
        assert!(toml_str.contains("conflict_policy = \"merge_progress\""));
    }
}
