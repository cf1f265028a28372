//! Persisted save record and its binary envelope.
//!
//! A record is a flat set of camelCase fields, stored as JSON behind a small
//! header:
//!
//! ```text
//! +------+-----------------------+------------------+
//! | BRSV | major/minor/patch u16 | JSON payload ... |
//! +------+-----------------------+------------------+
//! ```
//!
//! Records from the same major version always load; fields added by later
//! minors fall back to their defaults.

use ballrush_common::{
    from_dotnet_ticks, to_dotnet_ticks, BallrushError, BallrushResult, DataError, MagicBytes,
    SchemaVersion, Timestamp,
};
use ballrush_gameplay::{ControlSettings, Difficulty, GameMode, Settings, DEFAULT_MAX_LIVES};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const HEADER_LEN: usize = 4 + SchemaVersion::ENCODED_LEN;

/// Errors from decoding a stored record.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Header or payload is damaged.
    #[error("Corrupt save record: {0}")]
    Corrupt(#[from] DataError),

    /// Written by an incompatible schema.
    #[error("Incompatible save version {found} (supported: {expected})")]
    IncompatibleVersion {
        /// Version this build writes
        expected: SchemaVersion,
        /// Version in the blob
        found: SchemaVersion,
    },
}

impl From<CodecError> for BallrushError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Corrupt(data) => Self::Data(data),
            CodecError::IncompatibleVersion { expected, found } => Self::VersionMismatch {
                expected: expected.to_string(),
                actual: found.to_string(),
            },
        }
    }
}

/// Everything that survives between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveRecord {
    /// Highest Collect level
    pub collect_level: u32,
    /// Highest Balance level
    pub balance_level: u32,
    /// Highest Dodge level
    pub dodge_level: u32,
    /// Highest Jump level
    pub jump_level: u32,
    /// Highest Push level
    pub push_level: u32,
    /// Lives left
    pub current_lives: u32,
    /// Regeneration baseline in .NET ticks, 0 when none
    pub last_life_lost_ticks: i64,
    /// Difficulty multiplier
    pub difficulty: f32,
    /// Tap-to-target controls
    pub use_target: bool,
    /// Tilt controls
    pub use_accelerometer: bool,
    /// Joystick controls
    pub use_joystick: bool,
    /// Keyboard controls
    pub use_keyboard: bool,
    /// Last save in .NET ticks
    pub last_save_time: i64,
    /// Last load in .NET ticks
    pub last_load_time: i64,
    /// Local account id, empty until first run completes
    pub account_id: String,
}

impl Default for SaveRecord {
    fn default() -> Self {
        let controls = ControlSettings::default();
        Self {
            collect_level: 1,
            balance_level: 1,
            dodge_level: 1,
            jump_level: 1,
            push_level: 1,
            current_lives: DEFAULT_MAX_LIVES,
            last_life_lost_ticks: 0,
            difficulty: Difficulty::Normal.multiplier(),
            use_target: controls.use_target,
            use_accelerometer: controls.use_accelerometer,
            use_joystick: controls.use_joystick,
            use_keyboard: controls.use_keyboard,
            last_save_time: 0,
            last_load_time: 0,
            account_id: String::new(),
        }
    }
}

impl SaveRecord {
    /// Per-mode levels indexed by [`GameMode::index`].
    #[must_use]
    pub fn levels(&self) -> [u32; GameMode::COUNT] {
        let mut levels = [1; GameMode::COUNT];
        for mode in GameMode::all() {
            levels[mode.index()] = *self.level_slot(mode);
        }
        levels
    }

    /// Stores per-mode levels indexed by [`GameMode::index`].
    pub fn set_levels(&mut self, levels: [u32; GameMode::COUNT]) {
        for mode in GameMode::all() {
            *self.level_slot_mut(mode) = levels[mode.index()];
        }
    }

    fn level_slot(&self, mode: GameMode) -> &u32 {
        match mode {
            GameMode::Collect => &self.collect_level,
            GameMode::Balance => &self.balance_level,
            GameMode::Dodge => &self.dodge_level,
            GameMode::Jump => &self.jump_level,
            GameMode::Push => &self.push_level,
        }
    }

    fn level_slot_mut(&mut self, mode: GameMode) -> &mut u32 {
        match mode {
            GameMode::Collect => &mut self.collect_level,
            GameMode::Balance => &mut self.balance_level,
            GameMode::Dodge => &mut self.dodge_level,
            GameMode::Jump => &mut self.jump_level,
            GameMode::Push => &mut self.push_level,
        }
    }

    /// Regeneration baseline. Unreadable tick values count as none.
    #[must_use]
    pub fn lives_baseline(&self) -> Option<Timestamp> {
        if self.last_life_lost_ticks == 0 {
            return None;
        }
        let baseline = from_dotnet_ticks(self.last_life_lost_ticks);
        if baseline.is_none() {
            warn!(
                ticks = self.last_life_lost_ticks,
                "Regeneration baseline out of range, ignoring"
            );
        }
        baseline
    }

    /// Stores the regeneration baseline.
    pub fn set_lives_baseline(&mut self, baseline: Option<Timestamp>) {
        self.last_life_lost_ticks = baseline.and_then(to_dotnet_ticks).unwrap_or(0);
    }

    /// Difficulty and controls, with exactly one control scheme enabled.
    #[must_use]
    pub fn settings(&self) -> Settings {
        let mut controls = ControlSettings {
            use_target: self.use_target,
            use_accelerometer: self.use_accelerometer,
            use_joystick: self.use_joystick,
            use_keyboard: self.use_keyboard,
        };
        controls.normalize();
        Settings {
            difficulty: Difficulty::from_multiplier(self.difficulty),
            controls,
        }
    }

    /// Stores difficulty and controls.
    pub fn set_settings(&mut self, settings: &Settings) {
        self.difficulty = settings.difficulty.multiplier();
        self.use_target = settings.controls.use_target;
        self.use_accelerometer = settings.controls.use_accelerometer;
        self.use_joystick = settings.controls.use_joystick;
        self.use_keyboard = settings.controls.use_keyboard;
    }

    /// Time of the last save, if any.
    #[must_use]
    pub fn saved_at(&self) -> Option<Timestamp> {
        (self.last_save_time != 0)
            .then(|| from_dotnet_ticks(self.last_save_time))
            .flatten()
    }

    /// Records a save at `now`.
    pub fn stamp_saved(&mut self, now: Timestamp) {
        self.last_save_time = to_dotnet_ticks(now).unwrap_or(0);
    }

    /// Records a load at `now`.
    pub fn stamp_loaded(&mut self, now: Timestamp) {
        self.last_load_time = to_dotnet_ticks(now).unwrap_or(0);
    }

    // ========================================================================
    // Codec
    // ========================================================================

    /// Serializes into the versioned envelope.
    pub fn encode(&self) -> BallrushResult<Vec<u8>> {
        let payload =
            serde_json::to_vec(self).map_err(|e| BallrushError::Serialization(e.to_string()))?;
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&MagicBytes::SAVE.0);
        out.extend_from_slice(&SchemaVersion::SAVE_RECORD.to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Parses an envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(DataError::Truncated { len: bytes.len() }.into());
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        if MagicBytes(magic) != MagicBytes::SAVE {
            return Err(DataError::BadMagic(magic).into());
        }

        let mut version = [0u8; SchemaVersion::ENCODED_LEN];
        version.copy_from_slice(&bytes[4..HEADER_LEN]);
        let found = SchemaVersion::from_le_bytes(version);
        if !SchemaVersion::SAVE_RECORD.can_read(&found) {
            return Err(CodecError::IncompatibleVersion {
                expected: SchemaVersion::SAVE_RECORD,
                found,
            });
        }
        if found != SchemaVersion::SAVE_RECORD {
            debug!(%found, "Reading save record from an older minor version");
        }

        serde_json::from_slice(&bytes[HEADER_LEN..])
            .map_err(|e| DataError::Malformed(e.to_string()).into())
    }

    /// Parses an envelope, falling back to defaults on any failure.
    #[must_use]
    pub fn decode_or_default(bytes: &[u8]) -> Self {
        Self::decode(bytes).unwrap_or_else(|e| {
            warn!("Discarding unreadable save record: {e}");
            Self::default()
        })
    }
}

// ============================================================================
// Conflict resolution
// ============================================================================

/// How to reconcile local and cloud copies once both are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Cloud copy replaces local.
    PreferCloud,
    /// Local copy is kept.
    PreferLocal,
    /// Copy with the later `lastSaveTime` wins; ties go to the cloud.
    NewestWins,
    /// Per-mode highest level from either copy; everything else from the newer one.
    #[default]
    MergeProgress,
}

impl ConflictPolicy {
    /// Produces the record to adopt.
    #[must_use]
    pub fn resolve(self, local: &SaveRecord, cloud: &SaveRecord) -> SaveRecord {
        let newer = |a: &SaveRecord, b: &SaveRecord| {
            if a.last_save_time > b.last_save_time {
                a.clone()
            } else {
                b.clone()
            }
        };

        let mut resolved = match self {
            Self::PreferCloud => cloud.clone(),
            Self::PreferLocal => local.clone(),
            Self::NewestWins => newer(local, cloud),
            Self::MergeProgress => {
                let mut merged = newer(local, cloud);
                let (l, c) = (local.levels(), cloud.levels());
                merged.set_levels(std::array::from_fn(|i| l[i].max(c[i])));
                merged
            },
        };

        if resolved.account_id.is_empty() {
            resolved.account_id = if local.account_id.is_empty() {
                cloud.account_id.clone()
            } else {
                local.account_id.clone()
            };
        }
        debug!(policy = ?self, "Resolved save conflict");
        resolved
    }
}
