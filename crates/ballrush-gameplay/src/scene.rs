//! Scene naming.
//!
//! Scene names are the contract between this core and the engine's scene
//! system. Level scenes follow `"Ball {Mode}{Suffix} {N}"`; everything else
//! is one of the reserved [`ReservedScene`] names.
//!
//! Parsing never fails loudly: anything that is not a level scene comes back
//! as `None` and callers branch on that.

use std::path::Path;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::mode::{GameMode, MODE_TABLE};

/// Prefix shared by every level scene.
pub const LEVEL_SCENE_PREFIX: &str = "Ball ";

/// A level scene, parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneDescriptor {
    /// Mode the level belongs to.
    pub mode: GameMode,
    /// Level number, starting at 1.
    pub level: u32,
}

impl SceneDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(mode: GameMode, level: u32) -> Self {
        Self { mode, level }
    }

    /// Scene name for this level.
    #[must_use]
    pub fn scene_name(&self) -> String {
        build_scene_name(self.mode, self.level)
    }
}

impl std::fmt::Display for SceneDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.scene_name())
    }
}

/// Non-level scenes with fixed names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservedScene {
    /// The main menu.
    MainMenu,
    /// Shown after a failed level.
    GameOver,
    /// Shown after a won level.
    Win,
    /// Pause menu, layered over a level.
    Pause,
    /// Startup splash.
    Splash,
    /// "Reset all progress?" dialog.
    ResetConfirmation,
    /// Level picker.
    LevelSelect,
}

impl ReservedScene {
    /// Every reserved scene.
    pub const ALL: [ReservedScene; 7] = [
        Self::MainMenu,
        Self::GameOver,
        Self::Win,
        Self::Pause,
        Self::Splash,
        Self::ResetConfirmation,
        Self::LevelSelect,
    ];

    /// Engine scene name.
    #[must_use]
    pub const fn scene_name(self) -> &'static str {
        match self {
            Self::MainMenu => "Active Main Menu",
            Self::GameOver => "GAME OVER",
            Self::Win => "WIN",
            Self::Pause => "PAUSE",
            Self::Splash => "Splash Screen",
            Self::ResetConfirmation => "RESET_CONFIRMATION",
            Self::LevelSelect => "LEVEL SELECT",
        }
    }

    /// Looks up a reserved scene by exact name.
    #[must_use]
    pub fn from_scene_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.scene_name() == name)
    }

    /// Whether the scene is loaded on top of the current one instead of replacing it.
    #[must_use]
    pub const fn is_additive(self) -> bool {
        matches!(
            self,
            Self::Pause | Self::Splash | Self::ResetConfirmation | Self::LevelSelect
        )
    }
}

/// Classification of an arbitrary scene name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    /// A playable level.
    Level(SceneDescriptor),
    /// The main menu.
    MainMenu,
    /// Any other reserved scene.
    Reserved(ReservedScene),
    /// Not a name this core knows about.
    Unknown,
}

impl SceneKind {
    /// Whether the scene has no gameplay.
    #[must_use]
    pub const fn is_non_interactive(&self) -> bool {
        !matches!(self, Self::Level(_))
    }
}

/// Builds `"Ball {mode}{suffix} {level}"`.
#[must_use]
pub fn build_scene_name(mode: GameMode, level: u32) -> String {
    format!("{LEVEL_SCENE_PREFIX}{}{} {level}", mode.name(), mode.suffix())
}

/// Parses a level scene name.
///
/// The level is the trailing run of digits. The mode is the catalog entry
/// whose name+suffix is a prefix of the text between `"Ball "` and the
/// space before the digits; the longest match wins.
#[must_use]
pub fn parse_scene_name(name: &str) -> Option<SceneDescriptor> {
    let rest = name.strip_prefix(LEVEL_SCENE_PREFIX)?;

    let digits_start = rest
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    let level: u32 = rest[digits_start..].parse().ok()?;
    if level == 0 {
        return None;
    }

    let middle = rest[..digits_start].strip_suffix(' ')?;

    MODE_TABLE
        .iter()
        .filter(|info| {
            middle
                .strip_prefix(info.name)
                .is_some_and(|tail| tail.starts_with(info.suffix))
        })
        .max_by_key(|info| info.name.len() + info.suffix.len())
        .map(|info| SceneDescriptor::new(info.mode, level))
}

/// Classifies any scene name.
#[must_use]
pub fn classify(name: &str) -> SceneKind {
    if let Some(desc) = parse_scene_name(name) {
        return SceneKind::Level(desc);
    }
    match ReservedScene::from_scene_name(name) {
        Some(ReservedScene::MainMenu) => SceneKind::MainMenu,
        Some(reserved) => SceneKind::Reserved(reserved),
        None => SceneKind::Unknown,
    }
}

// ============================================================================
// Build manifest
// ============================================================================

/// Errors from a build manifest lookup.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest file was not valid JSON.
    #[error("Manifest parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The manifest source could not be queried.
    #[error("Manifest unavailable: {0}")]
    Unavailable(String),
}

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// The engine's list of compiled scenes.
pub trait SceneManifest: Send + Sync {
    /// Whether a scene with this exact name was built.
    fn contains(&self, scene_name: &str) -> ManifestResult<bool>;
}

/// Manifest backed by an in-memory set of names.
#[derive(Debug, Clone, Default)]
pub struct StaticManifest {
    scenes: AHashSet<String>,
}

impl StaticManifest {
    /// Creates a manifest from scene names.
    #[must_use]
    pub fn new<I, S>(scenes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scenes: scenes.into_iter().map(Into::into).collect(),
        }
    }

    /// Reserved scenes plus levels `1..=levels_per_mode` of every mode.
    #[must_use]
    pub fn with_levels(levels_per_mode: u32) -> Self {
        let reserved = ReservedScene::ALL
            .into_iter()
            .map(|s| s.scene_name().to_string());
        let levels = GameMode::all()
            .flat_map(|mode| (1..=levels_per_mode).map(move |n| build_scene_name(mode, n)));
        Self::new(reserved.chain(levels))
    }

    /// Loads a JSON array of scene names.
    pub fn from_json_file(path: impl AsRef<Path>) -> ManifestResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let names: Vec<String> = serde_json::from_str(&contents)?;
        debug!("Loaded {} scene names from {}", names.len(), path.as_ref().display());
        Ok(Self::new(names))
    }

    /// Number of scenes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether the manifest is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl SceneManifest for StaticManifest {
    fn contains(&self, scene_name: &str) -> ManifestResult<bool> {
        Ok(self.scenes.contains(scene_name))
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Maps between scene names and levels, and checks scenes exist.
pub struct SceneNameResolver {
    manifest: Box<dyn SceneManifest>,
}

impl std::fmt::Debug for SceneNameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneNameResolver").finish_non_exhaustive()
    }
}

impl SceneNameResolver {
    /// Creates a resolver over a build manifest.
    #[must_use]
    pub fn new(manifest: Box<dyn SceneManifest>) -> Self {
        Self { manifest }
    }

    /// See [`build_scene_name`].
    #[must_use]
    pub fn build_scene_name(&self, mode: GameMode, level: u32) -> String {
        build_scene_name(mode, level)
    }

    /// See [`parse_scene_name`].
    #[must_use]
    pub fn parse(&self, scene_name: &str) -> Option<SceneDescriptor> {
        parse_scene_name(scene_name)
    }

    /// Whether the scene was built. Manifest failures count as "not found".
    #[must_use]
    pub fn exists(&self, scene_name: &str) -> bool {
        match self.manifest.contains(scene_name) {
            Ok(found) => found,
            Err(e) => {
                warn!(scene = scene_name, "Scene manifest lookup failed: {e}");
                false
            }
        }
    }

    /// Next level of the same mode, if it was built.
    #[must_use]
    pub fn next_level(&self, desc: SceneDescriptor) -> Option<SceneDescriptor> {
        let next = SceneDescriptor::new(desc.mode, desc.level.checked_add(1)?);
        self.exists(&next.scene_name()).then_some(next)
    }

    /// Previous level of the same mode, if there is one and it was built.
    #[must_use]
    pub fn previous_level(&self, desc: SceneDescriptor) -> Option<SceneDescriptor> {
        let level = desc.level.checked_sub(1).filter(|l| *l >= 1)?;
        let prev = SceneDescriptor::new(desc.mode, level);
        self.exists(&prev.scene_name()).then_some(prev)
    }

    /// Levels `1..=highest` of a mode that were built, for the level picker.
    #[must_use]
    pub fn available_levels(&self, mode: GameMode, highest: u32) -> Vec<SceneDescriptor> {
        (1..=highest)
            .map(|level| SceneDescriptor::new(mode, level))
            .filter(|desc| self.exists(&desc.scene_name()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct BrokenManifest;

    impl SceneManifest for BrokenManifest {
        fn contains(&self, _scene_name: &str) -> ManifestResult<bool> {
            Err(ManifestError::Unavailable("engine not ready".to_string()))
        }
    }

    fn mode_strategy() -> impl Strategy<Value = GameMode> {
        prop::sample::select(GameMode::all().collect::<Vec<_>>())
    }

    #[test]
    fn test_build_scene_name() {
        assert_eq!(build_scene_name(GameMode::Collect, 3), "Ball Collector 3");
        assert_eq!(build_scene_name(GameMode::Balance, 1), "Ball Balancer 1");
        assert_eq!(build_scene_name(GameMode::Push, 12), "Ball Pusher 12");
    }

    #[test]
    fn test_parse_level_scenes() {
        assert_eq!(
            parse_scene_name("Ball Collector 3"),
            Some(SceneDescriptor::new(GameMode::Collect, 3))
        );
        assert_eq!(
            parse_scene_name("Ball Jumper 10"),
            Some(SceneDescriptor::new(GameMode::Jump, 10))
        );
    }

    #[test]
    fn test_parse_rejects_non_levels() {
        for name in [
            "Active Main Menu",
            "GAME OVER",
            "WIN",
            "PAUSE",
            "Splash Screen",
            "Ball Collector",
            "Ball Collector 0",
            "Ball Swimmer 2",
            "Ball Collector3",
            "Ball  4",
            "",
            "Ball Collector 99999999999",
        ] {
            assert_eq!(parse_scene_name(name), None, "{name:?} should not parse");
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("Active Main Menu"), SceneKind::MainMenu);
        assert_eq!(classify("WIN"), SceneKind::Reserved(ReservedScene::Win));
        assert_eq!(classify("Some Other Scene"), SceneKind::Unknown);
        assert!(matches!(classify("Ball Dodger 2"), SceneKind::Level(_)));
        assert!(classify("PAUSE").is_non_interactive());
    }

    #[test]
    fn test_reserved_scene_names_roundtrip() {
        for scene in ReservedScene::ALL {
            assert_eq!(ReservedScene::from_scene_name(scene.scene_name()), Some(scene));
        }
        assert!(ReservedScene::Pause.is_additive());
        assert!(!ReservedScene::GameOver.is_additive());
    }

    #[test]
    fn test_exists_treats_manifest_failure_as_missing() {
        let resolver = SceneNameResolver::new(Box::new(BrokenManifest));
        assert!(!resolver.exists("Ball Collector 1"));
    }

    #[test]
    fn test_static_manifest_with_levels() {
        let manifest = StaticManifest::with_levels(2);
        assert_eq!(manifest.len(), ReservedScene::ALL.len() + GameMode::COUNT * 2);
        let resolver = SceneNameResolver::new(Box::new(manifest));
        assert!(resolver.exists("Ball Balancer 2"));
        assert!(!resolver.exists("Ball Balancer 3"));
        assert!(resolver.exists("GAME OVER"));
    }

    #[test]
    fn test_next_and_previous_level() {
        let resolver = SceneNameResolver::new(Box::new(StaticManifest::with_levels(2)));
        let first = SceneDescriptor::new(GameMode::Dodge, 1);
        let second = SceneDescriptor::new(GameMode::Dodge, 2);

        assert_eq!(resolver.next_level(first), Some(second));
        assert_eq!(resolver.next_level(second), None);
        assert_eq!(resolver.previous_level(second), Some(first));
        assert_eq!(resolver.previous_level(first), None);
    }

    #[test]
    fn test_available_levels_skips_unbuilt() {
        let manifest = StaticManifest::new(["Ball Pusher 1", "Ball Pusher 3"]);
        let resolver = SceneNameResolver::new(Box::new(manifest));
        let levels: Vec<u32> = resolver
            .available_levels(GameMode::Push, 3)
            .iter()
            .map(|d| d.level)
            .collect();
        assert_eq!(levels, vec![1, 3]);
    }

    #[test]
    fn test_manifest_from_json_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("scenes.json");
        std::fs::write(&path, r#"["Ball Collector 1", "WIN"]"#).expect("write");

        let manifest = StaticManifest::from_json_file(&path).expect("load");
        assert_eq!(manifest.len(), 2);
        assert!(manifest.contains("WIN").unwrap());
    }

    #[test]
    fn test_manifest_from_bad_json_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("scenes.json");
        std::fs::write(&path, "not json").expect("write");
        assert!(matches!(
            StaticManifest::from_json_file(&path),
            Err(ManifestError::Parse(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_build_parse_roundtrip(mode in mode_strategy(), level in 1u32..100_000) {
            let name = build_scene_name(mode, level);
            prop_assert_eq!(parse_scene_name(&name), Some(SceneDescriptor::new(mode, level)));
        }

        #[test]
        fn prop_parse_never_panics(name in ".*") {
            let _ = parse_scene_name(&name);
            let _ = classify(&name);
        }
    }
}
