//! Game mode catalog.
//!
//! The five minigames and everything static about them lives in one table,
//! [`MODE_TABLE`]. Adding a mode means adding a variant and a table row;
//! nothing that consumes the catalog branches on individual variants.

use serde::{Deserialize, Serialize};

/// One of the five minigame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameMode {
    /// Roll over every pickup in the level.
    Collect,
    /// Keep the ball on a narrow track to the portal.
    Balance,
    /// Avoid hazards on the way to the portal.
    Dodge,
    /// Jump between platforms to the portal.
    Jump,
    /// Push objects into place.
    Push,
}

/// How a level of a mode is won. Gameplay code owns the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WinCondition {
    /// Every pickup in the level has been collected.
    CollectAll,
    /// The ball reached the exit portal.
    ReachPortal,
}

/// Static description of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInfo {
    /// The mode this row describes.
    pub mode: GameMode,
    /// Base name, e.g. "Collect".
    pub name: &'static str,
    /// Suffix appended to the name in scene names, e.g. "or".
    pub suffix: &'static str,
    /// How a level is won.
    pub win_condition: WinCondition,
}

/// Catalog rows, in declaration order.
pub static MODE_TABLE: [ModeInfo; GameMode::COUNT] = [
    ModeInfo {
        mode: GameMode::Collect,
        name: "Collect",
        suffix: "or",
        win_condition: WinCondition::CollectAll,
    },
    ModeInfo {
        mode: GameMode::Balance,
        name: "Balance",
        suffix: "r",
        win_condition: WinCondition::ReachPortal,
    },
    ModeInfo {
        mode: GameMode::Dodge,
        name: "Dodge",
        suffix: "r",
        win_condition: WinCondition::ReachPortal,
    },
    ModeInfo {
        mode: GameMode::Jump,
        name: "Jump",
        suffix: "er",
        win_condition: WinCondition::ReachPortal,
    },
    ModeInfo {
        mode: GameMode::Push,
        name: "Push",
        suffix: "er",
        win_condition: WinCondition::ReachPortal,
    },
];

/// Menu unlock order. Each mode becomes visible once its predecessor is past level 1.
pub const UNLOCK_CHAIN: [GameMode; GameMode::COUNT] = [
    GameMode::Collect,
    GameMode::Balance,
    GameMode::Push,
    GameMode::Jump,
    GameMode::Dodge,
];

impl GameMode {
    /// Number of modes.
    pub const COUNT: usize = 5;

    /// All modes in declaration order.
    #[must_use]
    pub fn all() -> impl Iterator<Item = GameMode> {
        MODE_TABLE.iter().map(|info| info.mode)
    }

    /// Stable ordinal, usable as an array index.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Catalog row for this mode.
    #[must_use]
    pub fn info(self) -> &'static ModeInfo {
        &MODE_TABLE[self.index()]
    }

    /// Base name, e.g. "Collect".
    #[must_use]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Scene-name suffix, e.g. "or".
    #[must_use]
    pub fn suffix(self) -> &'static str {
        self.info().suffix
    }

    /// Name plus suffix, e.g. "Collector".
    #[must_use]
    pub fn display_name(self) -> String {
        format!("{}{}", self.name(), self.suffix())
    }

    /// How a level of this mode is won.
    #[must_use]
    pub fn win_condition(self) -> WinCondition {
        self.info().win_condition
    }

    /// Mode that must be past level 1 before this one shows in menus.
    ///
    /// `None` for the head of the chain.
    #[must_use]
    pub fn unlock_predecessor(self) -> Option<GameMode> {
        let pos = UNLOCK_CHAIN.iter().position(|m| *m == self)?;
        pos.checked_sub(1).map(|prev| UNLOCK_CHAIN[prev])
    }

    /// Case-insensitive lookup by base name or display name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<GameMode> {
        let name = name.trim();
        MODE_TABLE
            .iter()
            .find(|info| {
                info.name.eq_ignore_ascii_case(name)
                    || info.mode.display_name().eq_ignore_ascii_case(name)
            })
            .map(|info| info.mode)
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows_match_variants() {
        for (i, info) in MODE_TABLE.iter().enumerate() {
            assert_eq!(info.mode.index(), i);
        }
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(GameMode::Collect.suffix(), "or");
        assert_eq!(GameMode::Balance.suffix(), "r");
        assert_eq!(GameMode::Jump.suffix(), "er");
        assert_eq!(GameMode::Collect.display_name(), "Collector");
        assert_eq!(GameMode::Dodge.display_name(), "Dodger");
    }

    #[test]
    fn test_all_modes_order() {
        let modes: Vec<_> = GameMode::all().collect();
        assert_eq!(
            modes,
            vec![
                GameMode::Collect,
                GameMode::Balance,
                GameMode::Dodge,
                GameMode::Jump,
                GameMode::Push
            ]
        );
    }

    #[test]
    fn test_unlock_chain() {
        assert_eq!(GameMode::Collect.unlock_predecessor(), None);
        assert_eq!(GameMode::Balance.unlock_predecessor(), Some(GameMode::Collect));
        assert_eq!(GameMode::Push.unlock_predecessor(), Some(GameMode::Balance));
        assert_eq!(GameMode::Jump.unlock_predecessor(), Some(GameMode::Push));
        assert_eq!(GameMode::Dodge.unlock_predecessor(), Some(GameMode::Jump));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(GameMode::from_name("collect"), Some(GameMode::Collect));
        assert_eq!(GameMode::from_name("Pusher"), Some(GameMode::Push));
        assert_eq!(GameMode::from_name(" JUMP "), Some(GameMode::Jump));
        assert_eq!(GameMode::from_name("swim"), None);
    }

    #[test]
    fn test_win_conditions() {
        assert_eq!(GameMode::Collect.win_condition(), WinCondition::CollectAll);
        assert_eq!(GameMode::Dodge.win_condition(), WinCondition::ReachPortal);
    }
}
