//! Handler registry: store package id → reconstruction strategy + arguments.
//!
//! The registry is supplied as JSON, one entry per game:
//!
//! ```json
//! [
//!   { "name": "Starfield",
//!     "package": "BethesdaSoftworks.ProjectGold_3275kfvn8vcwc",
//!     "handler": "starfield",
//!     "handler_args": { "missing_parts": "skip" } }
//! ]
//! ```
//!
//! Handler names are matched against the closed [`Strategy`] set; an unknown
//! name only disables the game that uses it.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Unsupported handler \"{0}\"")]
    UnsupportedHandler(String),
    #[error("No handler registered for store package \"{0}\"")]
    UnknownPackage(String),
    #[error("Invalid handler registry: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Strategy ─────────────────────────────────────────────────────────────────

/// The on-disk conventions games use for their containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// One container holds one save file.
    OneContainerOneFile,
    /// One container holds every save file.
    OneContainerManyFiles,
    /// Each container is a folder of files.
    OneContainerManyFilesFolder,
    Control,
    Starfield,
    LiesOfP,
    Palworld,
    LikeADragon,
    Cricket24,
    Forza,
    ArcadeParadise,
    StateOfDecay2,
    RailwayEmpire2,
    CoralIsland,
}

impl Strategy {
    pub const ALL: [Strategy; 14] = [
        Strategy::OneContainerOneFile,
        Strategy::OneContainerManyFiles,
        Strategy::OneContainerManyFilesFolder,
        Strategy::Control,
        Strategy::Starfield,
        Strategy::LiesOfP,
        Strategy::Palworld,
        Strategy::LikeADragon,
        Strategy::Cricket24,
        Strategy::Forza,
        Strategy::ArcadeParadise,
        Strategy::StateOfDecay2,
        Strategy::RailwayEmpire2,
        Strategy::CoralIsland,
    ];

    /// Registry name of this strategy.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::OneContainerOneFile         => "1c1f",
            Strategy::OneContainerManyFiles       => "1cnf",
            Strategy::OneContainerManyFilesFolder => "1cnf-folder",
            Strategy::Control                     => "control",
            Strategy::Starfield                   => "starfield",
            Strategy::LiesOfP                     => "lies-of-p",
            Strategy::Palworld                    => "palworld",
            Strategy::LikeADragon                 => "like-a-dragon",
            Strategy::Cricket24                   => "cricket-24",
            Strategy::Forza                       => "forza",
            Strategy::ArcadeParadise              => "arcade-paradise",
            Strategy::StateOfDecay2               => "state-of-decay-2",
            Strategy::RailwayEmpire2              => "railway-empire-2",
            Strategy::CoralIsland                 => "coral-island",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| HandlerError::UnsupportedHandler(s.to_owned()))
    }
}

// ── HandlerArgs ──────────────────────────────────────────────────────────────

/// Free-form strategy arguments.  JSON `null` values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, Option<String>>")]
pub struct HandlerArgs(BTreeMap<String, String>);

impl From<BTreeMap<String, Option<String>>> for HandlerArgs {
    fn from(raw: BTreeMap<String, Option<String>>) -> Self {
        HandlerArgs(raw.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))).collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HandlerArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        HandlerArgs(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl HandlerArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Appended to output names by the `1c1f` and `1cnf` strategies.
    pub fn suffix(&self) -> &str {
        self.get("suffix").unwrap_or("")
    }

    pub fn icon_format(&self) -> Option<&str> {
        self.get("icon_format").filter(|f| !f.is_empty())
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameEntry {
    pub name:         String,
    /// Store package family name, also the directory under the packages root.
    pub package:      String,
    pub handler:      String,
    #[serde(default)]
    pub handler_args: HandlerArgs,
}

impl GameEntry {
    pub fn strategy(&self) -> Result<Strategy, HandlerError> {
        self.handler.parse()
    }
}

/// A strategy resolved for one store package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    pub strategy: Strategy,
    pub args:     HandlerArgs,
}

#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    games: Vec<GameEntry>,
}

impl HandlerRegistry {
    pub fn new(games: Vec<GameEntry>) -> Self {
        Self { games }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, HandlerError> {
        Ok(Self::new(serde_json::from_slice(bytes)?))
    }

    pub fn from_path(path: &Path) -> Result<Self, HandlerError> {
        Self::from_json(&std::fs::read(path)?)
    }

    pub fn games(&self) -> &[GameEntry] {
        &self.games
    }

    pub fn by_package(&self, package: &str) -> Option<&GameEntry> {
        self.games.iter().find(|g| g.package == package)
    }

    pub fn handler_for(&self, package: &str) -> Result<Handler, HandlerError> {
        let entry = self
            .by_package(package)
            .ok_or_else(|| HandlerError::UnknownPackage(package.to_owned()))?;
        Ok(Handler { strategy: entry.strategy()?, args: entry.handler_args.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"[
        { "name": "High on Life", "package": "Squanch.HighOnLife_x", "handler": "1c1f",
          "handler_args": { "suffix": ".sav" } },
        { "name": "Like a Dragon", "package": "SEGA.Yazawa_y", "handler": "like-a-dragon",
          "handler_args": { "icon_format": null } },
        { "name": "Future Game", "package": "Future.Game_z", "handler": "hologram" }
    ]"#;

    #[test]
    fn every_strategy_name_round_trips() {
        for s in Strategy::ALL {
            assert_eq!(s.name().parse::<Strategy>().unwrap(), s);
        }
        assert!(matches!(
            "1C1F".parse::<Strategy>(),
            Err(HandlerError::UnsupportedHandler(name)) if name == "1C1F"
        ));
    }

    #[test]
    fn registry_lookup() {
        let reg = HandlerRegistry::from_json(REGISTRY.as_bytes()).unwrap();
        assert_eq!(reg.games().len(), 3);

        let h = reg.handler_for("Squanch.HighOnLife_x").unwrap();
        assert_eq!(h.strategy, Strategy::OneContainerOneFile);
        assert_eq!(h.args.suffix(), ".sav");

        let h = reg.handler_for("SEGA.Yazawa_y").unwrap();
        assert_eq!(h.args.icon_format(), None);
        assert_eq!(h.args.suffix(), "");
    }

    #[test]
    fn unknown_handler_only_affects_its_package() {
        let reg = HandlerRegistry::from_json(REGISTRY.as_bytes()).unwrap();
        assert!(matches!(
            reg.handler_for("Future.Game_z"),
            Err(HandlerError::UnsupportedHandler(name)) if name == "hologram"
        ));
        assert!(matches!(
            reg.handler_for("Nobody.Game_q"),
            Err(HandlerError::UnknownPackage(_))
        ));
        assert!(reg.handler_for("Squanch.HighOnLife_x").is_ok());
    }
}
