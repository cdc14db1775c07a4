//! Game configuration persisted as TOML
//!
//! Looked up in the platform config dir (e.g. ~/.config/tilefall/settings.toml)
//! unless a path is given. Every field has a default, so partial files work.

use crate::board::BoardConfig;
use crate::error::{GameError, Result};
use crate::score::ScoringConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Complete configuration for one session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub board: BoardConfig,
    pub scoring: ScoringConfig,
    pub ui: UiConfig,
    pub animation: AnimationConfig,
}

/// Turn budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Moves granted per game
    pub moves: u32,
}

/// Timings for the burn, drop and refill phases, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub burn_duration: f64,
    pub drop_duration: f64,
    /// Extra delay per target row when new tiles fall in
    pub refill_delay: f64,
    /// Longest a transition may take before input is forced open again
    pub render_timeout: f64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { moves: 20 }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            burn_duration: 0.18,
            drop_duration: 0.28,
            refill_delay: 0.05,
            render_timeout: 5.0,
        }
    }
}

impl AnimationConfig {
    pub fn burn(&self) -> Duration {
        secs(self.burn_duration)
    }

    pub fn drop(&self) -> Duration {
        secs(self.drop_duration)
    }

    /// Stagger for a tile landing on `row`
    pub fn refill_delay_for(&self, row: i32) -> Duration {
        secs(self.refill_delay * row.max(0) as f64)
    }

    pub fn render_timeout(&self) -> Duration {
        secs(self.render_timeout)
    }
}

/// Negative or NaN durations count as zero
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl GameConfig {
    /// Reject values no session can run with
    pub fn validate(&self) -> Result<()> {
        self.board.validate()?;
        if self.ui.moves == 0 {
            return Err(GameError::invalid("moves must be greater than 0"));
        }
        if !(self.animation.render_timeout > 0.0) {
            return Err(GameError::invalid("render timeout must be positive"));
        }
        Ok(())
    }

    fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "tilefall", "tilefall").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Default settings file location
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.toml"))
    }

    /// Load from the default location, falling back to defaults
    ///
    /// A file that exists but does not parse is reported and ignored.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load and validate a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write to the default location, creating the directory if needed
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::settings_path()
            .ok_or_else(|| GameError::Config("could not determine config directory".to_string()))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}
