use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::game::{GameLayout, load_layout};
use crate::split::{DEFAULT_SPLIT_COOLDOWN, SplitGuard, SplitPolicy};
use crate::tracker::{DEFAULT_PROCESS_NAME, TrackerConfig};

/// User settings, read from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub process_name: String,
    pub poll_interval_ms: u64,
    pub search_interval_ms: u64,
    pub fault_cooldown_ms: u64,
    /// Attach the in-game clock to splits
    pub track_game_time: bool,
    pub split_policy: SplitPolicy,
    /// Only used by the cooldown policy
    pub split_cooldown_secs: u64,
    /// JSON layout replacing the built-in one
    pub layout: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            poll_interval_ms: 15,
            search_interval_ms: 250,
            fault_cooldown_ms: 1000,
            track_game_time: false,
            split_policy: SplitPolicy::default(),
            split_cooldown_secs: DEFAULT_SPLIT_COOLDOWN.as_secs(),
            layout: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `path`, falling back to defaults if it is missing or invalid
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) if e.is_not_found() => {
                warn!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Failed to load config {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Poll loop settings, with the layout file loaded if one is configured
    pub fn tracker_config(&self) -> Result<TrackerConfig> {
        let layout = match &self.layout {
            Some(path) => load_layout(path)?,
            None => GameLayout::builtin(),
        };

        Ok(TrackerConfig::builder()
            .process_name(self.process_name.as_str())
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .search_interval(Duration::from_millis(self.search_interval_ms))
            .fault_cooldown(Duration::from_millis(self.fault_cooldown_ms))
            .layout(layout)
            .track_game_time(self.track_game_time)
            .build())
    }

    pub fn split_guard(&self) -> Box<dyn SplitGuard> {
        self.split_policy
            .build(Duration::from_secs(self.split_cooldown_secs))
    }
}
