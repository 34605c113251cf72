//! De-duplication of level-finished splits on the consumer side.
//!
//! The end screen can flicker, and a player can re-enter a finished level.
//! A [`SplitGuard`] decides whether a level-finished event should really
//! advance the timer.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

/// Minimum time between two accepted splits in cooldown mode
pub const DEFAULT_SPLIT_COOLDOWN: Duration = Duration::from_secs(10);

pub trait SplitGuard: Send {
    /// Whether a split on `map_id` at `now` should be taken
    fn accept(&mut self, map_id: &str, now: Instant) -> bool;

    /// Forget accepted splits, called when the run resets
    fn reset(&mut self);
}

/// Rejects splits that come too soon after the last accepted one
#[derive(Debug, Clone)]
pub struct CooldownGuard {
    cooldown: Duration,
    last_split: Option<Instant>,
}

impl CooldownGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_split: None,
        }
    }
}

impl Default for CooldownGuard {
    fn default() -> Self {
        Self::new(DEFAULT_SPLIT_COOLDOWN)
    }
}

impl SplitGuard for CooldownGuard {
    fn accept(&mut self, map_id: &str, now: Instant) -> bool {
        if let Some(last) = self.last_split {
            let since = now.saturating_duration_since(last);
            if since < self.cooldown {
                debug!("Split on {} ignored, {:?} since last split", map_id, since);
                return false;
            }
        }
        self.last_split = Some(now);
        true
    }

    fn reset(&mut self) {
        self.last_split = None;
    }
}

/// Accepts each map at most once per run
#[derive(Debug, Clone, Default)]
pub struct CompletedLevelsGuard {
    completed: HashSet<String>,
}

impl SplitGuard for CompletedLevelsGuard {
    fn accept(&mut self, map_id: &str, _now: Instant) -> bool {
        let fresh = self.completed.insert(map_id.to_string());
        if !fresh {
            debug!("Split on {} ignored, level already completed", map_id);
        }
        fresh
    }

    fn reset(&mut self) {
        self.completed.clear();
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SplitPolicy {
    #[default]
    Cooldown,
    CompletedLevels,
}

impl SplitPolicy {
    pub fn build(self, cooldown: Duration) -> Box<dyn SplitGuard> {
        match self {
            Self::Cooldown => Box::new(CooldownGuard::new(cooldown)),
            Self::CompletedLevels => Box::new(CompletedLevelsGuard::default()),
        }
    }
}
