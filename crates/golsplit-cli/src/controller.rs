//! Minimal run timer driven by tracker events.

use std::time::{Duration, Instant};

use golsplit_core::{GameEvent, LEVELS, SplitGuard};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TimerPhase {
    NotRunning,
    Running,
    Ended,
}

/// Real time plus game time with loads removed
#[derive(Debug)]
pub struct RunTimer {
    phase: TimerPhase,
    started: Option<Instant>,
    paused_since: Option<Instant>,
    paused_total: Duration,
    splits: Vec<SplitTime>,
    segment_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitTime {
    pub real_time: Duration,
    pub game_time: Duration,
}

impl RunTimer {
    pub fn new(segment_count: usize) -> Self {
        Self {
            phase: TimerPhase::NotRunning,
            started: None,
            paused_since: None,
            paused_total: Duration::ZERO,
            splits: Vec::new(),
            segment_count,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn splits(&self) -> &[SplitTime] {
        &self.splits
    }

    /// Start a run, already paused if the game is loading at `now`
    pub fn start(&mut self, now: Instant, loading: bool) -> bool {
        if self.phase != TimerPhase::NotRunning {
            return false;
        }
        self.phase = TimerPhase::Running;
        self.started = Some(now);
        self.paused_total = Duration::ZERO;
        self.paused_since = loading.then_some(now);
        true
    }

    pub fn split(&mut self, now: Instant) -> Option<SplitTime> {
        if self.phase != TimerPhase::Running {
            return None;
        }
        let time = SplitTime {
            real_time: self.real_time(now),
            game_time: self.game_time(now),
        };
        self.splits.push(time);
        if self.splits.len() >= self.segment_count {
            self.phase = TimerPhase::Ended;
        }
        Some(time)
    }

    /// Returns `false` unless a run is in progress
    pub fn pause_game_time(&mut self, now: Instant) -> bool {
        if self.phase != TimerPhase::Running {
            return false;
        }
        if self.paused_since.is_none() {
            self.paused_since = Some(now);
        }
        true
    }

    pub fn resume_game_time(&mut self, now: Instant) -> bool {
        if self.phase != TimerPhase::Running {
            return false;
        }
        if let Some(since) = self.paused_since.take() {
            self.paused_total += now.saturating_duration_since(since);
        }
        true
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.segment_count);
    }

    pub fn real_time(&self, now: Instant) -> Duration {
        self.started
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default()
    }

    pub fn game_time(&self, now: Instant) -> Duration {
        let current_pause = self
            .paused_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        self.real_time(now)
            .saturating_sub(self.paused_total + current_pause)
    }
}

/// What the controller did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Started,
    Split {
        number: usize,
        level: Option<String>,
        time: SplitTime,
        /// In-game clock carried by the event, if tracked
        in_game: Option<Duration>,
    },
    SplitIgnored,
    Paused,
    Resumed,
    Reset,
    /// Settings are invalid while a run is in progress
    ForcedReset {
        refresh_rate: i32,
        present_interval: i32,
    },
    PersonalBest(String),
    Nothing,
}

pub struct RunController {
    timer: RunTimer,
    guard: Box<dyn SplitGuard>,
    /// Between a load start and its finish, whatever the timer phase
    loading: bool,
}

impl RunController {
    pub fn new(guard: Box<dyn SplitGuard>) -> Self {
        Self {
            timer: RunTimer::new(LEVELS.len()),
            guard,
            loading: false,
        }
    }

    pub fn timer(&self) -> &RunTimer {
        &self.timer
    }

    pub fn handle(&mut self, event: &GameEvent, now: Instant) -> Reaction {
        match event {
            GameEvent::FirstLevelStarted => {
                if self.timer.start(now, self.loading) {
                    Reaction::Started
                } else {
                    Reaction::Nothing
                }
            }
            GameEvent::FirstLevelLoading => self.reset(),
            GameEvent::LoadStarted { .. } => {
                self.loading = true;
                if self.timer.pause_game_time(now) {
                    Reaction::Paused
                } else {
                    Reaction::Nothing
                }
            }
            GameEvent::LoadFinished => {
                self.loading = false;
                if self.timer.resume_game_time(now) {
                    Reaction::Resumed
                } else {
                    Reaction::Nothing
                }
            }
            GameEvent::LevelFinished {
                map,
                level,
                game_time,
            } => {
                if self.timer.phase() != TimerPhase::Running {
                    return Reaction::Nothing;
                }
                if !self.guard.accept(map, now) {
                    return Reaction::SplitIgnored;
                }
                match self.timer.split(now) {
                    Some(time) => Reaction::Split {
                        number: self.timer.splits().len(),
                        level: level.clone(),
                        time,
                        in_game: *game_time,
                    },
                    None => Reaction::Nothing,
                }
            }
            GameEvent::InvalidSettings {
                refresh_rate,
                present_interval,
            } => {
                if self.timer.phase() != TimerPhase::Running {
                    return Reaction::Nothing;
                }
                self.reset();
                Reaction::ForcedReset {
                    refresh_rate: *refresh_rate,
                    present_interval: *present_interval,
                }
            }
            GameEvent::PersonalBest {
                label,
                time,
                previous,
            } => Reaction::PersonalBest(personal_best_line(label, *time, *previous)),
        }
    }

    fn reset(&mut self) -> Reaction {
        if self.timer.phase() == TimerPhase::NotRunning {
            return Reaction::Nothing;
        }
        self.timer.reset();
        self.guard.reset();
        Reaction::Reset
    }
}

/// `m:ss.fff`
pub fn format_time(time: Duration) -> String {
    let millis = time.as_millis();
    format!(
        "{}:{:02}.{:03}",
        millis / 60_000,
        (millis / 1000) % 60,
        millis % 1000
    )
}

pub fn personal_best_line(label: &str, time: Duration, previous: Duration) -> String {
    format!(
        "{}: {} - {} improvement",
        label,
        format_time(time),
        format_time(previous.saturating_sub(time))
    )
}
