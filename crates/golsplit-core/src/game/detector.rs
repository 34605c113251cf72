use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::layout::{D3DPRESENT_DONOTWAIT, FIRST_LEVEL_MAP, VALID_REFRESH_RATES, loading};
use super::snapshot::Snapshot;
use super::zone::ZoneNameTable;
use crate::events::{GameEvent, LoadCause};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorOptions {
    /// Attach the in-game clock to level-finished events
    pub track_game_time: bool,
}

/// Derive the events implied by one tick's transition.
///
/// Rules fall into three independent groups and each group contributes at
/// most one event:
/// - progress: level finished, else load started, else load finished
/// - run boundary: the clock on the first level crossing zero
/// - settings: vsync off or an unsupported refresh rate
pub fn detect(
    previous: &Snapshot,
    current: &Snapshot,
    zones: &ZoneNameTable,
    options: &DetectorOptions,
) -> Vec<GameEvent> {
    [
        progress(previous, current, zones, options),
        run_boundary(previous, current),
        settings(current),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn progress(
    previous: &Snapshot,
    current: &Snapshot,
    zones: &ZoneNameTable,
    options: &DetectorOptions,
) -> Option<GameEvent> {
    if !previous.on_end_screen && current.on_end_screen {
        return Some(GameEvent::LevelFinished {
            map: current.current_map.clone(),
            level: zones.classify(&current.current_map).map(str::to_string),
            game_time: options
                .track_game_time
                .then(|| Duration::from_millis(u64::from(current.game_time))),
        });
    }

    if let Some(cause) = load_started(previous, current) {
        return Some(GameEvent::LoadStarted { cause });
    }

    load_finished(previous, current).then_some(GameEvent::LoadFinished)
}

fn load_started(previous: &Snapshot, current: &Snapshot) -> Option<LoadCause> {
    match current.player_count {
        1 => (current.sp_loading == loading::SP_LOADING
            && previous.sp_loading != loading::SP_LOADING
            && !current.on_end_screen)
            .then_some(LoadCause::SinglePlayer),
        n if n > 1 => {
            let mp = (previous.mp_loading, current.mp_loading);
            let mp2 = (previous.mp_loading2, current.mp_loading2);
            if mp == loading::MP_NEW_GAME {
                Some(LoadCause::NewGame)
            } else if mp2 == loading::MP2_DEATH {
                Some(LoadCause::Death)
            } else if mp == loading::MP_LEVEL_CHANGE {
                Some(LoadCause::LevelChange)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn load_finished(previous: &Snapshot, current: &Snapshot) -> bool {
    match current.player_count {
        1 => {
            current.sp_loading != loading::SP_LOADING
                && previous.sp_loading == loading::SP_LOADING
                && !current.on_end_screen
        }
        n if n > 1 => (previous.mp_loading, current.mp_loading) == loading::MP_LOAD_DONE,
        _ => false,
    }
}

fn run_boundary(previous: &Snapshot, current: &Snapshot) -> Option<GameEvent> {
    if current.current_map != FIRST_LEVEL_MAP {
        return None;
    }
    match (previous.game_time, current.game_time) {
        (p, 0) if p > 0 => Some(GameEvent::FirstLevelLoading),
        (0, c) if c > 0 => Some(GameEvent::FirstLevelStarted),
        _ => None,
    }
}

fn settings(current: &Snapshot) -> Option<GameEvent> {
    // zeroed memory during startup and right before exit reads as refresh 0
    if current.game_time == 0 || current.refresh_rate == 0 {
        return None;
    }
    let invalid = current.present_interval != D3DPRESENT_DONOTWAIT
        || !VALID_REFRESH_RATES.contains(&current.refresh_rate);

    invalid.then_some(GameEvent::InvalidSettings {
        refresh_rate: current.refresh_rate,
        present_interval: current.present_interval,
    })
}

/// Edge detector over consecutive snapshots.
///
/// Keeps the previous snapshot and skips the first tick after construction
/// or [`reset`](Self::reset), when there is nothing to compare against.
pub struct StateChangeDetector {
    zones: ZoneNameTable,
    options: DetectorOptions,
    previous: Option<Snapshot>,
}

impl StateChangeDetector {
    pub fn new(zones: ZoneNameTable, options: DetectorOptions) -> Self {
        Self {
            zones,
            options,
            previous: None,
        }
    }

    /// Feed the snapshot of a new tick and get the events it produced
    pub fn observe(&mut self, current: Snapshot) -> Vec<GameEvent> {
        let events = match &self.previous {
            Some(previous) => detect(previous, &current, &self.zones, &self.options),
            None => {
                debug!("First tick on map {:?}, skipping edges", current.current_map);
                Vec::new()
            }
        };
        self.previous = Some(current);
        events
    }

    /// Forget the previous snapshot (e.g. after attaching to a new process)
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    pub fn zones(&self) -> &ZoneNameTable {
        &self.zones
    }
}

impl Default for StateChangeDetector {
    fn default() -> Self {
        Self::new(ZoneNameTable::builtin(), DetectorOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_player() -> Snapshot {
        Snapshot {
            current_map: "alc_3_summoning".to_string(),
            player_count: 1,
            game_time: 90_000,
            refresh_rate: 60,
            present_interval: D3DPRESENT_DONOTWAIT,
            ..Default::default()
        }
    }

    fn coop() -> Snapshot {
        Snapshot {
            player_count: 2,
            ..single_player()
        }
    }

    /// Run a sequence through a fresh detector, one event list per tick
    fn run(ticks: impl IntoIterator<Item = Snapshot>) -> Vec<Vec<GameEvent>> {
        let mut detector = StateChangeDetector::default();
        ticks.into_iter().map(|s| detector.observe(s)).collect()
    }

    fn sp_loading(value: u8) -> Snapshot {
        Snapshot {
            sp_loading: value,
            ..single_player()
        }
    }

    fn end_screen(value: bool) -> Snapshot {
        Snapshot {
            on_end_screen: value,
            ..single_player()
        }
    }

    fn mp(mp_loading: u8, mp_loading2: u8) -> Snapshot {
        Snapshot {
            mp_loading,
            mp_loading2,
            ..coop()
        }
    }

    fn detect_default(previous: &Snapshot, current: &Snapshot) -> Vec<GameEvent> {
        detect(
            previous,
            current,
            &ZoneNameTable::builtin(),
            &DetectorOptions::default(),
        )
    }

    #[test]
    fn test_single_player_load_sequence() {
        let ticks = run([sp_loading(0), sp_loading(1), sp_loading(1), sp_loading(0)]);

        assert!(ticks[0].is_empty());
        assert_eq!(
            ticks[1],
            vec![GameEvent::LoadStarted {
                cause: LoadCause::SinglePlayer
            }]
        );
        assert!(ticks[2].is_empty());
        assert_eq!(ticks[3], vec![GameEvent::LoadFinished]);
    }

    #[test]
    fn test_level_finished_fires_once() {
        let ticks = run([
            end_screen(false),
            end_screen(true),
            end_screen(true),
            end_screen(true),
            end_screen(false),
        ]);

        let finished: Vec<_> = ticks
            .iter()
            .flatten()
            .filter(|e| matches!(e, GameEvent::LevelFinished { .. }))
            .collect();
        assert_eq!(finished.len(), 1);
        assert!(matches!(ticks[1][0], GameEvent::LevelFinished { .. }));
    }

    #[test]
    fn test_level_finished_payload() {
        let previous = end_screen(false);
        let current = end_screen(true);

        let events = detect(
            &previous,
            &current,
            &ZoneNameTable::builtin(),
            &DetectorOptions {
                track_game_time: true,
            },
        );
        assert_eq!(
            events,
            vec![GameEvent::LevelFinished {
                map: "alc_3_summoning".to_string(),
                level: Some("The Summoning".to_string()),
                game_time: Some(Duration::from_secs(90)),
            }]
        );

        let events = detect_default(&previous, &current);
        assert!(matches!(
            &events[0],
            GameEvent::LevelFinished { game_time: None, .. }
        ));
    }

    #[test]
    fn test_level_finished_takes_priority_over_loading() {
        let previous = single_player();
        let current = Snapshot {
            on_end_screen: true,
            sp_loading: 1,
            ..single_player()
        };
        let events = detect_default(&previous, &current);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], GameEvent::LevelFinished { .. }));
    }

    #[test]
    fn test_single_player_loading_ignored_on_end_screen() {
        let previous = Snapshot {
            on_end_screen: true,
            ..sp_loading(0)
        };
        let current = Snapshot {
            on_end_screen: true,
            ..sp_loading(1)
        };
        assert!(detect_default(&previous, &current).is_empty());
        assert!(detect_default(&current, &previous).is_empty());
    }

    #[test]
    fn test_multiplayer_load_started() {
        let cases = [
            (mp(7, 0), mp(2, 0), LoadCause::NewGame),
            (mp(0, 0), mp(0, 1), LoadCause::Death),
            (mp(1, 0), mp(2, 0), LoadCause::LevelChange),
        ];
        for (previous, current, cause) in cases {
            assert_eq!(
                detect_default(&previous, &current),
                vec![GameEvent::LoadStarted { cause }]
            );
        }
    }

    #[test]
    fn test_multiplayer_load_finished() {
        assert_eq!(
            detect_default(&mp(3, 0), &mp(1, 0)),
            vec![GameEvent::LoadFinished]
        );
        // other transitions into 1 are not a finished load
        assert!(detect_default(&mp(2, 0), &mp(1, 0)).is_empty());
    }

    #[test]
    fn test_multiplayer_flags_ignored_in_single_player() {
        let previous = Snapshot {
            mp_loading: 7,
            ..single_player()
        };
        let current = Snapshot {
            mp_loading: 2,
            ..single_player()
        };
        assert!(detect_default(&previous, &current).is_empty());
    }

    #[test]
    fn test_single_player_flag_ignored_in_coop() {
        let previous = Snapshot {
            sp_loading: 0,
            ..coop()
        };
        let current = Snapshot {
            sp_loading: 1,
            ..coop()
        };
        assert!(detect_default(&previous, &current).is_empty());
    }

    #[test]
    fn test_first_level_boundaries() {
        let at = |game_time| Snapshot {
            current_map: FIRST_LEVEL_MAP.to_string(),
            game_time,
            ..single_player()
        };

        assert_eq!(
            detect_default(&at(0), &at(16)),
            vec![GameEvent::FirstLevelStarted]
        );
        assert_eq!(
            detect_default(&at(5000), &at(0)),
            vec![GameEvent::FirstLevelLoading]
        );
        assert!(detect_default(&at(16), &at(32)).is_empty());
    }

    #[test]
    fn test_clock_reset_elsewhere_is_not_a_run_boundary() {
        let previous = Snapshot {
            game_time: 5000,
            ..single_player()
        };
        let current = Snapshot {
            game_time: 0,
            ..single_player()
        };
        assert!(detect_default(&previous, &current).is_empty());
    }

    #[test]
    fn test_valid_settings_are_quiet() {
        let ticks = run([single_player(), single_player(), single_player()]);
        assert!(ticks.iter().all(Vec::is_empty));

        let at_59 = Snapshot {
            refresh_rate: 59,
            ..single_player()
        };
        assert!(detect_default(&at_59, &at_59).is_empty());
    }

    #[test]
    fn test_invalid_refresh_rate_fires_every_tick() {
        let at_75 = Snapshot {
            refresh_rate: 75,
            ..single_player()
        };
        let ticks = run([at_75.clone(), at_75.clone(), at_75.clone()]);

        let expected = vec![GameEvent::InvalidSettings {
            refresh_rate: 75,
            present_interval: D3DPRESENT_DONOTWAIT,
        }];
        // the first tick only establishes the baseline
        assert!(ticks[0].is_empty());
        assert_eq!(ticks[1], expected);
        assert_eq!(ticks[2], expected);
    }

    #[test]
    fn test_vsync_off_is_invalid() {
        let no_vsync = Snapshot {
            present_interval: 0,
            ..single_player()
        };
        assert_eq!(
            detect_default(&single_player(), &no_vsync),
            vec![GameEvent::InvalidSettings {
                refresh_rate: 60,
                present_interval: 0,
            }]
        );
    }

    #[test]
    fn test_invalid_settings_gated() {
        let stopped_clock = Snapshot {
            refresh_rate: 75,
            game_time: 0,
            ..single_player()
        };
        assert!(detect_default(&stopped_clock, &stopped_clock).is_empty());

        let zeroed = Snapshot {
            refresh_rate: 0,
            present_interval: 0,
            ..single_player()
        };
        assert!(detect_default(&zeroed, &zeroed).is_empty());
    }

    #[test]
    fn test_groups_are_independent() {
        let previous = Snapshot {
            refresh_rate: 75,
            ..sp_loading(0)
        };
        let current = Snapshot {
            refresh_rate: 75,
            ..sp_loading(1)
        };
        let events = detect_default(&previous, &current);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], GameEvent::LoadStarted { .. }));
        assert!(matches!(events[1], GameEvent::InvalidSettings { .. }));
    }

    #[test]
    fn test_reset_skips_next_tick() {
        let mut detector = StateChangeDetector::default();
        assert!(detector.observe(sp_loading(0)).is_empty());
        assert!(detector.previous().is_some());

        detector.reset();
        assert!(detector.previous().is_none());
        // would be a load start without the reset
        assert!(detector.observe(sp_loading(1)).is_empty());
        assert_eq!(detector.observe(sp_loading(0)), vec![GameEvent::LoadFinished]);
    }
}
