use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use tracing::{debug, trace};

use super::layout::{GameLayout, PersonalBestLayout};
use crate::events::GameEvent;
use crate::memory::{PointerWidth, ReadMemory};
use crate::pointer::{PointerChain, Value, ValueType};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
pub enum PlayMode {
    Solo,
    Coop,
}

impl PlayMode {
    pub const ALL: [PlayMode; 2] = [PlayMode::Solo, PlayMode::Coop];
}

/// One level/mode slot of the in-game best-times table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonalBestRecord {
    pub label: String,
    pub level: String,
    pub mode: PlayMode,
    #[serde(skip)]
    pub chain: PointerChain,
    /// Last value read, in milliseconds (0 = not set)
    pub value: u32,
}

/// Watches the best-times table and reports improvements
#[derive(Debug, Clone)]
pub struct PersonalBestLedger {
    records: Vec<PersonalBestRecord>,
    pointer_width: PointerWidth,
}

impl PersonalBestLedger {
    pub fn from_layout(layout: &GameLayout) -> Self {
        Self {
            records: build_records(&layout.personal_bests),
            pointer_width: layout.pointer_width,
        }
    }

    /// Read every record once and return the improvements.
    ///
    /// A record that cannot be read keeps its stored value. A change is
    /// only an improvement when the new time is non-zero and strictly lower
    /// than the stored one.
    pub fn update<R: ReadMemory + ?Sized>(
        &mut self,
        reader: &R,
        image_base: u64,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();

        for record in &mut self.records {
            let current = match record
                .chain
                .read_value(reader, image_base, self.pointer_width)
            {
                Some(Value::U32(v)) => v,
                Some(other) => {
                    trace!("Unexpected value {} for {}", other, record.label);
                    continue;
                }
                None => continue,
            };

            if current == record.value {
                continue;
            }

            let previous = record.value;
            record.value = current;

            if current != 0 && current < previous {
                debug!("{} improved: {} ms -> {} ms", record.label, previous, current);
                events.push(GameEvent::PersonalBest {
                    label: record.label.clone(),
                    time: Duration::from_millis(u64::from(current)),
                    previous: Duration::from_millis(u64::from(previous)),
                });
            }
        }

        events
    }

    pub fn records(&self) -> &[PersonalBestRecord] {
        &self.records
    }
}

impl Default for PersonalBestLedger {
    fn default() -> Self {
        Self::from_layout(&GameLayout::builtin())
    }
}

// level order, then solo before coop
fn build_records(layout: &PersonalBestLayout) -> Vec<PersonalBestRecord> {
    let mut records = Vec::with_capacity(layout.levels.len() * PlayMode::ALL.len());
    for (index, level) in layout.levels.iter().enumerate() {
        let block = layout.table_start + layout.record_stride * index as u64;
        for mode in PlayMode::ALL {
            let address = match mode {
                PlayMode::Solo => block,
                PlayMode::Coop => block + layout.coop_offset,
            };
            records.push(PersonalBestRecord {
                label: format!("{} - {}", mode, level),
                level: level.clone(),
                mode,
                chain: PointerChain::absolute(address, ValueType::U32),
                value: 0,
            });
        }
    }
    records
}
