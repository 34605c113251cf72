use serde::Serialize;
use tracing::trace;

use super::layout::GameLayout;
use crate::memory::ReadMemory;
use crate::pointer::{PointerChain, Value};

/// Every field sampled in one poll tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub current_map: String,
    pub on_end_screen: bool,
    pub player_count: u8,
    pub sp_loading: u8,
    pub mp_loading: u8,
    pub mp_loading2: u8,
    pub game_time: u32,
    pub refresh_rate: i32,
    pub present_interval: i32,
}

impl Snapshot {
    /// Sample all fields described by `layout`.
    ///
    /// A field that cannot be read keeps its value from `previous`, so an
    /// unreadable field never looks like a transition.
    pub fn sample<R: ReadMemory + ?Sized>(
        reader: &R,
        image_base: u64,
        layout: &GameLayout,
        previous: &Snapshot,
    ) -> Self {
        let sampler = FieldSampler {
            reader,
            image_base,
            layout,
        };
        let f = &layout.fields;

        Self {
            current_map: sampler
                .read(&f.current_map, |v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| previous.current_map.clone()),
            on_end_screen: sampler
                .read(&f.on_end_screen, Value::as_bool)
                .unwrap_or(previous.on_end_screen),
            player_count: sampler
                .integer(&f.player_count)
                .unwrap_or(previous.player_count),
            sp_loading: sampler
                .integer(&f.sp_loading)
                .unwrap_or(previous.sp_loading),
            mp_loading: sampler
                .integer(&f.mp_loading)
                .unwrap_or(previous.mp_loading),
            mp_loading2: sampler
                .integer(&f.mp_loading2)
                .unwrap_or(previous.mp_loading2),
            game_time: sampler.integer(&f.game_time).unwrap_or(previous.game_time),
            refresh_rate: sampler
                .integer(&f.refresh_rate)
                .unwrap_or(previous.refresh_rate),
            present_interval: sampler
                .integer(&f.present_interval)
                .unwrap_or(previous.present_interval),
        }
    }
}

struct FieldSampler<'a, R: ?Sized> {
    reader: &'a R,
    image_base: u64,
    layout: &'a GameLayout,
}

impl<R: ReadMemory + ?Sized> FieldSampler<'_, R> {
    fn read<T>(&self, chain: &PointerChain, convert: impl FnOnce(&Value) -> Option<T>) -> Option<T> {
        let value = chain.read_value(self.reader, self.image_base, self.layout.pointer_width)?;
        let converted = convert(&value);
        if converted.is_none() {
            trace!("Field at base {:#x} has unexpected value {}", chain.base, value);
        }
        converted
    }

    fn integer<T: TryFrom<i64>>(&self, chain: &PointerChain) -> Option<T> {
        self.read(chain, |v| v.as_i64().and_then(|i| T::try_from(i).ok()))
    }
}
