//! Memory layout of the supported game build.
//!
//! Everything here is data: addresses for one build of `lcgol.exe`. Other
//! builds can be described by a JSON file with the same shape (see
//! [`load_layout`]).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::memory::PointerWidth;
use crate::pointer::{PointerChain, ValueType};

/// Maximum length of the current map id
pub const MAP_NAME_LEN: usize = 128;

/// Map id of the level that starts a run
pub const FIRST_LEVEL_MAP: &str = "alc_1_it_beginning";

/// `D3DPRESENT_DONOTWAIT`, the present interval with vsync enabled
pub const D3DPRESENT_DONOTWAIT: i32 = 0x0000_0001;

/// Refresh rates the timing rules accept
pub const VALID_REFRESH_RATES: [i32; 2] = [59, 60];

/// Values of the loading flags
pub mod loading {
    /// Single-player flag while a load screen is up
    pub const SP_LOADING: u8 = 1;

    /// Multiplayer flag: (previous, current) for a new game
    pub const MP_NEW_GAME: (u8, u8) = (7, 2);
    /// Multiplayer flag: (previous, current) for a level change
    pub const MP_LEVEL_CHANGE: (u8, u8) = (1, 2);
    /// Second multiplayer flag: (previous, current) for a death reload
    pub const MP2_DEATH: (u8, u8) = (0, 1);
    /// Multiplayer flag: (previous, current) when a load completes
    pub const MP_LOAD_DONE: (u8, u8) = (3, 1);
}

/// Personal-best table layout
pub mod pb_table {
    pub const TABLE_START: u64 = 0xD8_21A0;
    /// Size of one level's record block
    pub const STRUCT_SIZE: u64 = 0xF0;
    /// Co-op time sits after the solo time
    pub const COOP_OFFSET: u64 = 8;
}

/// Level names in game order, used for personal-best labels
pub const LEVELS: [&str; 14] = [
    "Temple Grounds",
    "Spider Tomb",
    "The Summoning",
    "Toxic Swamp",
    "Flooded Passage",
    "Temple of Light",
    "The Jaws of Death",
    "Forgotten Gate",
    "Twisting Bridge",
    "Belly of the Beast",
    "Xolotl's Stronghold",
    "The Mirror's Wake",
    "Fiery Depths",
    "Stronghold Passage",
];

/// Chains for every field sampled each tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub current_map: PointerChain,
    pub on_end_screen: PointerChain,
    pub player_count: PointerChain,
    pub sp_loading: PointerChain,
    pub mp_loading: PointerChain,
    pub mp_loading2: PointerChain,
    pub game_time: PointerChain,
    /// `D3DPRESENT_PARAMETERS::FullScreen_RefreshRateInHz`
    pub refresh_rate: PointerChain,
    /// `D3DPRESENT_PARAMETERS::PresentationInterval`
    pub present_interval: PointerChain,
}

impl FieldLayout {
    /// Every chain with its field name, in snapshot order
    pub fn named(&self) -> [(&'static str, &PointerChain); 9] {
        [
            ("current_map", &self.current_map),
            ("on_end_screen", &self.on_end_screen),
            ("player_count", &self.player_count),
            ("sp_loading", &self.sp_loading),
            ("mp_loading", &self.mp_loading),
            ("mp_loading2", &self.mp_loading2),
            ("game_time", &self.game_time),
            ("refresh_rate", &self.refresh_rate),
            ("present_interval", &self.present_interval),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalBestLayout {
    pub table_start: u64,
    pub record_stride: u64,
    pub coop_offset: u64,
    pub levels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLayout {
    /// Free-form build identifier
    pub version: String,
    #[serde(default)]
    pub pointer_width: PointerWidth,
    pub fields: FieldLayout,
    pub personal_bests: PersonalBestLayout,
}

impl GameLayout {
    /// Layout of the Steam release of Lara Croft and the Guardian of Light
    pub fn builtin() -> Self {
        Self {
            version: "lcgol-steam".to_string(),
            pointer_width: PointerWidth::Bits32,
            fields: FieldLayout {
                current_map: PointerChain::absolute(0xCA_8E1C, ValueType::Str(MAP_NAME_LEN)),
                on_end_screen: PointerChain::absolute(0x7C_0DD0, ValueType::Bool),
                player_count: PointerChain::new(0xD7_F8EC, &[], 0x10, ValueType::U8),
                sp_loading: PointerChain::absolute(0xA8_4CAC, ValueType::U8),
                mp_loading: PointerChain::absolute(0xCE_B5F8, ValueType::U8),
                mp_loading2: PointerChain::absolute(0xCA_8D0B, ValueType::U8),
                game_time: PointerChain::absolute(0xCA_8EE4, ValueType::U32),
                // cdc::PCDeviceManager -> D3DPRESENT_PARAMETERS
                refresh_rate: PointerChain::new(0x88_4554, &[], 0x228, ValueType::I32),
                present_interval: PointerChain::new(0x88_4554, &[], 0x22C, ValueType::I32),
            },
            personal_bests: PersonalBestLayout {
                table_start: pb_table::TABLE_START,
                record_stride: pb_table::STRUCT_SIZE,
                coop_offset: pb_table::COOP_OFFSET,
                levels: LEVELS.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

impl Default for GameLayout {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Load a layout from a JSON file
pub fn load_layout<P: AsRef<Path>>(path: P) -> Result<GameLayout> {
    let content = fs::read_to_string(path.as_ref())?;
    let layout: GameLayout = serde_json::from_str(&content)?;
    debug!(
        "Loaded layout {} from {}",
        layout.version,
        path.as_ref().display()
    );
    Ok(layout)
}

/// Write a layout as pretty-printed JSON
pub fn save_layout<P: AsRef<Path>>(path: P, layout: &GameLayout) -> Result<()> {
    let content = serde_json::to_string_pretty(layout)?;
    fs::write(path, content)?;
    Ok(())
}
