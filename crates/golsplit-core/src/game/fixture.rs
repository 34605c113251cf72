//! Simulated game memory laid out like the built-in layout.

use super::layout::{MAP_NAME_LEN, pb_table};
use crate::memory::{MockMemoryBuilder, MockMemoryReader};

pub(crate) const IMAGE: u64 = 0x0040_0000;
pub(crate) const DEVICE: u64 = 0x0200_0000;
pub(crate) const PLAYERS: u64 = 0x0300_0000;

const CURRENT_MAP: u64 = IMAGE + 0xCA_8E1C;
const END_SCREEN: u64 = IMAGE + 0x7C_0DD0;
const PLAYER_MANAGER: u64 = IMAGE + 0xD7_F8EC;
const SP_LOADING: u64 = IMAGE + 0xA8_4CAC;
const MP_LOADING: u64 = IMAGE + 0xCE_B5F8;
const MP_LOADING2: u64 = IMAGE + 0xCA_8D0B;
const GAME_TIME: u64 = IMAGE + 0xCA_8EE4;
const DEVICE_MANAGER: u64 = IMAGE + 0x88_4554;

/// Single-player session on the first level, clock at zero, 60 Hz with vsync
pub(crate) struct GameMemory {
    pub reader: MockMemoryReader,
}

impl GameMemory {
    pub fn new() -> Self {
        let mut builder = MockMemoryBuilder::new()
            .base_address(IMAGE)
            .pid(4242)
            .write_string(CURRENT_MAP, "alc_1_it_beginning", MAP_NAME_LEN)
            .write_u8(END_SCREEN, 0)
            .write_u32(PLAYER_MANAGER, PLAYERS as u32)
            .write_u8(PLAYERS + 0x10, 1)
            .write_u8(SP_LOADING, 0)
            .write_u8(MP_LOADING, 0)
            .write_u8(MP_LOADING2, 0)
            .write_u32(GAME_TIME, 0)
            .write_u32(DEVICE_MANAGER, DEVICE as u32)
            .write_i32(DEVICE + 0x228, 60)
            .write_i32(DEVICE + 0x22C, 1);

        for level in 0..14 {
            builder = builder
                .write_u32(pb_address(level, false), 0)
                .write_u32(pb_address(level, true), 0);
        }

        Self {
            reader: builder.build(),
        }
    }

    pub fn set_map(&self, map: &str) {
        self.reader.set_string(CURRENT_MAP, map, MAP_NAME_LEN);
    }

    pub fn set_end_screen(&self, value: bool) {
        self.reader.set_u8(END_SCREEN, value as u8);
    }

    pub fn set_players(&self, count: u8) {
        self.reader.set_u8(PLAYERS + 0x10, count);
    }

    pub fn set_sp_loading(&self, value: u8) {
        self.reader.set_u8(SP_LOADING, value);
    }

    pub fn set_mp_loading(&self, value: u8) {
        self.reader.set_u8(MP_LOADING, value);
    }

    pub fn set_game_time(&self, value: u32) {
        self.reader.set_u32(GAME_TIME, value);
    }

    pub fn set_refresh_rate(&self, value: i32) {
        self.reader.set_i32(DEVICE + 0x228, value);
    }

    pub fn set_present_interval(&self, value: i32) {
        self.reader.set_i32(DEVICE + 0x22C, value);
    }

    pub fn null_device_manager(&self) {
        self.reader.set_u32(DEVICE_MANAGER, 0);
    }

    pub fn unmap_end_screen(&self) {
        self.reader.unmap(END_SCREEN, 1);
    }

    pub fn set_personal_best(&self, level: usize, coop: bool, millis: u32) {
        self.reader.set_u32(pb_address(level, coop), millis);
    }

    pub fn unmap_personal_best(&self, level: usize, coop: bool) {
        self.reader.unmap(pb_address(level, coop), 4);
    }
}

fn pb_address(level: usize, coop: bool) -> u64 {
    let solo = IMAGE + pb_table::TABLE_START + pb_table::STRUCT_SIZE * level as u64;
    if coop {
        solo + pb_table::COOP_OFFSET
    } else {
        solo
    }
}
