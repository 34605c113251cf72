//! Zone command implementation.

use anyhow::Result;
use golsplit_core::ZoneNameTable;

/// Run the zone command
pub fn run(map_id: &str) -> Result<()> {
    let zones = ZoneNameTable::builtin();

    match zones.classify(map_id) {
        Some(level) => println!("{} -> {}", map_id, level),
        None => println!("{} -> (unknown level)", map_id),
    }

    Ok(())
}
