//! Probe command implementation.

use anyhow::{Result, bail};
use golsplit_core::{
    ChainProbe, Config, ProcessProvider, SystemProcessProvider, ZoneNameTable, probe,
};
use owo_colors::OwoColorize;

/// Run the probe command
pub fn run(config: &Config, json: bool) -> Result<()> {
    let tracker = config.tracker_config()?;

    let Some(process) = SystemProcessProvider.find(&tracker.process_name)? else {
        bail!("{} is not running", tracker.process_name);
    };

    let report = probe(&process, &tracker.layout, &ZoneNameTable::builtin());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Process: {} (pid {}, base 0x{:X})",
        report.process.name, report.process.pid, report.process.base_address
    );
    println!("Layout:  {}", report.layout_version);
    println!(
        "Map:     {} ({})",
        report.snapshot.current_map,
        report.zone.as_deref().unwrap_or("unknown level")
    );
    println!();

    println!("Fields:");
    for field in &report.fields {
        print_probe(field);
    }
    println!();

    println!("Personal bests:");
    for record in &report.personal_bests {
        print_probe(record);
    }
    println!();

    match report.failed_count() {
        0 => println!("{}", "All chains resolved".green()),
        n => println!("{}", format!("{} chain(s) failed", n).red()),
    }

    Ok(())
}

fn print_probe(probe: &ChainProbe) {
    let address = probe
        .address
        .map(|a| format!("0x{:08X}", a))
        .unwrap_or_else(|| "-".repeat(10));

    match (&probe.value, &probe.error) {
        (Some(value), _) => println!("  {:<32} {}  {}", probe.name, address, value),
        (None, Some(error)) => println!("  {:<32} {}  {}", probe.name, address, error.red()),
        (None, None) => println!("  {:<32} {}", probe.name, address),
    }
}
