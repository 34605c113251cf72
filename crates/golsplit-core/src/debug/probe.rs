use serde::Serialize;

use crate::game::{GameLayout, PersonalBestLedger, Snapshot, ZoneNameTable};
use crate::memory::{GameProcess, ProcessInfo};
use crate::pointer::{PointerChain, Value};

/// Outcome of resolving one chain
#[derive(Debug, Clone, Serialize)]
pub struct ChainProbe {
    pub name: String,
    pub address: Option<u64>,
    pub value: Option<Value>,
    pub error: Option<String>,
}

impl ChainProbe {
    fn run<P: GameProcess + ?Sized>(
        name: &str,
        chain: &PointerChain,
        process: &P,
        layout: &GameLayout,
    ) -> Self {
        let image_base = process.base_address();
        let mut probe = Self {
            name: name.to_string(),
            address: None,
            value: None,
            error: None,
        };

        match chain.resolve(process, image_base, layout.pointer_width) {
            Ok(address) => {
                probe.address = Some(address);
                match chain.value_type.read(process, address) {
                    Ok(value) => probe.value = Some(value),
                    Err(e) => probe.error = Some(e.to_string()),
                }
            }
            Err(e) => probe.error = Some(e.to_string()),
        }
        probe
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One-shot view of everything the tracker would read
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub process: ProcessInfo,
    pub layout_version: String,
    pub snapshot: Snapshot,
    /// Level name of the current map, if known
    pub zone: Option<String>,
    pub fields: Vec<ChainProbe>,
    pub personal_bests: Vec<ChainProbe>,
}

impl ProbeReport {
    pub fn failed_count(&self) -> usize {
        self.fields
            .iter()
            .chain(&self.personal_bests)
            .filter(|p| !p.is_ok())
            .count()
    }
}

/// Resolve and read every chain of `layout` once
pub fn probe<P: GameProcess + ?Sized>(
    process: &P,
    layout: &GameLayout,
    zones: &ZoneNameTable,
) -> ProbeReport {
    let image_base = process.base_address();
    let snapshot = Snapshot::sample(process, image_base, layout, &Snapshot::default());

    let fields = layout
        .fields
        .named()
        .into_iter()
        .map(|(name, chain)| ChainProbe::run(name, chain, process, layout))
        .collect();

    let personal_bests = PersonalBestLedger::from_layout(layout)
        .records()
        .iter()
        .map(|record| ChainProbe::run(&record.label, &record.chain, process, layout))
        .collect();

    ProbeReport {
        process: process.info(),
        layout_version: layout.version.clone(),
        zone: zones.classify(&snapshot.current_map).map(str::to_string),
        snapshot,
        fields,
        personal_bests,
    }
}
