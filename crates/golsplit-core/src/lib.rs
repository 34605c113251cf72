//! # golsplit-core
//!
//! Core library of the autosplitter for Lara Croft and the Guardian of Light.
//!
//! This crate provides:
//! - Read-only access to the memory of the game process (Windows, and Linux
//!   for games running under Wine/Proton)
//! - Pointer chains and the memory layout of the supported game build
//! - The edge-triggered detector turning polled snapshots into events
//! - The personal-best ledger
//! - The attach/poll loop and the event channel it feeds
//!
//! ## Feature Flags
//!
//! - `debug-tools`: Enables the layout probe used by the CLI to check every
//!   pointer chain against a running game.

pub mod config;
#[cfg(feature = "debug-tools")]
pub mod debug;
pub mod error;
pub mod events;
pub mod game;
pub mod memory;
pub mod pointer;
pub mod shutdown;
pub mod split;
pub mod tracker;

pub use config::Config;
pub use error::{Error, Result};
pub use events::{Delivery, EventSink, EventStream, GameEvent, LoadCause};
pub use game::{
    DetectorOptions, FIRST_LEVEL_MAP, GameLayout, LEVELS, PersonalBestLedger, PersonalBestRecord,
    PlayMode, Snapshot, StateChangeDetector, ZoneNameTable, detect, load_layout, save_layout,
};
pub use memory::{
    GameProcess, PointerWidth, ProcessHandle, ProcessInfo, ProcessProvider, ReadMemory,
    SystemProcessProvider,
};
pub use pointer::{PointerChain, Value, ValueType};
pub use shutdown::ShutdownSignal;
pub use split::{CompletedLevelsGuard, CooldownGuard, SplitGuard, SplitPolicy};
pub use tracker::{LoopState, Tracker, TrackerConfig, TrackerService};

// Debug utilities (requires debug-tools feature)
#[cfg(feature = "debug-tools")]
pub use debug::{ChainProbe, ProbeReport, probe};
