//! Debug utilities for checking a game layout against a live process
//!
//! - Resolving every chain of the layout once (`ProbeReport`)

mod probe;

pub use probe::{ChainProbe, ProbeReport, probe};
