//! CLI command implementations.

pub mod layout;
pub mod probe;
pub mod tracking;
pub mod zone;
