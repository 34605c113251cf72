mod detector;
#[cfg(test)]
pub(crate) mod fixture;
mod layout;
mod personal_best;
mod snapshot;
mod zone;

pub use detector::*;
pub use layout::*;
pub use personal_best::*;
pub use snapshot::*;
pub use zone::*;
