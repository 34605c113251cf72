#[cfg(target_os = "linux")]
mod linux;
mod process;
mod reader;
#[cfg(target_os = "windows")]
mod win32;

// Mock memory reader for testing (always available for unit and integration tests)
#[doc(hidden)]
pub mod mock;

pub use process::*;
pub use reader::{PAGE_SIZE, PointerWidth, ReadMemory};

#[doc(hidden)]
pub use mock::{MockMemoryBuilder, MockMemoryReader, MockProcessProvider};
