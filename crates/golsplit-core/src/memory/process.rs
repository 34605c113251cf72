use serde::Serialize;
use tracing::debug;

use super::reader::ReadMemory;
use crate::error::{Error, Result};

/// Identity of an attached process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Load address of the main executable image
    pub base_address: u64,
}

/// A foreign process the poll loop can sample
pub trait GameProcess: ReadMemory {
    fn info(&self) -> ProcessInfo;

    fn base_address(&self) -> u64 {
        self.info().base_address
    }

    /// Whether the process has terminated since it was opened
    fn has_exited(&self) -> bool;
}

/// Locates and opens the target process
pub trait ProcessProvider {
    type Process: GameProcess;

    /// Find a live process whose executable matches `name`.
    ///
    /// Returns `Ok(None)` when no such process is running.
    fn find(&mut self, name: &str) -> Result<Option<Self::Process>>;
}

/// Provider backed by the operating system's process list
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessProvider;

impl ProcessProvider for SystemProcessProvider {
    type Process = ProcessHandle;

    fn find(&mut self, name: &str) -> Result<Option<Self::Process>> {
        match ProcessHandle::find_and_open(name) {
            Ok(process) if process.has_exited() => {
                debug!("Found {} but it has already exited", name);
                Ok(None)
            }
            Ok(process) => Ok(Some(process)),
            Err(Error::ProcessNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Open matching processes in order and return the first still running.
///
/// An open failure is returned only when no live candidate follows it.
#[cfg_attr(
    not(any(target_os = "windows", target_os = "linux")),
    allow(dead_code)
)]
pub(crate) fn open_first_live<P, F>(
    name: &str,
    candidates: impl IntoIterator<Item = (u32, String)>,
    mut open: F,
) -> Result<P>
where
    P: GameProcess,
    F: FnMut(u32, String) -> Result<P>,
{
    let mut failure = None;
    for (pid, exe) in candidates {
        match open(pid, exe) {
            Ok(process) if process.has_exited() => {
                debug!("Skipping {} (pid {}), it has already exited", name, pid);
            }
            Ok(process) => return Ok(process),
            Err(e) => {
                debug!("Could not open {} (pid {}): {}", name, pid, e);
                failure = Some(e);
            }
        }
    }
    Err(failure.unwrap_or_else(|| Error::ProcessNotFound(name.to_string())))
}

/// Compare an executable name against the configured target name.
///
/// Case-insensitive; a trailing `.exe` on either side is ignored and any
/// directory prefix (`/` or `\`) on the executable is stripped.
pub fn matches_process_name(exe: &str, target: &str) -> bool {
    fn stem(s: &str) -> &str {
        let file = s.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(s);
        let len = file.len();
        match file.get(len.saturating_sub(4)..) {
            Some(ext) if len > 4 && ext.eq_ignore_ascii_case(".exe") => &file[..len - 4],
            _ => file,
        }
    }

    let exe = stem(exe.trim_end_matches('\0').trim());
    !exe.is_empty() && exe.eq_ignore_ascii_case(stem(target))
}

#[cfg(target_os = "windows")]
pub use super::win32::ProcessHandle;

#[cfg(target_os = "linux")]
pub use super::linux::ProcessHandle;

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub use unsupported::ProcessHandle;

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
mod unsupported {
    use super::{GameProcess, ProcessInfo};
    use crate::error::{Error, Result};
    use crate::memory::ReadMemory;

    /// Placeholder on platforms without a process memory backend
    #[derive(Debug)]
    pub struct ProcessHandle {
        info: ProcessInfo,
    }

    impl ProcessHandle {
        pub fn find_and_open(name: &str) -> Result<Self> {
            Err(Error::Unsupported(format!(
                "cannot attach to {} on this platform",
                name
            )))
        }
    }

    impl ReadMemory for ProcessHandle {
        fn read_bytes(&self, _address: u64, _size: usize) -> Result<Vec<u8>> {
            Err(Error::Unsupported("process memory access".to_string()))
        }
    }

    impl GameProcess for ProcessHandle {
        fn info(&self) -> ProcessInfo {
            self.info.clone()
        }

        fn has_exited(&self) -> bool {
            true
        }
    }
}
