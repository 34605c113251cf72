//! Windows process access through Win32 APIs

use std::ffi::c_void;
use std::mem::size_of;

use tracing::debug;
use windows::Win32::Foundation::{CloseHandle, FALSE, HANDLE, HMODULE};
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::ProcessStatus::EnumProcessModules;
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};

use super::process::{GameProcess, ProcessInfo, matches_process_name, open_first_live};
use super::reader::ReadMemory;
use crate::error::{Error, Result};

/// Exit code reported by `GetExitCodeProcess` while the process runs
const STILL_ACTIVE: u32 = 259;

/// Open handle to the game process
///
/// Closed on drop.
#[derive(Debug)]
pub struct ProcessHandle {
    handle: HANDLE,
    info: ProcessInfo,
}

// SAFETY: process HANDLEs are process-wide and valid from any thread; the
// poll loop is the only owner.
unsafe impl Send for ProcessHandle {}

impl ProcessHandle {
    /// Open the first live process named `name` for reading
    pub fn find_and_open(name: &str) -> Result<Self> {
        open_first_live(name, find_process_ids(name)?, Self::open)
    }

    fn open(pid: u32, name: String) -> Result<Self> {
        // SAFETY: OpenProcess has no memory-safety preconditions; failure is
        // reported through the returned Result.
        let handle = unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, FALSE, pid) }
            .map_err(|e| Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)))?;

        let base_address = match find_base_module(handle) {
            Ok(module) => module.0 as u64,
            Err(e) => {
                // SAFETY: handle was returned by OpenProcess above.
                let _ = unsafe { CloseHandle(handle) };
                return Err(e);
            }
        };

        debug!("Opened {} (pid {}, base {:#x})", name, pid, base_address);

        Ok(Self {
            handle,
            info: ProcessInfo {
                pid,
                name,
                base_address,
            },
        })
    }
}

/// Every process in the snapshot whose executable matches `name`
fn find_process_ids(name: &str) -> Result<Vec<(u32, String)>> {
    // SAFETY: the snapshot handle is closed before returning.
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
        .map_err(|e| Error::ProcessOpenFailed(format!("process snapshot failed: {}", e)))?;

    let mut entry = PROCESSENTRY32W {
        dwSize: size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };

    let mut found = Vec::new();
    // SAFETY: entry.dwSize is initialised as the API requires.
    let mut ok = unsafe { Process32FirstW(snapshot, &mut entry) }.is_ok();
    while ok {
        let len = entry
            .szExeFile
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(entry.szExeFile.len());
        let exe = String::from_utf16_lossy(&entry.szExeFile[..len]);
        if matches_process_name(&exe, name) {
            found.push((entry.th32ProcessID, exe));
        }
        // SAFETY: same entry buffer as above.
        ok = unsafe { Process32NextW(snapshot, &mut entry) }.is_ok();
    }

    // SAFETY: snapshot was returned by CreateToolhelp32Snapshot.
    let _ = unsafe { CloseHandle(snapshot) };

    Ok(found)
}

fn find_base_module(process: HANDLE) -> Result<HMODULE> {
    let mut modules = [HMODULE::default(); 1];
    let mut cb_needed = 0u32;
    // SAFETY: the buffer holds exactly one HMODULE and cb reflects that; the
    // first module returned is the main executable.
    unsafe {
        EnumProcessModules(
            process,
            modules.as_mut_ptr(),
            size_of::<[HMODULE; 1]>() as u32,
            &mut cb_needed,
        )
    }
    .map_err(|e| Error::AccessDenied(format!("EnumProcessModules failed: {}", e)))?;

    if cb_needed == 0 {
        return Err(Error::ProcessOpenFailed("process has no modules".to_string()));
    }
    Ok(modules[0])
}

impl ReadMemory for ProcessHandle {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; size];
        let mut bytes_read = 0usize;
        // SAFETY: buffer is a live allocation of `size` bytes; the API writes
        // at most `size` bytes into it.
        unsafe {
            ReadProcessMemory(
                self.handle,
                address as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                size,
                Some(&mut bytes_read),
            )
        }
        .map_err(|e| {
            if bytes_read > 0 && bytes_read < size {
                Error::PartialRead {
                    address,
                    expected: size,
                    actual: bytes_read,
                }
            } else {
                Error::MemoryReadFailed {
                    address,
                    message: e.to_string(),
                }
            }
        })?;

        if bytes_read != size {
            return Err(Error::PartialRead {
                address,
                expected: size,
                actual: bytes_read,
            });
        }

        Ok(buffer)
    }
}

impl GameProcess for ProcessHandle {
    fn info(&self) -> ProcessInfo {
        self.info.clone()
    }

    fn has_exited(&self) -> bool {
        let mut code = 0u32;
        // SAFETY: handle is open for PROCESS_QUERY_INFORMATION.
        match unsafe { GetExitCodeProcess(self.handle, &mut code) } {
            Ok(()) => code != STILL_ACTIVE,
            Err(_) => true,
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: handle was returned by OpenProcess and is closed once.
        let _ = unsafe { CloseHandle(self.handle) };
    }
}
