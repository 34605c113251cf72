//! Linux process access through procfs
//!
//! Covers games running under Wine/Proton: the executable name is matched
//! against `comm` and the first `cmdline` argument, and the image base is the
//! lowest mapping backed by the executable file.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use tracing::debug;

use super::process::{GameProcess, ProcessInfo, matches_process_name, open_first_live};
use super::reader::ReadMemory;
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct ProcessHandle {
    mem: File,
    proc_dir: PathBuf,
    info: ProcessInfo,
}

impl ProcessHandle {
    /// Open the first live process named `name` for reading.
    ///
    /// Zombies keep their `/proc` entry, so a stale match is skipped in
    /// favour of a later running one.
    pub fn find_and_open(name: &str) -> Result<Self> {
        let candidates = fs::read_dir("/proc")?.flatten().filter_map(|entry| {
            let pid = entry.file_name().to_str()?.parse::<u32>().ok()?;
            let exe = process_name_matching(pid, name)?;
            Some((pid, exe))
        });
        open_first_live(name, candidates, Self::open)
    }

    fn open(pid: u32, exe: String) -> Result<Self> {
        let proc_dir = PathBuf::from(format!("/proc/{}", pid));
        let mem = File::open(proc_dir.join("mem")).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => Error::AccessDenied(format!("pid {}: {}", pid, e)),
            ErrorKind::NotFound => Error::ProcessNotFound(exe.clone()),
            _ => Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)),
        })?;

        let maps = fs::read_to_string(proc_dir.join("maps"))?;
        let base_address = find_image_base(&maps, &exe).ok_or_else(|| {
            Error::ProcessOpenFailed(format!("no mapping for {} in pid {}", exe, pid))
        })?;

        debug!("Opened {} (pid {}, base {:#x})", exe, pid, base_address);

        Ok(Self {
            mem,
            proc_dir,
            info: ProcessInfo {
                pid,
                name: exe,
                base_address,
            },
        })
    }
}

fn process_name_matching(pid: u32, name: &str) -> Option<String> {
    if let Ok(comm) = fs::read_to_string(format!("/proc/{}/comm", pid)) {
        let comm = comm.trim();
        if matches_process_name(comm, name) {
            return Some(comm.to_string());
        }
    }

    let cmdline = fs::read(format!("/proc/{}/cmdline", pid)).ok()?;
    let argv0 = cmdline.split(|&b| b == 0).next()?;
    let argv0 = String::from_utf8_lossy(argv0);
    if matches_process_name(&argv0, name) {
        let file = argv0.rsplit(|c: char| c == '/' || c == '\\').next()?;
        return Some(file.to_string());
    }
    None
}

/// Start address of the lowest mapping whose backing file is `exe`
fn find_image_base(maps: &str, exe: &str) -> Option<u64> {
    maps.lines()
        .filter_map(|line| {
            // "start-end perms offset dev inode path", path may contain spaces
            let mut rest = line;
            let mut range = "";
            for i in 0..5 {
                rest = rest.trim_start();
                let end = rest.find(char::is_whitespace)?;
                if i == 0 {
                    range = &rest[..end];
                }
                rest = &rest[end..];
            }
            if !matches_process_name(rest.trim(), exe) {
                return None;
            }
            let start = range.split('-').next()?;
            u64::from_str_radix(start, 16).ok()
        })
        .min()
}

impl ReadMemory for ProcessHandle {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        let mut filled = 0usize;
        while filled < size {
            match self.mem.read_at(&mut buffer[filled..], address + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if filled == 0 => {
                    return Err(Error::MemoryReadFailed {
                        address,
                        message: e.to_string(),
                    });
                }
                Err(_) => break,
            }
        }

        if filled != size {
            return Err(Error::PartialRead {
                address,
                expected: size,
                actual: filled,
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
        // Field 3 of stat is the state; the command name before it may
        // contain spaces, so split after the closing parenthesis.
        let Ok(stat) = fs::read_to_string(self.proc_dir.join("stat")) else {
            return true;
        };
        let state = stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next());
        matches!(state, None | Some("Z") | Some("X"))
    }
}
