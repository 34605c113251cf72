//! In-memory stand-in for a foreign process.
//!
//! Memory is sparse: only bytes written through the builder (or the setters)
//! are mapped. Reads that start on an unmapped byte fail, reads that run off
//! the end of mapped memory fail with [`Error::PartialRead`]. Clones share
//! the same memory, so a test can keep a handle and mutate values while the
//! poll loop owns another one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use super::process::{GameProcess, ProcessInfo, ProcessProvider};
use super::reader::ReadMemory;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct MockState {
    bytes: RwLock<HashMap<u64, u8>>,
    reads: Mutex<Vec<u64>>,
    read_count: AtomicUsize,
    exited: AtomicBool,
}

#[derive(Clone, Debug, Default)]
pub struct MockMemoryReader {
    state: Arc<MockState>,
    base_address: u64,
    pid: u32,
}

impl MockMemoryReader {
    pub fn set_bytes(&self, address: u64, data: &[u8]) {
        let mut bytes = self.state.bytes.write().unwrap();
        for (i, b) in data.iter().enumerate() {
            bytes.insert(address + i as u64, *b);
        }
    }

    pub fn set_u8(&self, address: u64, value: u8) {
        self.set_bytes(address, &[value]);
    }

    pub fn set_u32(&self, address: u64, value: u32) {
        self.set_bytes(address, &value.to_le_bytes());
    }

    pub fn set_i32(&self, address: u64, value: i32) {
        self.set_bytes(address, &value.to_le_bytes());
    }

    /// Write `value` zero-padded to `capacity` bytes
    pub fn set_string(&self, address: u64, value: &str, capacity: usize) {
        let mut data = vec![0u8; capacity.max(value.len())];
        data[..value.len()].copy_from_slice(value.as_bytes());
        self.set_bytes(address, &data);
    }

    /// Unmap `size` bytes starting at `address`
    pub fn unmap(&self, address: u64, size: usize) {
        let mut bytes = self.state.bytes.write().unwrap();
        for i in 0..size as u64 {
            bytes.remove(&(address + i));
        }
    }

    /// Number of `read_bytes` calls served so far
    pub fn read_count(&self) -> usize {
        self.state.read_count.load(Ordering::SeqCst)
    }

    /// Start addresses of every `read_bytes` call, in order
    pub fn read_log(&self) -> Vec<u64> {
        self.state.reads.lock().unwrap().clone()
    }

    pub fn clear_read_log(&self) {
        self.state.reads.lock().unwrap().clear();
        self.state.read_count.store(0, Ordering::SeqCst);
    }

    /// Mark the simulated process as exited
    pub fn exit(&self) {
        self.state.exited.store(true, Ordering::SeqCst);
    }
}

impl ReadMemory for MockMemoryReader {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.state.read_count.fetch_add(1, Ordering::SeqCst);
        self.state.reads.lock().unwrap().push(address);

        if self.state.exited.load(Ordering::SeqCst) {
            return Err(Error::ProcessNotFound(format!("pid {}", self.pid)));
        }

        let bytes = self.state.bytes.read().unwrap();
        let mut out = Vec::with_capacity(size);
        for i in 0..size as u64 {
            match address.checked_add(i).and_then(|a| bytes.get(&a)) {
                Some(b) => out.push(*b),
                None if out.is_empty() => {
                    return Err(Error::MemoryReadFailed {
                        address,
                        message: "address not mapped".to_string(),
                    });
                }
                None => {
                    return Err(Error::PartialRead {
                        address,
                        expected: size,
                        actual: out.len(),
                    });
                }
            }
        }
        Ok(out)
    }
}

impl GameProcess for MockMemoryReader {
    fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: "mock".to_string(),
            base_address: self.base_address,
        }
    }

    fn has_exited(&self) -> bool {
        self.state.exited.load(Ordering::SeqCst)
    }
}

/// Builder for [`MockMemoryReader`]
#[derive(Default)]
pub struct MockMemoryBuilder {
    reader: MockMemoryReader,
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_address(mut self, base: u64) -> Self {
        self.reader.base_address = base;
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.reader.pid = pid;
        self
    }

    pub fn write_bytes(self, address: u64, data: &[u8]) -> Self {
        self.reader.set_bytes(address, data);
        self
    }

    pub fn write_u8(self, address: u64, value: u8) -> Self {
        self.write_bytes(address, &[value])
    }

    pub fn write_u32(self, address: u64, value: u32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_i32(self, address: u64, value: i32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_u64(self, address: u64, value: u64) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_f32(self, address: u64, value: f32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_string(self, address: u64, value: &str, capacity: usize) -> Self {
        self.reader.set_string(address, value, capacity);
        self
    }

    pub fn build(self) -> MockMemoryReader {
        self.reader
    }
}

enum SearchStep {
    Found(MockMemoryReader),
    Missing,
    Fail(String),
}

/// Process provider that hands out scripted search results in order.
///
/// Once the script runs out every search finds nothing.
#[derive(Clone, Default)]
pub struct MockProcessProvider {
    script: Arc<Mutex<Vec<SearchStep>>>,
    searches: Arc<AtomicUsize>,
}

impl MockProcessProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next search
    pub fn push(&self, process: Option<MockMemoryReader>) {
        let step = match process {
            Some(p) => SearchStep::Found(p),
            None => SearchStep::Missing,
        };
        self.script.lock().unwrap().push(step);
    }

    /// Queue a search that fails with an OS-level error
    pub fn push_failure(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push(SearchStep::Fail(message.to_string()));
    }

    /// Number of searches performed so far
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

impl ProcessProvider for MockProcessProvider {
    type Process = MockMemoryReader;

    fn find(&mut self, _name: &str) -> Result<Option<Self::Process>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Ok(None);
        }
        match script.remove(0) {
            SearchStep::Found(p) => Ok(Some(p)),
            SearchStep::Missing => Ok(None),
            SearchStep::Fail(message) => Err(Error::ProcessOpenFailed(message)),
        }
    }
}
