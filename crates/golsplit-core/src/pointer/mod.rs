//! Pointer chains into a foreign process.
//!
//! A [`PointerChain`] describes how to reach a value: start at the image base
//! plus `base`, dereference, follow each intermediate offset with another
//! dereference, then add `final_offset` without dereferencing. Chains are
//! plain data so a game layout can be loaded from a file.

mod value;

pub use value::*;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::memory::{PointerWidth, ReadMemory};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerChain {
    /// Offset from the image base of the main module
    pub base: u64,
    /// Offsets applied before each dereference after the first
    #[serde(default)]
    pub offsets: Vec<i64>,
    /// Offset added to the last resolved pointer
    #[serde(default)]
    pub final_offset: i64,
    pub value_type: ValueType,
    /// `false` for static fields read directly at `image base + base`
    #[serde(default = "default_deref")]
    pub deref: bool,
}

fn default_deref() -> bool {
    true
}

impl PointerChain {
    pub fn new(base: u64, offsets: &[i64], final_offset: i64, value_type: ValueType) -> Self {
        Self {
            base,
            offsets: offsets.to_vec(),
            final_offset,
            value_type,
            deref: true,
        }
    }

    /// A static field located at `image base + base`
    pub fn absolute(base: u64, value_type: ValueType) -> Self {
        Self {
            base,
            offsets: Vec::new(),
            final_offset: 0,
            value_type,
            deref: false,
        }
    }

    /// Number of pointer reads needed to resolve the chain
    pub fn dereference_count(&self) -> usize {
        if self.deref { self.offsets.len() + 1 } else { 0 }
    }

    /// Resolve the address of the target value.
    ///
    /// Stops at the first failed or null dereference.
    pub fn resolve<R: ReadMemory + ?Sized>(
        &self,
        reader: &R,
        image_base: u64,
        width: PointerWidth,
    ) -> Result<u64> {
        let mut address = image_base
            .checked_add(self.base)
            .ok_or(Error::AddressOverflow {
                address: image_base,
                offset: self.base as i64,
            })?;

        if !self.deref {
            return Ok(address);
        }

        address = deref(reader, address, width)?;
        for &offset in &self.offsets {
            address = deref(reader, apply_offset(address, offset)?, width)?;
        }

        apply_offset(address, self.final_offset)
    }

    /// Resolve and read the target value, `None` if anything along the way
    /// failed.
    pub fn read_value<R: ReadMemory + ?Sized>(
        &self,
        reader: &R,
        image_base: u64,
        width: PointerWidth,
    ) -> Option<Value> {
        let result = self
            .resolve(reader, image_base, width)
            .and_then(|address| self.value_type.read(reader, address));

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                trace!("Read of chain at base {:#x} failed: {}", self.base, e);
                None
            }
        }
    }
}

fn deref<R: ReadMemory + ?Sized>(reader: &R, address: u64, width: PointerWidth) -> Result<u64> {
    let pointer = reader.read_pointer(address, width)?;
    if pointer == 0 {
        return Err(Error::NullPointer { address });
    }
    Ok(pointer)
}

fn apply_offset(address: u64, offset: i64) -> Result<u64> {
    address
        .checked_add_signed(offset)
        .ok_or(Error::AddressOverflow { address, offset })
}
