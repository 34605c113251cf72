use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memory::ReadMemory;

/// Type of the value at the end of a pointer chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    U8,
    U16,
    U32,
    I32,
    U64,
    /// Single byte, non-zero is `true`
    Bool,
    F32,
    /// Zero-terminated ASCII with a maximum length in bytes
    Str(usize),
    /// Three consecutive `f32`s
    Vec3,
}

impl ValueType {
    pub fn read<R: ReadMemory + ?Sized>(&self, reader: &R, address: u64) -> Result<Value> {
        Ok(match *self {
            Self::U8 => Value::U8(reader.read_u8(address)?),
            Self::U16 => Value::U16(reader.read_u16(address)?),
            Self::U32 => Value::U32(reader.read_u32(address)?),
            Self::I32 => Value::I32(reader.read_i32(address)?),
            Self::U64 => Value::U64(reader.read_u64(address)?),
            Self::Bool => Value::Bool(reader.read_u8(address)? != 0),
            Self::F32 => Value::F32(reader.read_f32(address)?),
            Self::Str(max_len) => Value::Str(reader.read_cstring(address, max_len)?),
            Self::Vec3 => {
                let bytes: [u8; 12] = reader.read_array(address)?;
                let f = |i: usize| {
                    f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
                };
                Value::Vec3([f(0), f(4), f(8)])
            }
        })
    }
}

/// A value read from the target process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    I32(i32),
    U64(u64),
    Bool(bool),
    F32(f32),
    Str(String),
    Vec3([f32; 3]),
}

impl Value {
    /// Integer view of any integral or boolean value
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::U8(v) => Some(v as i64),
            Self::U16(v) => Some(v as i64),
            Self::U32(v) => Some(v as i64),
            Self::I32(v) => Some(v as i64),
            Self::U64(v) => i64::try_from(v).ok(),
            Self::Bool(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            other => other.as_i64().map(|v| v != 0),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{}", v),
            Self::U16(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::I32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::F32(v) => write!(f, "{}", v),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Vec3([x, y, z]) => write!(f, "({}, {}, {})", x, y, z),
        }
    }
}
