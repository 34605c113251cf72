use crate::error::{Error, Result};

/// Granularity used when a bounded read runs into an unmapped page
pub const PAGE_SIZE: u64 = 0x1000;

/// Width of a pointer in the target process
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
)]
pub enum PointerWidth {
    #[default]
    #[serde(rename = "32")]
    #[strum(serialize = "32-bit")]
    Bits32,
    #[serde(rename = "64")]
    #[strum(serialize = "64-bit")]
    Bits64,
}

impl PointerWidth {
    pub fn size(&self) -> usize {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }
}

/// Raw access to the memory of a foreign process.
///
/// Implementors only need to provide `read_bytes`, which must fail with
/// [`Error::PartialRead`] instead of returning a short buffer. Every typed
/// helper is little-endian.
pub trait ReadMemory {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Read up to `size` bytes, settling for the bytes up to the end of the
    /// first page when the full range is not readable.
    fn read_bytes_partial(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        match self.read_bytes(address, size) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                let to_page_end = (PAGE_SIZE - address % PAGE_SIZE) as usize;
                if to_page_end >= size {
                    return Err(e);
                }
                self.read_bytes(address, to_page_end)
            }
        }
    }

    fn read_array<const N: usize>(&self, address: u64) -> Result<[u8; N]> {
        let bytes = self.read_bytes(address, N)?;
        let actual = bytes.len();
        bytes.try_into().map_err(|_| Error::PartialRead {
            address,
            expected: N,
            actual,
        })
    }

    fn read_u8(&self, address: u64) -> Result<u8> {
        Ok(self.read_array::<1>(address)?[0])
    }

    fn read_u16(&self, address: u64) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array(address)?))
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(address)?))
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array(address)?))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array(address)?))
    }

    fn read_f32(&self, address: u64) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array(address)?))
    }

    /// Read a pointer-sized value, zero-extended to 64 bits
    fn read_pointer(&self, address: u64, width: PointerWidth) -> Result<u64> {
        match width {
            PointerWidth::Bits32 => self.read_u32(address).map(u64::from),
            PointerWidth::Bits64 => self.read_u64(address),
        }
    }

    /// Read a zero-terminated ASCII string of at most `max_len` bytes.
    ///
    /// Stops at the first zero byte; without one, returns everything that
    /// could be read within the bound.
    fn read_cstring(&self, address: u64, max_len: usize) -> Result<String> {
        let bytes = self.read_bytes_partial(address, max_len)?;
        let end = memchr::memchr(0, &bytes).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

impl<T: ReadMemory + ?Sized> ReadMemory for &T {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }
}
