//! Memory access descriptors.
//!
//! A `MemAccess` travels with a load or store op from execution to commit. It carries the
//! address range, the value read or to be written, and a result code. The byte-order helpers
//! here are shared by the memory image and by store-to-load forwarding so both agree on how a
//! register value maps onto memory bytes.

use serde::Deserialize;

/// Target byte order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Endian {
    /// Least significant byte at the lowest address.
    #[default]
    Little,
    /// Most significant byte at the lowest address.
    Big,
}

/// Outcome of a memory access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MemAccessResult {
    /// The access completed.
    #[default]
    Success,
    /// A load partially overlapped an in-flight store and could not be forwarded.
    ReadInvalidPartialRead,
    /// The memory image rejected the access (bad size or address).
    AccessViolation,
}

/// Address range, data, and result of one load or store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemAccess {
    /// First byte address.
    pub address: u64,
    /// Access size in bytes (1, 2, 4 or 8).
    pub size: u8,
    /// Register-format value read or written.
    pub value: u64,
    /// Result code.
    pub result: MemAccessResult,
}

impl MemAccess {
    /// Creates a read descriptor.
    pub const fn new(address: u64, size: u8) -> Self {
        Self {
            address,
            size,
            value: 0,
            result: MemAccessResult::Success,
        }
    }

    /// Creates a write descriptor carrying `value`.
    pub const fn with_value(address: u64, size: u8, value: u64) -> Self {
        Self {
            address,
            size,
            value,
            result: MemAccessResult::Success,
        }
    }

    /// One past the last byte address.
    pub const fn end(&self) -> u64 {
        self.address.wrapping_add(self.size as u64)
    }

    /// True when the access carries a supported size.
    pub const fn has_valid_size(&self) -> bool {
        matches!(self.size, 1 | 2 | 4 | 8)
    }
}

/// Returns a mask covering the low `size` bytes.
pub const fn size_mask(size: u8) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size as u32 * 8)) - 1
    }
}

/// Lays out the low `size` bytes of `value` in memory order.
pub fn to_mem_bytes(value: u64, size: u8, endian: Endian) -> [u8; 8] {
    let size = usize::from(size.min(8));
    let le = value.to_le_bytes();
    let mut out = [0u8; 8];
    match endian {
        Endian::Little => out[..size].copy_from_slice(&le[..size]),
        Endian::Big => {
            for i in 0..size {
                out[i] = le[size - 1 - i];
            }
        }
    }
    out
}

/// Reassembles a register value from `size` bytes in memory order.
pub fn from_mem_bytes(bytes: &[u8], size: u8, endian: Endian) -> u64 {
    let size = usize::from(size.min(8)).min(bytes.len());
    let mut le = [0u8; 8];
    match endian {
        Endian::Little => le[..size].copy_from_slice(&bytes[..size]),
        Endian::Big => {
            for i in 0..size {
                le[i] = bytes[size - 1 - i];
            }
        }
    }
    u64::from_le_bytes(le)
}
