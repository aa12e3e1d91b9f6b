//! Guest memory image.
//!
//! The memory image holds architecturally committed memory. Loads read it when no in-flight
//! store supplies their bytes, and stores write it only when they commit.

use std::collections::HashMap;

use crate::common::access::{from_mem_bytes, to_mem_bytes};
use crate::common::{Endian, MemAccess, MemAccessResult};

/// Byte-addressable memory with a fixed target byte order.
pub trait MemImage {
    /// Fills `access.value` from memory and sets `access.result`.
    fn read(&self, access: &mut MemAccess);

    /// Writes `access.value` to memory and sets `access.result`.
    fn write(&mut self, access: &mut MemAccess);

    /// Target byte order.
    fn endian(&self) -> Endian;
}

const PAGE_SHIFT: u32 = 12;
const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Page-granular sparse memory. Unwritten bytes read as zero.
#[derive(Debug, Clone, Default)]
pub struct SparseMemory {
    pages: HashMap<u64, Box<[u8; PAGE_SIZE]>>,
    endian: Endian,
}

impl SparseMemory {
    /// Creates an empty image.
    pub fn new(endian: Endian) -> Self {
        Self {
            pages: HashMap::new(),
            endian,
        }
    }

    /// Reads one byte.
    pub fn read_byte(&self, addr: u64) -> u8 {
        self.pages
            .get(&(addr >> PAGE_SHIFT))
            .map_or(0, |page| page[(addr as usize) & (PAGE_SIZE - 1)])
    }

    /// Writes one byte, allocating its page on first touch.
    pub fn write_byte(&mut self, addr: u64, value: u8) {
        let page = self
            .pages
            .entry(addr >> PAGE_SHIFT)
            .or_insert_with(|| Box::new([0; PAGE_SIZE]));
        page[(addr as usize) & (PAGE_SIZE - 1)] = value;
    }

    /// Copies `data` into memory starting at `addr`.
    pub fn load_bytes(&mut self, addr: u64, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_byte(addr.wrapping_add(i as u64), *byte);
        }
    }

    /// Reads a `size`-byte register value at `addr`.
    pub fn read_value(&self, addr: u64, size: u8) -> u64 {
        let mut access = MemAccess::new(addr, size);
        self.read(&mut access);
        access.value
    }

    /// Number of pages touched so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl MemImage for SparseMemory {
    fn read(&self, access: &mut MemAccess) {
        if !access.has_valid_size() {
            access.result = MemAccessResult::AccessViolation;
            return;
        }
        let mut bytes = [0u8; 8];
        for (i, byte) in bytes.iter_mut().take(usize::from(access.size)).enumerate() {
            *byte = self.read_byte(access.address.wrapping_add(i as u64));
        }
        access.value = from_mem_bytes(&bytes, access.size, self.endian);
        access.result = MemAccessResult::Success;
    }

    fn write(&mut self, access: &mut MemAccess) {
        if !access.has_valid_size() {
            access.result = MemAccessResult::AccessViolation;
            return;
        }
        let bytes = to_mem_bytes(access.value, access.size, self.endian);
        for (i, byte) in bytes.iter().take(usize::from(access.size)).enumerate() {
            self.write_byte(access.address.wrapping_add(i as u64), *byte);
        }
        access.result = MemAccessResult::Success;
    }

    fn endian(&self) -> Endian {
        self.endian
    }
}
