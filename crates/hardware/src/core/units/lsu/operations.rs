//! Byte-range helpers for memory disambiguation.

use crate::common::access::{from_mem_bytes, to_mem_bytes};
use crate::common::{Endian, MemAccess};

/// Returns true if the two accesses share at least one byte.
#[inline]
pub fn overlaps(a: &MemAccess, b: &MemAccess) -> bool {
    a.address < b.end() && b.address < a.end()
}

/// Returns true if every byte of `inner` lies within `outer`.
#[inline]
pub fn contains(outer: &MemAccess, inner: &MemAccess) -> bool {
    outer.address <= inner.address && inner.end() <= outer.end()
}

/// Extracts the value a load reads from an older store that fully contains it.
///
/// The store value is laid out in memory order first, so the result is correct for both
/// byte orders.
pub fn read_previous_access(load: &MemAccess, store: &MemAccess, endian: Endian) -> u64 {
    let bytes = to_mem_bytes(store.value, store.size, endian);
    let offset = (load.address - store.address) as usize;
    let end = (offset + usize::from(load.size)).min(bytes.len());
    from_mem_bytes(&bytes[offset..end], load.size, endian)
}

/// Overlays the bytes of `store` that fall inside `base` onto `base.value`.
pub fn merge_partial_access(base: &MemAccess, store: &MemAccess, endian: Endian) -> u64 {
    let mut merged = to_mem_bytes(base.value, base.size, endian);
    let written = to_mem_bytes(store.value, store.size, endian);
    let lo = base.address.max(store.address);
    let hi = base.end().min(store.end());
    for addr in lo..hi {
        merged[(addr - base.address) as usize] = written[(addr - store.address) as usize];
    }
    from_mem_bytes(&merged, base.size, endian)
}
