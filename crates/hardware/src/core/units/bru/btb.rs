//! Branch Target Buffer (BTB).
//!
//! The BTB is a direct-mapped table of target addresses for control transfers. Fetch uses
//! it for indirect jumps, whose targets are unknown until execution.

/// An entry in the Branch Target Buffer.
#[derive(Clone, Copy, Debug, Default)]
struct BtbEntry {
    /// Full PC of the owning instruction.
    tag: u64,
    /// Last resolved target.
    target: u64,
    valid: bool,
}

/// Branch Target Buffer structure.
#[derive(Clone, Debug)]
pub struct Btb {
    table: Vec<BtbEntry>,
}

impl Btb {
    /// Creates a BTB with `size` entries, rounded up to a power of two.
    pub fn new(size: usize) -> Self {
        Self {
            table: vec![BtbEntry::default(); size.max(1).next_power_of_two()],
        }
    }

    fn index(&self, pc: u64) -> usize {
        ((pc >> 2) as usize) & (self.table.len() - 1)
    }

    /// Returns the recorded target for `pc`, if the entry belongs to it.
    pub fn lookup(&self, pc: u64) -> Option<u64> {
        let e = self.table[self.index(pc)];
        (e.valid && e.tag == pc).then_some(e.target)
    }

    /// Records `target` for `pc`, replacing whatever shared its slot.
    pub fn update(&mut self, pc: u64, target: u64) {
        let idx = self.index(pc);
        self.table[idx] = BtbEntry {
            tag: pc,
            target,
            valid: true,
        };
    }
}
