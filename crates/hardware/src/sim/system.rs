//! Host-side process and system-call bookkeeping.
//!
//! The core reports process-level events to a `SystemIf` implementation as they commit. The
//! simulator itself never interprets them.

use tracing::info;

/// Notifications the core sends to the hosting system.
pub trait SystemIf {
    /// A simulated process terminated.
    fn notify_process_termination(&mut self, pid: u32);

    /// A system call read `size` bytes from a host file into guest memory at `addr`.
    fn notify_syscall_read_file_to_memory(&mut self, addr: u64, size: u64);

    /// A system call wrote `size` bytes of guest memory at `addr` to a host file.
    fn notify_syscall_write_file_from_memory(&mut self, addr: u64, size: u64);

    /// Guest memory was allocated (`allocate == true`) or released.
    fn notify_memory_allocation(&mut self, addr: u64, size: u64, allocate: bool);
}

/// A system notification produced when an op commits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemNotification {
    /// File contents were read into guest memory.
    ReadFileToMemory {
        /// Destination address.
        addr: u64,
        /// Byte count.
        size: u64,
    },
    /// Guest memory was written to a file.
    WriteFileFromMemory {
        /// Source address.
        addr: u64,
        /// Byte count.
        size: u64,
    },
    /// Guest memory was allocated or released.
    MemoryAllocation {
        /// Base address.
        addr: u64,
        /// Byte count.
        size: u64,
        /// True for allocation, false for release.
        allocate: bool,
    },
}

impl SystemNotification {
    /// Forwards the notification to `system`.
    pub fn deliver(self, system: &mut dyn SystemIf) {
        match self {
            Self::ReadFileToMemory { addr, size } => {
                system.notify_syscall_read_file_to_memory(addr, size);
            }
            Self::WriteFileFromMemory { addr, size } => {
                system.notify_syscall_write_file_from_memory(addr, size);
            }
            Self::MemoryAllocation {
                addr,
                size,
                allocate,
            } => system.notify_memory_allocation(addr, size, allocate),
        }
    }
}

/// A `SystemIf` that only logs what it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSystem;

impl SystemIf for LoggingSystem {
    fn notify_process_termination(&mut self, pid: u32) {
        info!(pid, "process terminated");
    }

    fn notify_syscall_read_file_to_memory(&mut self, addr: u64, size: u64) {
        info!(addr, size, "read file to memory");
    }

    fn notify_syscall_write_file_from_memory(&mut self, addr: u64, size: u64) {
        info!(addr, size, "write file from memory");
    }

    fn notify_memory_allocation(&mut self, addr: u64, size: u64, allocate: bool) {
        info!(addr, size, allocate, "memory allocation");
    }
}
