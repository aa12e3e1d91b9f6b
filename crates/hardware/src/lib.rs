//! Out-of-order superscalar core simulator library.
//!
//! This crate implements a cycle-accurate model of a speculative out-of-order core with the
//! following:
//! 1. **Core:** Fetch, rename, dispatch, schedulers, execution, commit and retirement of ops,
//!    with one hardware thread per simulated process.
//! 2. **Speculation:** Checkpointed rename and branch history state, branch prediction, load
//!    latency prediction and configurable misprediction recovery.
//! 3. **Memory:** Per-thread load/store queues with store-to-load forwarding and a timing-only
//!    data cache hierarchy.
//! 4. **Semantics:** The `Emulator` contract and a reference emulator over a small assembly
//!    language.
//! 5. **Simulation:** The event-driven clock, time wheel, configuration and statistics.

/// Errors and memory access descriptors.
pub mod common;
/// Simulator configuration (defaults, policy enums, validation).
pub mod config;
/// The out-of-order core (ops, pipeline, recovery, units).
pub mod core;
/// Instruction semantics (emulator contract, memory image, assembler).
pub mod emu;
/// Clock, time wheel, host system interface and the simulator driver.
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Error type and result alias used throughout the crate.
pub use crate::common::{SimError, SimResult};
/// Root configuration type; use `Config::default()` or `Config::from_json`.
pub use crate::config::Config;
/// The simulated core.
pub use crate::core::Core;
/// Extension points invoked around op state transitions.
pub use crate::core::hooks::{HookPoint, Hooks, OpObserver};
/// Emulator contract and its reference implementation.
pub use crate::emu::{Emulator, ProgramEmulator};
/// Top-level driver and its run summary.
pub use crate::sim::{RunSummary, Simulator, StopReason};
/// Host-side notification interface and a logging implementation.
pub use crate::sim::system::{LoggingSystem, SystemIf};
/// Statistics snapshot.
pub use crate::stats::SimStats;
