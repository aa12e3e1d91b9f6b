//! Simulation infrastructure.
//!
//! This module contains everything around the core that makes time advance. It provides:
//! 1. **Clock:** Cycle phases, priorities and the `Clocked` contract of pipeline units.
//! 2. **Time wheel:** Fixed-size ring of future events.
//! 3. **System:** Host-side process and system call bookkeeping.
//! 4. **Simulator:** The top-level driver and its run summary.

/// Cycle phases, priorities and clocked units.
pub mod clock;

/// Top-level simulation driver.
pub mod simulator;

/// Host-side process and system call bookkeeping.
pub mod system;

/// Fixed-size ring of future events.
pub mod wheel;

pub use simulator::{RunSummary, Simulator, StopReason};
