//! Common types used throughout the simulator.
//!
//! This module provides building blocks shared across all components. It includes:
//! 1. **Memory Access:** The descriptor carried by loads and stores, plus byte-order helpers.
//! 2. **Error Handling:** The fatal `SimError` taxonomy and the `SimResult` alias.

/// Memory access descriptors and byte-order helpers.
pub mod access;

/// Fatal error types.
pub mod error;

pub use access::{Endian, MemAccess, MemAccessResult};
pub use error::{SimError, SimResult, ensure};
