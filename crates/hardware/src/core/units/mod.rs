//! Execution units and functional components.
//!
//! This module contains the timing models the core consults while ops execute: the branch
//! prediction unit, the data cache hierarchy, execution unit reservation, and the
//! load/store unit.

/// Branch Resolution Unit including branch predictors and BTB.
pub mod bru;

/// Data cache hierarchy (L1D, L2) with replacement policies.
pub mod cache;

/// Execution unit reservation tables.
pub mod exec;

/// Load/Store Unit: memory ordering, forwarding and violation detection.
pub mod lsu;
