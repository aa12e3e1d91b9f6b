//! Load/store unit (LSU).
//!
//! This module holds the memory-ordering logic of a thread. It includes:
//! - [`mem_order`]: The load and store queues, forwarding, and violation detection.
//! - [`mem_dep`]: Memory dependence prediction, trained by access-order violations.
//! - [`hit_miss`]: Load hit/miss prediction for scheduling consumers.
//! - [`operations`]: Byte-range overlap, containment, and forwarding helpers.

/// Load hit/miss predictors.
pub mod hit_miss;

/// Memory dependence predictors.
pub mod mem_dep;

/// Per-thread load/store queues.
pub mod mem_order;

/// Access range helpers.
pub mod operations;

pub use hit_miss::{HitMissPred, HitMissStats};
pub use mem_dep::{MemDepPred, MemDepStats, waits_for_store};
pub use mem_order::{LoadResult, MemOrderManager, MemOrderStats, MemViolation};
