//! Out-of-order pipeline implementation.
//!
//! This module contains the pipeline of the core. It includes the following components:
//! 1. **Stages:** Fetch, Rename, Dispatch, Select and the Retirer, as clocked units.
//! 2. **Execution:** Deferred event handlers from issue through write-back.
//! 3. **Coordination:** Commit, retirement, flush and reschedule of ops.
//! 4. **Ordering:** The per-thread in-order list and the front-end latches.
//! 5. **Schedulers:** Issue queues with pluggable select policies.

/// Commit, retirement, flush and reschedule.
pub mod coordinator;

/// Issue, execution, finish and write-back event handlers.
pub mod execute;

/// Per-thread program-order list.
pub mod inorder;

/// Inter-stage latches (fetch→rename, rename→dispatch).
pub mod latches;

/// Issue queues and select policies.
pub mod scheduler;

/// Clocked pipeline stages.
pub mod stages;
