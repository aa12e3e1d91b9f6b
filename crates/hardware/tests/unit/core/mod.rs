//! Core data structure suites.

/// Generation-checked op storage.
pub mod arena;

/// Checkpoint creation, backup and recovery.
pub mod checkpoint;

/// Program-order list.
pub mod inorder;


/// Issue queue sets and rescheduling.
pub mod scheduler;
