//! Collaborator mocks.

/// Fixed-latency cache model.
pub mod cache;

/// mockall mocks for the memory image.
pub mod memory;

/// mockall mocks for the host system.
pub mod system;
