//! Shared test infrastructure.

/// Simulator construction and run helpers.
pub mod harness;

/// Collaborator mocks.
pub mod mocks;

/// Emulator replaying a fixed op sequence.
pub mod scripted;
