//! Simulation infrastructure suites.

/// Cycle phases and error propagation.
pub mod clock;

/// Time wheel ordering.
pub mod wheel;
