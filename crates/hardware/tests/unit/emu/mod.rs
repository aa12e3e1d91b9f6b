//! Assembler and reference emulator suites.

/// Functional execution of assembled programs.
pub mod program;
