//! # End-to-End Scenarios
//!
//! Small programs run through the whole core, checked against their functional results.

/// Branch prediction and misprediction recovery.
pub mod branch;

/// Pipeline results against the functional emulator on random programs.
pub mod differential;

/// Exceptions, fatal faults, undefined instructions and deadlock detection.
pub mod faults;



/// Store-to-load forwarding, access-order violations and load latency recovery.
pub mod memory;

/// Multiple threads and host notifications.
pub mod threads;
