//! Simulation error definitions.
//!
//! This module defines the fatal error channel of the simulator. It provides:
//! 1. **Taxonomy:** Configuration errors, invariant violations, and unsupported guest behavior.
//! 2. **Propagation:** A `SimResult` alias so every fallible operation returns through `?`.
//! 3. **Abort context:** Wrapping an error with the cycle at which the run stopped.
//!
//! Branch mispredictions, memory-order violations and other speculative events are
//! ordinary control flow handled by the recoverer. They never appear here.

use thiserror::Error;

/// Fatal simulation errors.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid or inconsistent configuration, detected before the run starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// A modeling invariant was broken (e.g. committing an op that is not the oldest).
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The guest program asked for something the simulator does not model.
    #[error("unsupported guest behavior: {0}")]
    Unsupported(String),

    /// A guest program could not be assembled or loaded.
    #[error("invalid program at line {line}: {msg}")]
    Program {
        /// One-based source line.
        line: usize,
        /// What went wrong.
        msg: String,
    },

    /// A deferred event was scheduled further ahead than the time wheel can hold.
    #[error("event delay {delay} does not fit in a time wheel of {size} slots")]
    EventDelay {
        /// Requested delay in cycles.
        delay: u64,
        /// Number of slots in the wheel.
        size: usize,
    },

    /// A fatal error annotated with the cycle at which the run stopped.
    #[error("simulation aborted at cycle {cycle}: {source}")]
    Aborted {
        /// Cycle count at failure.
        cycle: u64,
        /// The underlying error.
        source: Box<SimError>,
    },
}

/// Result alias used throughout the simulator.
pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// Builds a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Builds an invariant violation.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Wraps the error with the cycle count at which the run stopped.
    ///
    /// Errors that are already wrapped keep their original cycle.
    pub fn at_cycle(self, cycle: u64) -> Self {
        match self {
            Self::Aborted { .. } => self,
            other => Self::Aborted {
                cycle,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through any `Aborted` wrapper.
    pub fn root(&self) -> &Self {
        match self {
            Self::Aborted { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Returns an invariant violation built from `msg` unless `cond` holds.
///
/// The message closure only runs on failure.
pub fn ensure(cond: bool, msg: impl FnOnce() -> String) -> SimResult<()> {
    if cond {
        Ok(())
    } else {
        Err(SimError::Invariant(msg()))
    }
}
