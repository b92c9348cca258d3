//! Error types for `memir`.

use crate::objects::ObjectKind;
use crate::topology::{FinalState, Hypothesis, Role};
use thiserror::Error;

/// Precondition violations reported by the evaluator. Numerical problems inside a single integrand
/// evaluation are never reported through this type, they are clamped and counted instead.
#[derive(Error, Debug)]
pub enum Error {
    /// The number of observed charged leptons does not match the final state.
    #[error("final state {final_state:?} expects {expected} lepton(s), but {found} were added")]
    LeptonCountMismatch {
        /// The requested final state.
        final_state: FinalState,
        /// Number of leptons the final state requires.
        expected: usize,
        /// Number of leptons that were added.
        found: usize,
    },

    /// An object of the given kind is required but none was added.
    #[error("final state {0:?} requires a {1:?} object")]
    MissingObject(FinalState, ObjectKind),

    /// The hypothesis cannot be tested in the final state.
    #[error("hypothesis {1:?} is not supported for final state {0:?}")]
    UnsupportedHypothesis(FinalState, Hypothesis),

    /// A lost role was requested that is not matched to a jet in the final state.
    #[error("role {1:?} cannot be lost in final state {0:?}")]
    InvalidLostRole(FinalState, Role),

    /// A role appears more than once in the list of lost roles.
    #[error("role {0:?} appears more than once in the list of lost roles")]
    DuplicateLostRole(Role),

    /// The integration domain is not a valid box.
    #[error("invalid integration domain: {0}")]
    InvalidDomain(String),

    /// A worker thread of the integrator panicked.
    #[error("integrator worker thread panicked")]
    WorkerPanicked,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
