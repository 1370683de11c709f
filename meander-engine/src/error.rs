//! Failure taxonomy for reservoir construction, dynamics, and training.
//!
//! Every kind is fatal: nothing here is retried internally, and a reservoir
//! that produced `NumericInstability` is left in an inconsistent state and
//! must be discarded by the caller.

use thiserror::Error;

/// Errors surfaced by the Meander engine.
#[derive(Debug, Error)]
pub enum EsnError {
    /// Spectral calibration found a zero-magnitude dominant eigenvalue;
    /// no usable network can be produced from this draw.
    #[error("degenerate spectrum: pseudo weight matrix has zero spectral radius")]
    DegenerateSpectrum,

    /// A dynamics step produced a non-finite activity value.
    #[error("non-finite activity after step {step}; reservoir state is inconsistent")]
    NumericInstability { step: u64 },

    /// The requested warmup + training window exceeds the available input.
    /// Raised before any state mutation occurs.
    #[error("insufficient input: warmup + training needs {required} steps, {available} available")]
    InsufficientInput { required: usize, available: usize },

    /// Ridge regression could not produce a finite readout matrix even with
    /// regularization applied.
    #[error("training failed: regression produced a non-finite readout matrix")]
    TrainingFailed,
}

pub type Result<T> = std::result::Result<T, EsnError>;
