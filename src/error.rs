use thiserror::Error;

use crate::parameters::parameter::ParameterError;

/// Error types for the fomfit library.
#[derive(Error, Debug)]
pub enum FitError {
    /// Error raised by the parameter system.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// Unknown figure-of-merit identifier.
    #[error("Unknown figure-of-merit type: '{0}'")]
    UnknownMetric(String),

    /// Mismatched array lengths in a dataset or candidate vector.
    #[error("Length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An error-weighted metric was requested on a dataset without uncertainties.
    #[error("Metric '{metric}' requires per-point uncertainties, but the dataset has none")]
    MissingUncertainties { metric: String },

    /// No dataset with fit=true is registered; the composite FOM is undefined.
    #[error("No active dataset registered; add at least one dataset with fit=true")]
    NoActiveDatasets,

    /// The fit subset of the controller is empty.
    #[error("Controller '{controller}' holds no parameter with fit=true")]
    NoFreeParameters { controller: String },

    /// Error reported by a simulation callable.
    #[error("Simulation error: {0}")]
    Simulation(String),

    /// Error reported by a solver.
    #[error("Solver error: {0}")]
    Solver(String),

    /// Generic error for cases that don't fit the other categories.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for fomfit operations.
pub type Result<T> = std::result::Result<T, FitError>;

impl From<String> for FitError {
    fn from(s: String) -> Self {
        FitError::Other(s)
    }
}

impl From<&str> for FitError {
    fn from(s: &str) -> Self {
        FitError::Other(s.to_string())
    }
}
