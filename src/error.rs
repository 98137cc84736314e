use thiserror::Error;

/// Error types for the lcfit-rs library.
#[derive(Error, Debug)]
pub enum LcFitError {
    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The compact/expanded parameter mapping produced or received a vector of the
    /// wrong length. This is a contract violation and is never recovered from.
    #[error("Parameter mapping mismatch in {context}: expected length {expected}, got {actual}")]
    MappingMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A model variant or configuration that cannot be evaluated was requested.
    #[error("Unsupported model configuration: {0}")]
    UnsupportedModelConfiguration(String),

    /// The least-squares solver did not converge.
    #[error("Solver did not converge: {0}")]
    SolverNonConvergence(String),

    /// Error for invalid parameter values.
    #[error("Invalid parameter value: {0}")]
    InvalidParameter(String),

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    ParameterError(String),

    /// A free parameter has no prior, so it cannot be sampled.
    #[error("Parameter '{0}' is free but has no prior")]
    MissingPrior(String),

    /// Error during function evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Linear algebra error.
    #[error("Linear algebra error: {0}")]
    LinearAlgebraError(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state in the algorithm or data structure.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Parameter not found.
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error for cases that don't fit the other categories.
    #[error("Error: {0}")]
    Other(String),
}

impl From<crate::parameters::ParameterError> for LcFitError {
    fn from(err: crate::parameters::ParameterError) -> Self {
        match err {
            crate::parameters::ParameterError::ParameterNotFound { name } => {
                LcFitError::ParameterNotFound(name)
            }
            other => LcFitError::ParameterError(format!("{}", other)),
        }
    }
}

/// Result type alias for lcfit-rs operations.
pub type Result<T> = std::result::Result<T, LcFitError>;

impl From<String> for LcFitError {
    fn from(s: String) -> Self {
        LcFitError::Other(s)
    }
}

impl From<&str> for LcFitError {
    fn from(s: &str) -> Self {
        LcFitError::Other(s.to_string())
    }
}
