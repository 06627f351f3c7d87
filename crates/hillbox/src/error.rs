use thiserror::Error;

/// Errors surfaced by the simulation kernel.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HillboxError {
    /// Inconsistent domain, ghost or integrator settings. Raised before any step runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A step produced a non-finite position or velocity. The step has been rolled back.
    #[error("numeric degeneracy at particle {index} (t = {time})")]
    NumericDegeneracy { index: usize, time: f64 },

    /// The caller broke a store contract (active count, index range, passive mass).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl HillboxError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        HillboxError::Configuration(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        HillboxError::InvariantViolation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, HillboxError>;
