use hydropt_core::ConfigError;
use thiserror::Error;

/// The complete error taxonomy surfaced by the solver (`spec.md` section 7).
#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("shape mismatch: {what} expected length {expected}, found {found}")]
    Shape { what: String, expected: usize, found: usize },

    #[error("invalid time grid: {0}")]
    InvalidTimeGrid(String),

    #[error("{0}")]
    Usage(String),

    #[error("scenario run cancelled")]
    Cancelled,

    #[error("non-finite value encountered in {where_}: {value}")]
    Arithmetic { where_: String, value: f64 },
}

pub type Result<T> = std::result::Result<T, SolverError>;
