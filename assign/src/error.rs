use faceid_vecstore::VecError;
use thiserror::Error;

/// Errors returned by assignment operations.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("assign: invalid config: {0}")]
    InvalidConfig(String),

    #[error("assign: {0}")]
    Index(#[from] VecError),
}
