use thiserror::Error;

#[derive(Error, Debug)]
pub enum VecError {
    #[error("vecstore: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("vecstore: empty vector")]
    EmptyVector,

    #[error("vecstore: non-finite value at position {index}")]
    NonFinite { index: usize },

    #[error("vecstore: empty identity id")]
    EmptyId,

    #[error("vecstore: resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("vecstore: {0}")]
    Io(String),

    #[error("vecstore: invalid format: {0}")]
    InvalidFormat(String),
}
