use thiserror::Error;

pub type CrmResult<T> = Result<T, CrmError>;

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Index {index} out of bounds for group with {len} children")]
    Index { index: usize, len: usize },

    #[error("Rule parse error: {0}")]
    Parse(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CrmError {
    /// True for failures raised by the network round trip rather than by
    /// local construction or decoding.
    pub fn is_fetch(&self) -> bool {
        matches!(self, CrmError::Fetch(_) | CrmError::Status { .. })
    }
}
