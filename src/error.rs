use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Transient LLM error: {0}")]
    LlmTransient(String),

    #[error("No usable data: {0}")]
    NoData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl PulseError {
    /// Whether retrying the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, PulseError::LlmTransient(_))
    }
}

impl From<polars::error::PolarsError> for PulseError {
    fn from(err: polars::error::PolarsError) -> Self {
        PulseError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
