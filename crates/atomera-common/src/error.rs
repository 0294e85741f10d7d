use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtomeraError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown {kind} mode: {value}")]
    UnknownMode { kind: &'static str, value: String },

    #[error("Malformed structure file: {0}")]
    Structure(String),

    #[error("Malformed tool output: {0}")]
    ToolOutput(String),
}

pub type Result<T> = std::result::Result<T, AtomeraError>;
