use std::path::PathBuf;

/// Domain errors that callers may want to match on. Everything else travels
/// as `anyhow::Error` with context attached.
#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("column '{column}' missing from {}", path.display())]
    MissingColumn { column: String, path: PathBuf },

    #[error("row {row}: column '{column}' has non-numeric value '{value}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("unexpected model output: {0}")]
    ModelOutput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
