use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Reasoning service error: {0}")]
    Reasoning(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, MergeError>;
