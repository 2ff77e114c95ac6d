use thiserror::Error;

#[derive(Error, Debug)]
pub enum YtsegError {
    #[error("Audio cut failed: {0}")]
    AudioCut(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Segmentation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, YtsegError>;
