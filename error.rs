use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid image (not a JPEG/PNG file): {}", .0.display())]
    InvalidImage(PathBuf),

    #[error("No image found: {0}")]
    NotFound(String),

    #[error("Processing Failed: {0}")]
    Processing(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Model Error: {0}")]
    Model(String),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotFound(_) => 2,
            Error::InvalidImage(_) => 3,
            Error::Config(_) => 4,
            _ => 1,
        }
    }
}
