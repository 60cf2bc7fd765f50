use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("ExifTool is required but was not found. Install it from https://exiftool.org/ or set exiftool_path")]
    ToolNotFound,

    #[error("Source folder does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Could not find a free name for: {}", .path.display())]
    NameSpaceExhausted { path: PathBuf },

    #[error("Content of {} changed while it was being copied", .path.display())]
    ContentChanged { path: PathBuf },

    #[error("{0}")]
    Other(String),
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}
