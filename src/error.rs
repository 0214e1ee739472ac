use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaveError {
    #[error("path not found: {}", .0.display())]
    MissingPath(PathBuf),
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("no channel known for user '{0}'")]
    UnknownUser(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CaveError {
    pub fn malformed(path: impl AsRef<Path>, reason: impl AsRef<str>) -> Self {
        Self::MalformedDocument(format!("{}: {}", path.as_ref().display(), reason.as_ref()))
    }
}

pub type Result<T> = std::result::Result<T, CaveError>;
