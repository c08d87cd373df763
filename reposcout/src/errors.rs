/// This module defines the error type shared by the scanning engine.
///
/// # Where errors surface
///
/// Scanning distinguishes three kinds of failure:
///
/// 1. **Request errors** (empty keyword, missing root) are reported to the caller
///    before a scan starts:
///    ```rust,ignore
///    request.validate()?;
///    let handle = Scanner::new(request).start()?;
///    ```
///
/// 2. **Per-file errors** (unreadable file, permission denied) are produced by the file
///    processor but never leave the worker. The file counts as scanned with zero matches:
///    ```rust,ignore
///    match processor.read_file(path) {
///        Ok(content) => scan(content),
///        Err(e) => debug!("Skipping {}: {}", path.display(), e),
///    }
///    ```
///
/// 3. **Cancellation** is not an error at all. It is a terminal state reported through
///    `ScanSummary::cancelled`.
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while preparing or running a scan
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid root directory: {0}")]
    InvalidRoot(PathBuf),
    #[error("Search keyword must not be empty")]
    EmptyKeyword,
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl ScanError {
    pub fn invalid_root(path: impl Into<PathBuf>) -> Self {
        Self::InvalidRoot(path.into())
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn thread_pool(msg: impl Into<String>) -> Self {
        Self::ThreadPool(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Maps an I/O error raised while opening `path` onto the matching variant
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }
}

impl From<config::ConfigError> for ScanError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
