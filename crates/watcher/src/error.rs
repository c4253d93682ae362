use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatcherError>;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("cannot watch {0}: path has no parent directory or file name")]
    InvalidTarget(PathBuf),

    #[error("file watch failed: {0}")]
    Notify(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
