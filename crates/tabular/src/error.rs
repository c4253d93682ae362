use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReadError>;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("file {path} never stabilized (still growing, empty or missing)")]
    NeverStabilized { path: PathBuf },

    #[error("could not copy {path} after repeated attempts: {source}")]
    CopyExhausted {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported file extension '{0}'")]
    UnsupportedFormat(String),

    #[error("CSV decode error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet decode error: {0}")]
    Sheet(#[from] calamine::Error),

    #[error("file contains no table")]
    EmptySheet,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
