use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the library layer of the pipeline
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),

    #[error("malformed dataset {path}: {reason}")]
    MalformedDataset { path: PathBuf, reason: String },

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("unexpected model response: {0}")]
    BadResponse(String),

    #[error("invalid selector {0}")]
    Selector(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type PrepResult<T> = std::result::Result<T, PrepError>;
