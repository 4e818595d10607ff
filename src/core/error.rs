use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide error type. Remote-fetch and payload problems are recoverable
/// (each poll stage catches them); store problems generally are not.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {code} from {url}")]
    Status { code: u16, url: String },

    #[error("all fetch attempts failed for {0}")]
    Exhausted(String),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("state store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("could not open state store at {path:?}: {source}")]
    StoreOpen {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
