use std::path::PathBuf;

use thiserror::Error;

/// Top-level error for the batch and CLI flows.
///
/// `Fetch` and `Rejected` are per-roll-number outcomes: the runner logs them
/// and moves on. `Persistence` is fatal to a batch.
#[derive(Debug, Error)]
pub enum Error {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("extraction rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    MalformedQueueEntry(#[from] MalformedQueueEntry),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("could not render record: {0}")]
    Render(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid portal url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("portal answered with HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("portal returned a bot-protection page")]
    Blocked,
}

impl FetchError {
    /// Errors worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FetchError::Status(status) => status.is_server_error(),
            FetchError::InvalidUrl { .. } | FetchError::Blocked => false,
        }
    }
}

/// The page parsed but a required identity field was missing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("required field '{field}' is missing")]
pub struct Rejection {
    pub field: &'static str,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed queue entry '{0}'")]
pub struct MalformedQueueEntry(pub String);

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
