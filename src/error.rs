//! Error types for planning, fetching, scratch storage and merging.
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

/// Terminal error of a download session.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid fetch plan: {0}")]
    InvalidPlan(String),

    #[error("fragment {index}: {source}")]
    Transfer {
        index: usize,
        #[source]
        source: TransferError,
    },

    #[error("scratch i/o failed for {}: {source}", path.display())]
    ScratchIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("download cancelled")]
    Cancelled,

    #[error("worker pool stopped before every fragment reported")]
    PoolExhausted,
}

impl FetchError {
    pub(crate) fn transfer(index: usize, source: impl Into<TransferError>) -> Self {
        Self::Transfer {
            index,
            source: source.into(),
        }
    }

    pub(crate) fn scratch(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ScratchIo {
            path: path.into(),
            source,
        }
    }

    /// Index of the fragment that caused this error, if any.
    pub fn fragment_index(&self) -> Option<usize> {
        match self {
            FetchError::Transfer { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Network-side failure while fetching or probing one fragment.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("no Content-Length in response from {url}")]
    MissingContentLength { url: String },

    #[error("unparsable Content-Length in response from {url}")]
    InvalidContentLength { url: String },

    #[error("expected {expected} bytes, received {received}")]
    UnexpectedLength { expected: u64, received: u64 },
}

/// Failure while assembling the final artifact.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("merge i/o failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("merged {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
}
