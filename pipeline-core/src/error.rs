use thiserror::Error;

use crate::model::FetchResult;

/// Connection-level failure reaching the weather provider.
///
/// Carries the best-known HTTP status: `0` when no response was received at
/// all, the real status when the response arrived but its body was unusable.
#[derive(Debug, Clone, Error)]
#[error("transport failure (status {status_code}): {message}")]
pub struct TransportError {
    pub status_code: u16,
    pub message: String,
}

impl TransportError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self { status_code, message: message.into() }
    }

    /// The fetch result a caller observes alongside this error: empty payload,
    /// best-known status.
    pub fn result(&self) -> FetchResult {
        FetchResult::empty(self.status_code)
    }
}

/// Errors raised by a [`Sink`](crate::sink::Sink) while persisting a payload.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid object key {key}: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: object_store::path::Error,
    },

    #[error("object store rejected {key}: {source}")]
    ObjectStore {
        key: String,
        #[source]
        source: object_store::Error,
    },
}

/// Which half of a location's fetch-then-write sequence failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Write,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Fetch => "fetch",
            Phase::Write => "write",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("fetch for '{location}' failed with status {status_code}: {body}")]
    FetchFailed {
        location: String,
        status_code: u16,
        body: String,
    },

    #[error("write of '{location}' to {destination} failed")]
    WriteFailed {
        location: String,
        destination: String,
        #[source]
        source: SinkError,
    },

    #[error("location '{0}' is already registered")]
    DuplicateLocation(String),

    #[error("unsupported sink type '{0}'. Supported sink types: local, remote-blob.")]
    UnsupportedSinkType(String),

    #[error("location registry error: {0}")]
    Registry(#[from] rusqlite::Error),

    #[error("{failed} of {total} locations failed")]
    RunFailed { failed: usize, total: usize },
}

impl PipelineError {
    /// The phase a per-location failure reached, or `None` for errors that are
    /// not tied to a single location's attempt.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            PipelineError::Transport(_) | PipelineError::FetchFailed { .. } => Some(Phase::Fetch),
            PipelineError::WriteFailed { .. } => Some(Phase::Write),
            _ => None,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_exposes_empty_result() {
        let err = TransportError::new(0, "connection refused");
        let result = err.result();

        assert_eq!(result.status_code, 0);
        assert_eq!(result.payload, serde_json::json!({}));
        assert!(!result.is_success());
    }

    #[test]
    fn phase_distinguishes_fetch_from_write() {
        let fetch = PipelineError::FetchFailed {
            location: "10001".into(),
            status_code: 500,
            body: "{}".into(),
        };
        let write = PipelineError::WriteFailed {
            location: "10001".into(),
            destination: "out/10001/2024-01-01.json".into(),
            source: SinkError::Io {
                path: "out/10001/2024-01-01.json".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            },
        };

        assert_eq!(fetch.phase(), Some(Phase::Fetch));
        assert_eq!(write.phase(), Some(Phase::Write));
        assert_eq!(PipelineError::DuplicateLocation("x".into()).phase(), None);
    }
}
