//! Error types for the Turbo client

use std::time::Duration;

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// How the caller should treat a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Definitely failed; retrying the same request will not help
    Fatal,
    /// Transient; the same request may succeed later
    Retryable,
    /// Outcome unknown; check the upload status again later
    Timeout,
}

/// Errors that can occur while signing or uploading
#[derive(Debug, Error)]
pub enum ClientError {
    /// Core library error (keys, signing, validation)
    #[error("Core error: {0}")]
    Core(#[from] turbo_core::CoreError),

    /// Upload service answered with a non-success status
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// Connection, timeout or body transfer failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A retryable operation kept failing
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },

    /// Service reported the chunked upload as failed
    #[error("Chunked upload {upload_id} failed: {reason}")]
    ChunkedUploadFailed { upload_id: String, reason: String },

    /// Service reported the payer cannot cover the upload
    #[error("Chunked upload {upload_id} is underfunded")]
    Underfunded { upload_id: String },

    /// Finalization did not complete in time
    #[error("Chunked upload {upload_id} not finalized after {waited:?}; outcome unknown")]
    FinalizeTimeout { upload_id: String, waited: Duration },

    /// Service response does not fit the chunked upload protocol
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// One file of a folder upload failed
    #[error("Upload of {path} failed: {source}")]
    FolderUpload {
        path: String,
        #[source]
        source: Box<ClientError>,
    },

    /// Background task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ClientError::Transport(err) if err.is_decode() || err.is_builder() => ErrorClass::Fatal,
            ClientError::Transport(_) => ErrorClass::Retryable,
            ClientError::Io(err) if is_transient_io(err.kind()) => ErrorClass::Retryable,
            ClientError::Http { status, .. } if is_retryable_status(*status) => {
                ErrorClass::Retryable
            }
            ClientError::FinalizeTimeout { .. } => ErrorClass::Timeout,
            ClientError::FolderUpload { source, .. } => source.class(),
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClientError::Task(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(format!("invalid URL: {err}"))
    }
}

fn is_transient_io(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        kind,
        ConnectionReset | ConnectionAborted | ConnectionRefused | BrokenPipe | TimedOut | Interrupted
    )
}

/// 408, 429 and every 5xx are worth retrying
pub fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}
