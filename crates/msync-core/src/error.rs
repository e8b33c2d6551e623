//! Sync error types
//!
//! Error definitions classified into the reconciliation taxonomy: transient
//! I/O failures, revision conflicts, permanent validation failures and other
//! permanent failures. "Not found" is never an error; see [`crate::traits::Lookup`].

use thiserror::Error;

use crate::ids::{MirrorId, SourceId};

/// Classification of a [`SyncError`] used to decide what happens next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network failure or timeout. Retried on the next scheduled cycle.
    TransientIo,
    /// Stale revision token. Abandoned for this cycle, retried with fresh state.
    ConcurrencyConflict,
    /// Malformed record. Skipped until the record itself changes.
    PermanentValidation,
    /// Anything retrying cannot fix (rejected credentials, refused request).
    Permanent,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransientIo => write!(f, "transient_io"),
            Self::ConcurrencyConflict => write!(f, "concurrency_conflict"),
            Self::PermanentValidation => write!(f, "permanent_validation"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// Error that can occur while reconciling records.
#[derive(Debug, Error)]
pub enum SyncError {
    // Transient errors
    /// The remote system could not be reached or answered with a retryable failure.
    #[error("{operation} failed: {message}")]
    Transient {
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A remote call exceeded its time bound.
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    // Concurrency errors
    /// The source system rejected a write because the revision token was stale.
    #[error("revision conflict writing source record {source_id}")]
    ConcurrencyConflict { source_id: SourceId },

    // Validation errors (permanent until the record changes)
    /// A record is malformed, e.g. it carries no date.
    #[error("invalid record {record}: {message}")]
    Validation { record: String, message: String },

    /// A source id cannot be expressed under the current id scheme.
    #[error("cannot derive mirror id for source record {source_id}: {message}")]
    IdDerivation { source_id: SourceId, message: String },

    // Permanent errors
    /// The remote system rejected the request for a reason retrying will not fix.
    #[error("{operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    /// The mirror system refused to create a record under a derived id.
    #[error("mirror record {mirror_id} could not be created: {message}")]
    CreateRefused { mirror_id: MirrorId, message: String },
}

impl SyncError {
    /// Create a transient error without an underlying cause.
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a transient error wrapping its cause.
    pub fn transient_with_source(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create a revision conflict error.
    pub fn conflict(source_id: SourceId) -> Self {
        Self::ConcurrencyConflict { source_id }
    }

    /// Create a validation error.
    pub fn validation(record: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            record: record.into(),
            message: message.into(),
        }
    }

    /// Create a rejected-request error.
    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Transient { .. } | SyncError::Timeout { .. } => ErrorKind::TransientIo,
            SyncError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            SyncError::Validation { .. } | SyncError::IdDerivation { .. } => {
                ErrorKind::PermanentValidation
            }
            SyncError::Rejected { .. } | SyncError::CreateRefused { .. } => ErrorKind::Permanent,
        }
    }

    /// Check if this error is transient and the record should be retried next cycle.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientIo
    }

    /// Check if this error is a stale revision token.
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::ConcurrencyConflict
    }

    /// Get an error code for classification in logs and reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Transient { .. } => "TRANSIENT_IO",
            SyncError::Timeout { .. } => "TIMEOUT",
            SyncError::ConcurrencyConflict { .. } => "REVISION_CONFLICT",
            SyncError::Validation { .. } => "INVALID_RECORD",
            SyncError::IdDerivation { .. } => "ID_DERIVATION_FAILED",
            SyncError::Rejected { .. } => "REJECTED",
            SyncError::CreateRefused { .. } => "CREATE_REFUSED",
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
