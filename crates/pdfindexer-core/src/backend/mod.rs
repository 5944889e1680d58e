//! Backend capability traits for PDF text extraction.

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pdftotext;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::FailureReason;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("decoded content exceeded the memory limit of {limit} bytes")]
    MemoryExceeded { limit: u64 },
    #[error("extraction did not finish within {0:?}")]
    Timeout(Duration),
    #[error("extraction cancelled")]
    Cancelled,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Map onto the failure taxonomy reported to the merge step.
    pub fn reason(&self) -> FailureReason {
        match self {
            BackendError::OpenError(_) => FailureReason::Unreadable,
            BackendError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                FailureReason::Unreadable
            }
            BackendError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                FailureReason::Unreadable
            }
            BackendError::MemoryExceeded { .. } => FailureReason::MemoryExceeded,
            BackendError::Timeout(_) | BackendError::Cancelled => FailureReason::Timeout,
            BackendError::Unavailable(_) => FailureReason::BackendUnavailable,
            other => FailureReason::BackendError(other.to_string()),
        }
    }
}

/// Limits handed to an in-process backend for a single call.
#[derive(Debug, Clone, Default)]
pub struct DecodeLimits {
    /// Ceiling on decoded content held in memory, if any.
    pub memory_limit_bytes: Option<u64>,
    /// Cancelled by the invoker once the time budget runs out. Backends check
    /// it between units of work (pages).
    pub cancel: CancellationToken,
}

impl DecodeLimits {
    pub fn new(memory_limit_bytes: Option<u64>) -> Self {
        Self {
            memory_limit_bytes,
            cancel: CancellationToken::new(),
        }
    }

    /// Return `Err(Cancelled)` once the deadline has passed.
    pub fn check_cancelled(&self) -> Result<(), BackendError> {
        if self.cancel.is_cancelled() {
            Err(BackendError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Return `Err(MemoryExceeded)` if `used` bytes exceed the ceiling.
    pub fn check_memory(&self, used: u64) -> Result<(), BackendError> {
        match self.memory_limit_bytes {
            Some(limit) if used > limit => Err(BackendError::MemoryExceeded { limit }),
            _ => Ok(()),
        }
    }
}

/// An in-process PDF text extraction backend.
///
/// Calls run on a blocking thread; the invoker enforces the time budget by
/// cancelling [`DecodeLimits::cancel`].
pub trait PdfBackend: Send + Sync {
    /// The canonical name of this backend (e.g., "MuPDF").
    fn name(&self) -> &str;

    /// Whether the backend can run in this environment. Must not extract.
    fn probe(&self) -> bool;

    /// Extract the full text content of a PDF file.
    fn extract_text(&self, path: &Path, limits: &DecodeLimits) -> Result<String, BackendError>;

    /// Free buffers kept alive after an extraction. Called after every
    /// in-process call, successful or not.
    fn release_retained(&self) {}
}

/// A backend that shells out to an external command-line tool.
pub trait ExternalBackend: Send + Sync {
    /// The canonical name of this backend (e.g., "pdftotext").
    fn name(&self) -> &str;

    /// Whether the tool is present. Must not extract.
    fn probe(&self) -> bool;

    /// Run the tool on `path` and return its text output.
    ///
    /// Dropping the returned future must terminate the child process.
    fn extract_text<'a>(
        &'a self,
        path: &'a Path,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, BackendError>> + Send + 'a>>;
}
