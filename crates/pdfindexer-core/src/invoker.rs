//! Runs a selected backend within a resource budget.
//!
//! Every failure is absorbed here and turned into an
//! [`ExtractionResult::Failure`]; nothing propagates to the caller. Each call
//! is independent: budgets and deadlines apply per call.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{DecodeLimits, ExternalBackend, PdfBackend};
use crate::budget::ResourceBudget;
use crate::registry::{Backend, MethodId, Registry};
use crate::{ExtractionResult, FailureReason, FileRef};

/// How long a cancelled in-process worker gets to observe cancellation.
pub const CANCEL_GRACE: Duration = Duration::from_millis(500);

/// Extract text from `file` with the backend registered for `method`.
///
/// Unknown or disabled methods yield `Failure(BackendUnavailable)` without
/// attempting any work. Failures are logged once; success is silent.
pub async fn extract(
    registry: &Registry,
    method: MethodId,
    file: &FileRef,
    budget: &ResourceBudget,
) -> ExtractionResult {
    let Some(backend) = registry.backend(method) else {
        return ExtractionResult::Failure(FailureReason::BackendUnavailable);
    };

    let result = match backend {
        Backend::InProcess(backend) => run_in_process(Arc::clone(backend), file, budget).await,
        Backend::External(backend) => run_external(backend.as_ref(), file, budget).await,
    };

    match result {
        Ok(text) => ExtractionResult::Text(text),
        Err(Failed { reason, straggler }) => {
            tracing::error!(
                path = %file.path.display(),
                method = %method,
                backend = backend.name(),
                reason = %reason,
                straggler,
                "PDF text extraction failed for file at {}: {}",
                file.path.display(),
                reason
            );
            ExtractionResult::Failure(reason)
        }
    }
}

/// A failed attempt, before it is logged.
#[derive(Debug, PartialEq)]
struct Failed {
    reason: FailureReason,
    /// The worker was still running when the cancellation grace period ran out.
    straggler: bool,
}

impl From<FailureReason> for Failed {
    fn from(reason: FailureReason) -> Self {
        Self {
            reason,
            straggler: false,
        }
    }
}

async fn run_in_process(
    backend: Arc<dyn PdfBackend>,
    file: &FileRef,
    budget: &ResourceBudget,
) -> Result<String, Failed> {
    let limits = DecodeLimits::new(budget.max_memory_bytes);
    let cancel = limits.cancel.clone();
    let path = file.path.clone();

    let mut handle = tokio::task::spawn_blocking(move || {
        let result = catch_unwind(AssertUnwindSafe(|| backend.extract_text(&path, &limits)));
        // Runs whether extraction succeeded, failed or panicked.
        backend.release_retained();
        result
    });

    let joined = match budget.timeout() {
        Some(deadline) => match tokio::time::timeout(deadline, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                let straggler = tokio::time::timeout(CANCEL_GRACE, &mut handle)
                    .await
                    .is_err();
                return Err(Failed {
                    reason: FailureReason::Timeout,
                    straggler,
                });
            }
        },
        None => handle.await,
    };

    let reason = match joined {
        Ok(Ok(Ok(text))) => return Ok(text),
        Ok(Ok(Err(err))) => err.reason(),
        Ok(Err(panic)) => FailureReason::BackendError(panic_message(panic.as_ref())),
        Err(join_err) => FailureReason::BackendError(join_err.to_string()),
    };
    Err(reason.into())
}

async fn run_external(
    backend: &dyn ExternalBackend,
    file: &FileRef,
    budget: &ResourceBudget,
) -> Result<String, Failed> {
    let Some(deadline) = budget.timeout() else {
        return backend
            .extract_text(&file.path, Duration::MAX)
            .await
            .map_err(|e| Failed::from(e.reason()));
    };

    // Dropping the backend future kills its child process.
    match tokio::time::timeout(deadline, backend.extract_text(&file.path, deadline)).await {
        Ok(result) => result.map_err(|e| Failed::from(e.reason())),
        Err(_) => Err(FailureReason::Timeout.into()),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("backend panicked: {}", detail)
}
