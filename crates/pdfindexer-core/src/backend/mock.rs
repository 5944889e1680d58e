//! Mock extraction backend for testing.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::{BackendError, DecodeLimits, ExternalBackend, PdfBackend};

/// A configurable mock response for [`MockBackend`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return this text.
    Text(String),
    /// Fail to open the file.
    Unreadable(String),
    /// Report that decoded content outgrew the limit.
    MemoryExceeded,
    /// Generic backend failure.
    Error(String),
    /// Panic inside the backend.
    Panic(String),
}

/// A hand-rolled mock implementing both [`PdfBackend`] and [`ExternalBackend`].
///
/// Supports:
/// - A fixed response, **or** a sequence of responses (last one repeated).
/// - Optional per-call latency. In-process calls sleep in short slices and
///   honour cancellation; external calls sleep on the tokio timer.
/// - A configurable probe result.
/// - Counters for calls and [`release_retained`](PdfBackend::release_retained).
pub struct MockBackend {
    name: &'static str,
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    delay: Option<Duration>,
    available: bool,
    call_count: AtomicUsize,
    release_count: AtomicUsize,
    running: AtomicBool,
    last_memory_limit: Mutex<Option<u64>>,
}

impl MockBackend {
    /// Create a mock that always returns `response`.
    pub fn new(name: &'static str, response: MockResponse) -> Self {
        Self {
            name,
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            available: true,
            call_count: AtomicUsize::new(0),
            release_count: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            last_memory_limit: Mutex::new(None),
        }
    }

    /// Create a mock that always returns `text`.
    pub fn text(name: &'static str, text: &str) -> Self {
        Self::new(name, MockResponse::Text(text.to_string()))
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(name: &'static str, mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        responses.reverse();
        let fallback = responses.first().cloned().unwrap();
        let mut mock = Self::new(name, fallback);
        mock.responses = Mutex::new(responses);
        mock
    }

    /// Set simulated extraction latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make [`probe`](PdfBackend::probe) report the backend as missing.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// How many times `extract_text()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// How many times `release_retained()` has been called.
    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }

    /// Whether an extraction is currently in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Memory ceiling passed on the most recent in-process call.
    pub fn last_memory_limit(&self) -> Option<u64> {
        *self.last_memory_limit.lock().unwrap()
    }

    fn next_response(&self) -> MockResponse {
        let mut seq = self.responses.lock().unwrap();
        if let Some(resp) = seq.pop() {
            resp
        } else {
            self.fallback.clone()
        }
    }

    fn respond(response: MockResponse) -> Result<String, BackendError> {
        match response {
            MockResponse::Text(text) => Ok(text),
            MockResponse::Unreadable(msg) => Err(BackendError::OpenError(msg)),
            MockResponse::MemoryExceeded => Err(BackendError::MemoryExceeded { limit: 0 }),
            MockResponse::Error(msg) => Err(BackendError::ExtractionError(msg)),
            MockResponse::Panic(msg) => panic!("{}", msg),
        }
    }
}

/// Clears the running flag even when the call panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PdfBackend for MockBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn probe(&self) -> bool {
        self.available
    }

    fn extract_text(&self, _path: &Path, limits: &DecodeLimits) -> Result<String, BackendError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *self.last_memory_limit.lock().unwrap() = limits.memory_limit_bytes;
        self.running.store(true, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        if let Some(delay) = self.delay {
            let start = Instant::now();
            while start.elapsed() < delay {
                limits.check_cancelled()?;
                std::thread::sleep(Duration::from_millis(10));
            }
        }
        Self::respond(self.next_response())
    }

    fn release_retained(&self) {
        self.release_count.fetch_add(1, Ordering::SeqCst);
    }
}

impl ExternalBackend for MockBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn probe(&self) -> bool {
        self.available
    }

    fn extract_text<'a>(
        &'a self,
        _path: &'a Path,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, BackendError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            self.running.store(true, Ordering::SeqCst);
            let _guard = RunningGuard(&self.running);
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            Self::respond(response)
        })
    }
}
