//! Poppler `pdftotext` wrapper.
//!
//! Runs `pdftotext [options...] <file> -` and reads the text from stdout.
//! The child is spawned with `kill_on_drop`, so abandoning the future (on
//! timeout or when the invoker's own deadline fires) terminates the process.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::{BackendError, ExternalBackend};

/// Binary looked up on `PATH` when no explicit tool path is configured.
pub const DEFAULT_BINARY: &str = "pdftotext";

/// Options passed when none are configured.
pub const DEFAULT_OPTIONS: &[&str] = &["nopgbrk"];

pub struct PdftotextBackend {
    tool_path: Option<PathBuf>,
    options: Vec<String>,
}

impl Default for PdftotextBackend {
    fn default() -> Self {
        Self {
            tool_path: None,
            options: DEFAULT_OPTIONS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

impl PdftotextBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit binary instead of looking `pdftotext` up on `PATH`.
    pub fn with_tool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_path = Some(path.into());
        self
    }

    /// Replace the command-line options.
    ///
    /// Each entry is a flag with an optional value (`"enc UTF-8"`); the
    /// leading `-` may be omitted.
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// The binary that would be executed, if it can be found.
    pub fn resolve_binary(&self) -> Option<PathBuf> {
        match &self.tool_path {
            Some(path) if path.is_file() => Some(path.clone()),
            Some(_) => None,
            None => which::which(DEFAULT_BINARY).ok(),
        }
    }

    /// Command-line arguments for extracting `path` to stdout.
    pub fn args(&self, path: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(self.options.len() + 2);
        for option in self.options.iter().map(|o| o.trim()).filter(|o| !o.is_empty()) {
            // "enc UTF-8" is a flag followed by its value
            let (flag, value) = match option.split_once(char::is_whitespace) {
                Some((flag, value)) => (flag, Some(value.trim())),
                None => (option, None),
            };
            args.push(format!("-{}", flag.trim_start_matches('-')));
            if let Some(value) = value {
                args.push(value.to_string());
            }
        }
        args.push(path.to_string_lossy().into_owned());
        args.push("-".to_string());
        args
    }
}

impl ExternalBackend for PdftotextBackend {
    fn name(&self) -> &str {
        "pdftotext"
    }

    fn probe(&self) -> bool {
        self.resolve_binary().is_some()
    }

    fn extract_text<'a>(
        &'a self,
        path: &'a Path,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, BackendError>> + Send + 'a>> {
        Box::pin(async move {
            let binary = self.resolve_binary().ok_or_else(|| {
                BackendError::Unavailable(format!("{} binary not found", DEFAULT_BINARY))
            })?;

            let child = Command::new(&binary)
                .args(self.args(path))
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()?;

            // On timeout the wait future is dropped together with the child,
            // which kills it.
            let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => return Err(BackendError::Timeout(timeout)),
            };

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim();
                return Err(match output.status.code() {
                    // pdftotext: 1 = error opening a PDF file
                    Some(1) => BackendError::OpenError(stderr.to_string()),
                    code => BackendError::ExtractionError(format!(
                        "{} exited with code {:?}: {}",
                        DEFAULT_BINARY, code, stderr
                    )),
                });
            }

            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
    }
}
