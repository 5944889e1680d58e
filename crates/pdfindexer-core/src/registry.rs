//! Extraction method registry.
//!
//! Backends are probed exactly once, when the registry is built. The result
//! is immutable for the lifetime of the registry; restarting the process
//! re-probes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{ExternalBackend, PdfBackend};

/// Stable identifier of an extraction method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodId {
    /// No extraction; the builtin index value is used unchanged.
    #[default]
    Disabled,
    /// In-process MuPDF parser.
    Mupdf,
    /// Poppler `pdftotext` command-line tool.
    Pdftotext,
}

impl MethodId {
    pub const ALL: [MethodId; 3] = [MethodId::Disabled, MethodId::Mupdf, MethodId::Pdftotext];

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodId::Disabled => "disabled",
            MethodId::Mupdf => "mupdf",
            MethodId::Pdftotext => "pdftotext",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MethodId::Disabled => "Disabled",
            MethodId::Mupdf => "MuPDF",
            MethodId::Pdftotext => "pdftotext (Poppler)",
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        MethodId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown indexing method '{}'", s))
    }
}

/// A registered backend implementation.
#[derive(Clone)]
pub enum Backend {
    InProcess(Arc<dyn PdfBackend>),
    External(Arc<dyn ExternalBackend>),
}

impl Backend {
    pub fn name(&self) -> &str {
        match self {
            Backend::InProcess(b) => b.name(),
            Backend::External(b) => b.name(),
        }
    }

    fn probe(&self) -> bool {
        match self {
            Backend::InProcess(b) => b.probe(),
            Backend::External(b) => b.probe(),
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::InProcess(b) => write!(f, "InProcess({})", b.name()),
            Backend::External(b) => write!(f, "External({})", b.name()),
        }
    }
}

/// Descriptor of an extraction method as listed to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionMethod {
    pub id: MethodId,
    pub label: &'static str,
    /// Result of the capability probe at registry construction.
    pub enabled: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    method: ExtractionMethod,
    backend: Option<Backend>,
}

/// Collects backends before probing them.
#[derive(Default)]
pub struct RegistryBuilder {
    backends: Vec<(MethodId, Backend)>,
}

impl RegistryBuilder {
    /// Register an in-process backend under `id`.
    pub fn in_process(mut self, id: MethodId, backend: Arc<dyn PdfBackend>) -> Self {
        self.backends.push((id, Backend::InProcess(backend)));
        self
    }

    /// Register an external-tool backend under `id`.
    pub fn external(mut self, id: MethodId, backend: Arc<dyn ExternalBackend>) -> Self {
        self.backends.push((id, Backend::External(backend)));
        self
    }

    /// Probe every registered backend once and freeze the result.
    ///
    /// Methods without a registered backend are listed but never enabled.
    /// Registering under [`MethodId::Disabled`] is ignored.
    pub fn build(self) -> Registry {
        let mut entries: Vec<Entry> = MethodId::ALL
            .into_iter()
            .map(|id| Entry {
                method: ExtractionMethod {
                    id,
                    label: id.label(),
                    enabled: id == MethodId::Disabled,
                },
                backend: None,
            })
            .collect();

        for (id, backend) in self.backends {
            if id == MethodId::Disabled {
                tracing::warn!(backend = backend.name(), "ignoring backend registered as 'disabled'");
                continue;
            }
            let enabled = backend.probe();
            tracing::debug!(method = %id, backend = backend.name(), enabled, "probed extraction backend");
            if let Some(entry) = entries.iter_mut().find(|e| e.method.id == id) {
                entry.method.enabled = enabled;
                entry.backend = Some(backend);
            }
        }

        Registry { entries }
    }
}

/// Immutable set of extraction methods and their probe results.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Default for Registry {
    /// A registry with no real backends: only `disabled` is enabled.
    fn default() -> Self {
        RegistryBuilder::default().build()
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// All methods in display order, `disabled` first.
    pub fn list_methods(&self) -> Vec<ExtractionMethod> {
        self.entries.iter().map(|e| e.method.clone()).collect()
    }

    pub fn is_enabled(&self, id: MethodId) -> bool {
        self.entries
            .iter()
            .any(|e| e.method.id == id && e.method.enabled)
    }

    /// Number of enabled real methods (`disabled` is not counted).
    pub fn count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.method.id != MethodId::Disabled && e.method.enabled)
            .count()
    }

    /// The method extraction should actually use for a configured selection.
    ///
    /// Selecting a method whose probe failed silently falls back to
    /// [`MethodId::Disabled`].
    pub fn effective_method(&self, selected: MethodId) -> MethodId {
        if self.is_enabled(selected) {
            selected
        } else {
            tracing::debug!(method = %selected, "selected method not enabled, using 'disabled'");
            MethodId::Disabled
        }
    }

    /// The backend for an enabled method.
    pub fn backend(&self, id: MethodId) -> Option<&Backend> {
        self.entries
            .iter()
            .find(|e| e.method.id == id && e.method.enabled)
            .and_then(|e| e.backend.as_ref())
    }

    /// Hints to show next to the method selector.
    pub fn notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.count() == 0 {
            notes.push(
                "There are currently no extraction backends available. Build with the `mupdf` feature or install the pdftotext CLI tool (Poppler)."
                    .to_string(),
            );
        } else if self.is_enabled(MethodId::Pdftotext) {
            notes.push(
                "Note: the pdftotext method requires the pdftotext CLI tool (Poppler) installed on the operating system."
                    .to_string(),
            );
        }
        notes
    }
}
