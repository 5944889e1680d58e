//! Per-file indexing entry point.
//!
//! The host indexer calls [`PdfIndexer::on_get_index_value`] once per file
//! with the value it computed itself, and stores whatever is returned.

use crate::budget::{HostLimits, ResourceBudget, resolve_with_host};
use crate::config::IndexingConfig;
use crate::eligibility::is_eligible;
use crate::invoker;
use crate::merge::merge;
use crate::registry::{MethodId, Registry};
use crate::{ExtractionResult, FileRef};

/// Wires eligibility, backend selection, extraction and merging together.
///
/// Method selection and budget are fixed at construction; host limits do not
/// change during a run. The indexer holds no per-file state, so sharing it
/// across concurrent calls is fine.
#[derive(Debug, Clone)]
pub struct PdfIndexer {
    config: IndexingConfig,
    registry: Registry,
    method: MethodId,
    budget: ResourceBudget,
}

impl PdfIndexer {
    pub fn new(config: IndexingConfig, registry: Registry, host: HostLimits) -> Self {
        let method = registry.effective_method(config.method);
        if method != config.method {
            tracing::warn!(
                selected = %config.method,
                "selected indexing method is not available, PDF extraction disabled"
            );
        }
        let (timeout_secs, memory_limit) = config.configured_limits(method);
        let budget = resolve_with_host(&host, timeout_secs, memory_limit);

        Self {
            config,
            registry,
            method,
            budget,
        }
    }

    /// The method actually in use after fallback.
    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Whether extraction will be attempted for any file at all.
    pub fn is_active(&self) -> bool {
        self.method != MethodId::Disabled
    }

    /// Compute the final index value for `file`.
    ///
    /// Returns `builtin` unchanged when extraction is disabled or the file is
    /// not eligible. Extraction failures never surface here; they only cause
    /// the builtin value to be kept.
    pub async fn on_get_index_value(&self, file: &FileRef, builtin: &str) -> String {
        if !self.is_active() {
            return builtin.to_string();
        }
        if !is_eligible(
            file,
            &self.config.allowed_extensions,
            self.config.max_file_size,
        ) {
            return builtin.to_string();
        }

        let outcome: ExtractionResult =
            invoker::extract(&self.registry, self.method, file, &self.budget).await;
        merge(builtin, &outcome, self.config.merge_policy)
    }
}
