//! Resolved indexing configuration.

use std::path::PathBuf;

use crate::backend::pdftotext::{DEFAULT_OPTIONS, PdftotextBackend};
use crate::budget::HostLimits;
use crate::config_file::ConfigFile;
use crate::eligibility::AllowedExtensions;
use crate::merge::MergePolicy;
use crate::registry::MethodId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MupdfSettings {
    pub decode_memory_limit: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdftotextSettings {
    pub timeout_secs: Option<u64>,
    /// Explicit binary; `None` looks `pdftotext` up on `PATH`.
    pub tool_path: Option<PathBuf>,
    pub options: Vec<String>,
}

impl Default for PdftotextSettings {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            tool_path: None,
            options: DEFAULT_OPTIONS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

impl PdftotextSettings {
    /// Build the external backend these settings describe.
    pub fn backend(&self) -> PdftotextBackend {
        let backend = PdftotextBackend::new().with_options(self.options.iter().cloned());
        match &self.tool_path {
            Some(path) => backend.with_tool_path(path),
            None => backend,
        }
    }
}

/// User-editable indexing settings with defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingConfig {
    pub allowed_extensions: AllowedExtensions,
    pub method: MethodId,
    pub merge_policy: MergePolicy,
    /// Byte ceiling for eligible files; `None` means unconstrained.
    pub max_file_size: Option<u64>,
    pub mupdf: MupdfSettings,
    pub pdftotext: PdftotextSettings,
}

impl IndexingConfig {
    /// Apply defaults to a loaded config file.
    ///
    /// An unknown method identifier falls back to `disabled`.
    pub fn from_file(file: &ConfigFile) -> Self {
        let method = match file.indexing_method.as_deref() {
            Some(raw) => raw.parse::<MethodId>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to 'disabled'");
                MethodId::Disabled
            }),
            None => MethodId::Disabled,
        };

        let mupdf = file.mupdf.as_ref();
        let pdftotext = file.pdftotext.as_ref();

        Self {
            allowed_extensions: file
                .file_extensions
                .as_deref()
                .map(AllowedExtensions::parse)
                .unwrap_or_default(),
            method,
            merge_policy: file.discard_builtin_index.unwrap_or_default(),
            max_file_size: file.max_file_size.filter(|size| *size > 0),
            mupdf: MupdfSettings {
                decode_memory_limit: mupdf.and_then(|m| m.decode_memory_limit),
                timeout_secs: mupdf.and_then(|m| m.timeout_secs),
            },
            pdftotext: PdftotextSettings {
                timeout_secs: pdftotext.and_then(|p| p.timeout_secs),
                tool_path: pdftotext.and_then(|p| p.path.as_ref()).map(PathBuf::from),
                options: pdftotext
                    .and_then(|p| p.options.clone())
                    .unwrap_or_else(|| PdftotextSettings::default().options),
            },
        }
    }

    /// Configured `(timeout_secs, memory_limit_bytes)` for a method.
    pub fn configured_limits(&self, method: MethodId) -> (Option<u64>, Option<u64>) {
        match method {
            MethodId::Disabled => (None, None),
            MethodId::Mupdf => (self.mupdf.timeout_secs, self.mupdf.decode_memory_limit),
            // External tools are bounded by the operating environment, not by
            // a decode ceiling.
            MethodId::Pdftotext => (self.pdftotext.timeout_secs, None),
        }
    }
}

/// Host limits declared in the `[host]` section.
pub fn host_limits(file: &ConfigFile) -> HostLimits {
    let host = file.host.as_ref();
    HostLimits::new(
        host.and_then(|h| h.max_execution_time),
        host.and_then(|h| h.memory_limit.as_deref()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::{HostConfig, MupdfConfig, PdftotextConfig};

    #[test]
    fn defaults_match_documented_values() {
        let config = IndexingConfig::from_file(&ConfigFile::default());
        assert_eq!(config.method, MethodId::Disabled);
        assert_eq!(config.merge_policy, MergePolicy::Append);
        assert!(config.allowed_extensions.contains("pdf"));
        assert_eq!(config.max_file_size, None);
        assert_eq!(config.pdftotext.options, vec!["nopgbrk".to_string()]);
        assert_eq!(config, IndexingConfig::default());
    }

    #[test]
    fn unknown_method_falls_back_to_disabled() {
        let file = ConfigFile {
            indexing_method: Some("smalot-pdfparser".into()),
            ..Default::default()
        };
        assert_eq!(IndexingConfig::from_file(&file).method, MethodId::Disabled);
    }

    #[test]
    fn zero_file_size_means_unconstrained() {
        let file = ConfigFile {
            max_file_size: Some(0),
            ..Default::default()
        };
        assert_eq!(IndexingConfig::from_file(&file).max_file_size, None);
    }

    #[test]
    fn per_backend_limits() {
        let file = ConfigFile {
            indexing_method: Some("mupdf".into()),
            mupdf: Some(MupdfConfig {
                decode_memory_limit: Some(5_242_880),
                timeout_secs: Some(15),
            }),
            pdftotext: Some(PdftotextConfig {
                timeout_secs: Some(20),
                path: Some("/opt/poppler/bin/pdftotext".into()),
                options: None,
            }),
            ..Default::default()
        };
        let config = IndexingConfig::from_file(&file);
        assert_eq!(config.method, MethodId::Mupdf);
        assert_eq!(
            config.configured_limits(MethodId::Mupdf),
            (Some(15), Some(5_242_880))
        );
        assert_eq!(
            config.configured_limits(MethodId::Pdftotext),
            (Some(20), None)
        );
        assert_eq!(config.configured_limits(MethodId::Disabled), (None, None));
        assert_eq!(
            config.pdftotext.tool_path,
            Some(PathBuf::from("/opt/poppler/bin/pdftotext"))
        );
    }

    #[test]
    fn host_section_is_normalised() {
        let file = ConfigFile {
            host: Some(HostConfig {
                max_execution_time: Some(0),
                memory_limit: Some("256M".into()),
            }),
            ..Default::default()
        };
        let host = host_limits(&file);
        assert_eq!(host.max_execution_secs, None);
        assert_eq!(host.memory_limit_bytes, Some(268_435_456));
        assert!(host_limits(&ConfigFile::default()).is_unconstrained());
    }
}
