use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::merge::MergePolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Space-separated extension allow-list.
    pub file_extensions: Option<String>,
    /// Method identifier; unknown values resolve to `disabled`.
    pub indexing_method: Option<String>,
    pub discard_builtin_index: Option<MergePolicy>,
    /// Maximum file size in bytes; 0 disables the ceiling.
    pub max_file_size: Option<u64>,
    pub host: Option<HostConfig>,
    pub mupdf: Option<MupdfConfig>,
    pub pdftotext: Option<PdftotextConfig>,
}

/// Limits of the environment the indexer runs in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Seconds; zero or negative means unknown.
    pub max_execution_time: Option<i64>,
    /// `g`/`m`/`k` suffixed or bare bytes.
    pub memory_limit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MupdfConfig {
    pub decode_memory_limit: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdftotextConfig {
    pub timeout_secs: Option<u64>,
    pub path: Option<String>,
    pub options: Option<Vec<String>>,
}

/// Platform config directory path: `<config_dir>/pdfindexer/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pdfindexer").join("config.toml"))
}

/// Load config by cascading CWD `.pdfindexer.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".pdfindexer.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    match read_config(path) {
        Ok(config) => Some(config),
        Err(ConfigError::Read { .. }) => None,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Read a config file the user pointed at explicitly; errors are reported.
pub fn read_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        file_extensions: overlay.file_extensions.or(base.file_extensions),
        indexing_method: overlay.indexing_method.or(base.indexing_method),
        discard_builtin_index: overlay
            .discard_builtin_index
            .or(base.discard_builtin_index),
        max_file_size: overlay.max_file_size.or(base.max_file_size),
        host: Some(HostConfig {
            max_execution_time: overlay
                .host
                .as_ref()
                .and_then(|h| h.max_execution_time)
                .or_else(|| base.host.as_ref().and_then(|h| h.max_execution_time)),
            memory_limit: overlay
                .host
                .as_ref()
                .and_then(|h| h.memory_limit.clone())
                .or_else(|| base.host.as_ref().and_then(|h| h.memory_limit.clone())),
        }),
        mupdf: Some(MupdfConfig {
            decode_memory_limit: overlay
                .mupdf
                .as_ref()
                .and_then(|m| m.decode_memory_limit)
                .or_else(|| base.mupdf.as_ref().and_then(|m| m.decode_memory_limit)),
            timeout_secs: overlay
                .mupdf
                .as_ref()
                .and_then(|m| m.timeout_secs)
                .or_else(|| base.mupdf.as_ref().and_then(|m| m.timeout_secs)),
        }),
        pdftotext: Some(PdftotextConfig {
            timeout_secs: overlay
                .pdftotext
                .as_ref()
                .and_then(|p| p.timeout_secs)
                .or_else(|| base.pdftotext.as_ref().and_then(|p| p.timeout_secs)),
            path: overlay
                .pdftotext
                .as_ref()
                .and_then(|p| p.path.clone())
                .or_else(|| base.pdftotext.as_ref().and_then(|p| p.path.clone())),
            options: overlay
                .pdftotext
                .as_ref()
                .and_then(|p| p.options.clone())
                .or_else(|| base.pdftotext.as_ref().and_then(|p| p.options.clone())),
        }),
    }
}
