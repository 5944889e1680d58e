//! Resource budget resolution.
//!
//! Host limits are read once at startup and intersected with the configured
//! per-backend values. Nothing here fails: absent or invalid inputs degrade to
//! "unconstrained".

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

/// Timeout applied when neither the host nor the configuration provide one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

static MEMORY_LIMIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([gmk])?$").unwrap());

/// Parse a host memory-limit string (`"128M"`, `"1g"`, `"512k"`, `"1048576"`).
///
/// Suffixes are binary units and case-insensitive; a bare number is bytes.
/// Non-positive or unparseable values mean no limit is known.
pub fn parse_memory_limit(value: &str) -> Option<u64> {
    let value = value.trim().to_lowercase();
    let caps = MEMORY_LIMIT_RE.captures(&value)?;
    let amount: u64 = caps[1].parse().ok()?;
    let multiplier: u64 = match caps.get(2).map(|m| m.as_str()) {
        Some("g") => 1024 * 1024 * 1024,
        Some("m") => 1024 * 1024,
        Some("k") => 1024,
        _ => 1,
    };
    amount.checked_mul(multiplier).filter(|bytes| *bytes > 0)
}

/// Limits imposed by the environment the indexer runs in.
///
/// `None` means the ceiling is unknown, and the budget is then governed by
/// configuration alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostLimits {
    pub max_execution_secs: Option<u64>,
    pub memory_limit_bytes: Option<u64>,
}

impl HostLimits {
    /// Normalise raw host values: zero, negative and unparseable inputs
    /// become "unknown".
    pub fn new(max_execution_time: Option<i64>, memory_limit: Option<&str>) -> Self {
        Self {
            max_execution_secs: max_execution_time
                .filter(|secs| *secs > 0)
                .map(|secs| secs as u64),
            memory_limit_bytes: memory_limit.and_then(parse_memory_limit),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.max_execution_secs.is_none() && self.memory_limit_bytes.is_none()
    }
}

/// Effective time and memory ceilings for a single extraction attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceBudget {
    pub max_execution_seconds: Option<u64>,
    pub max_memory_bytes: Option<u64>,
    /// The host ceilings this budget was resolved against.
    pub host: HostLimits,
}

impl ResourceBudget {
    pub fn timeout(&self) -> Option<Duration> {
        self.max_execution_seconds.map(Duration::from_secs)
    }

    /// Human-readable notes on how host limits cap the configured values.
    pub fn notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if let Some(bytes) = self.host.memory_limit_bytes {
            notes.push(format!(
                "Current host memory limit is {} bytes = {} MiB. The decode memory limit cannot be higher than the host memory limit.",
                bytes,
                bytes / 1024 / 1024
            ));
        }
        if let Some(secs) = self.host.max_execution_secs {
            notes.push(format!(
                "Current host max execution time is {} seconds. The extraction timeout cannot be higher than the host max execution time.",
                secs
            ));
        }
        notes
    }
}

/// Resolve the effective budget from host ceilings and configured values.
///
/// - timeout: `min(configured or 60, host)` when the host ceiling is known,
///   otherwise `configured or 60`
/// - memory: `min(configured, host)` when both are known, the host ceiling
///   when only it is known, the configured value (or unset) otherwise
///
/// Zero configured values count as "not configured".
pub fn resolve(
    host_time_limit_secs: Option<i64>,
    host_memory_limit_bytes: Option<u64>,
    configured_timeout_secs: Option<u64>,
    configured_memory_limit_bytes: Option<u64>,
) -> ResourceBudget {
    let host = HostLimits {
        max_execution_secs: host_time_limit_secs
            .filter(|secs| *secs > 0)
            .map(|secs| secs as u64),
        memory_limit_bytes: host_memory_limit_bytes.filter(|bytes| *bytes > 0),
    };

    let configured_timeout = configured_timeout_secs
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let max_execution_seconds = match host.max_execution_secs {
        Some(ceiling) => configured_timeout.min(ceiling),
        None => configured_timeout,
    };

    let configured_memory = configured_memory_limit_bytes.filter(|bytes| *bytes > 0);
    let max_memory_bytes = match (configured_memory, host.memory_limit_bytes) {
        (Some(configured), Some(ceiling)) => Some(configured.min(ceiling)),
        (None, Some(ceiling)) => Some(ceiling),
        (configured, None) => configured,
    };

    ResourceBudget {
        max_execution_seconds: Some(max_execution_seconds),
        max_memory_bytes,
        host,
    }
}

/// [`resolve`] against already-normalised [`HostLimits`].
pub fn resolve_with_host(
    host: &HostLimits,
    configured_timeout_secs: Option<u64>,
    configured_memory_limit_bytes: Option<u64>,
) -> ResourceBudget {
    resolve(
        host.max_execution_secs.map(|secs| secs as i64),
        host.memory_limit_bytes,
        configured_timeout_secs,
        configured_memory_limit_bytes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_memory_limit_strings() {
        assert_eq!(parse_memory_limit("1048576"), Some(1_048_576));
        assert_eq!(parse_memory_limit("1m"), Some(1_048_576));
        assert_eq!(parse_memory_limit("5m"), Some(5_242_880));
        assert_eq!(parse_memory_limit("1g"), Some(1_073_741_824));
        assert_eq!(parse_memory_limit("512k"), Some(524_288));
    }

    #[test]
    fn memory_limit_suffix_is_case_insensitive() {
        assert_eq!(parse_memory_limit("128M"), Some(134_217_728));
        assert_eq!(parse_memory_limit(" 2G "), Some(2_147_483_648));
        assert_eq!(parse_memory_limit("64K"), Some(65_536));
    }

    #[test]
    fn unusable_memory_limits_are_unknown() {
        assert_eq!(parse_memory_limit("0"), None);
        assert_eq!(parse_memory_limit(""), None);
        assert_eq!(parse_memory_limit("-1"), None);
        assert_eq!(parse_memory_limit("0m"), None);
        assert_eq!(parse_memory_limit("lots"), None);
        assert_eq!(parse_memory_limit("12x"), None);
        assert_eq!(parse_memory_limit("99999999999999999999g"), None);
    }

    #[test]
    fn timeout_capped_by_host() {
        for host in [1i64, 30, 60, 120] {
            for configured in [None, Some(10u64), Some(90)] {
                let budget = resolve(Some(host), None, configured, None);
                let expected = configured.unwrap_or(DEFAULT_TIMEOUT_SECS).min(host as u64);
                assert_eq!(budget.max_execution_seconds, Some(expected));
            }
        }
    }

    #[test]
    fn timeout_without_host_ceiling() {
        assert_eq!(resolve(None, None, None, None).max_execution_seconds, Some(60));
        assert_eq!(resolve(Some(0), None, Some(90), None).max_execution_seconds, Some(90));
        assert_eq!(resolve(Some(-1), None, Some(5), None).max_execution_seconds, Some(5));
        assert_eq!(resolve(None, None, Some(0), None).max_execution_seconds, Some(60));
    }

    #[test]
    fn memory_capped_by_host() {
        let budget = resolve(None, Some(1024), None, Some(4096));
        assert_eq!(budget.max_memory_bytes, Some(1024));

        let budget = resolve(None, Some(4096), None, Some(1024));
        assert_eq!(budget.max_memory_bytes, Some(1024));
    }

    #[test]
    fn host_memory_becomes_ceiling_when_unconfigured() {
        let budget = resolve(None, Some(4096), None, None);
        assert_eq!(budget.max_memory_bytes, Some(4096));
    }

    #[test]
    fn memory_unset_without_host_or_config() {
        assert_eq!(resolve(None, None, None, None).max_memory_bytes, None);
        assert_eq!(resolve(None, Some(0), None, Some(0)).max_memory_bytes, None);
        assert_eq!(resolve(None, None, None, Some(2048)).max_memory_bytes, Some(2048));
    }

    #[test]
    fn host_limits_normalise_raw_values() {
        let host = HostLimits::new(Some(0), Some("-1"));
        assert!(host.is_unconstrained());

        let host = HostLimits::new(Some(30), Some("128M"));
        assert_eq!(host.max_execution_secs, Some(30));
        assert_eq!(host.memory_limit_bytes, Some(134_217_728));

        let budget = resolve_with_host(&host, Some(60), Some(1 << 30));
        assert_eq!(budget.max_execution_seconds, Some(30));
        assert_eq!(budget.max_memory_bytes, Some(134_217_728));
        assert_eq!(budget.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn notes_mention_known_host_limits() {
        let budget = resolve(Some(30), Some(128 * 1024 * 1024), None, None);
        let notes = budget.notes();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("134217728 bytes = 128 MiB"));
        assert!(notes[1].contains("30 seconds"));

        assert!(resolve(None, None, None, None).notes().is_empty());
    }
}
