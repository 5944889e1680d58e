use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ExtractionResult;

/// Separator placed between the builtin value and extracted text.
pub const SEPARATOR: &str = " ... ";

/// How extracted text is combined with the builtin index value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Keep the builtin value and append extracted text.
    #[default]
    #[serde(alias = "no")]
    Append,
    /// Drop the builtin value whenever extraction did not fail, even if it
    /// produced no text.
    #[serde(alias = "yes")]
    DiscardAlways,
    /// Drop the builtin value only if extraction produced non-empty text.
    #[serde(alias = "yes_if")]
    DiscardIfExtracted,
}

impl MergePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::Append => "append",
            MergePolicy::DiscardAlways => "discard_always",
            MergePolicy::DiscardIfExtracted => "discard_if_extracted",
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "append" | "no" => Ok(MergePolicy::Append),
            "discard_always" | "yes" => Ok(MergePolicy::DiscardAlways),
            "discard_if_extracted" | "yes_if" => Ok(MergePolicy::DiscardIfExtracted),
            other => Err(format!("unknown discard policy '{}'", other)),
        }
    }
}

/// Combine the builtin index value with an extraction outcome.
///
/// A failed extraction counts as "no text" under every policy, so the
/// builtin value always survives a failure.
pub fn merge(builtin: &str, outcome: &ExtractionResult, policy: MergePolicy) -> String {
    let extracted = outcome.text();

    match (policy, extracted) {
        (MergePolicy::DiscardAlways, Some(text)) => return text.to_string(),
        (MergePolicy::DiscardIfExtracted, Some(text)) if !text.is_empty() => {
            return text.to_string();
        }
        _ => {}
    }

    [builtin, extracted.unwrap_or("")]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureReason;

    fn text(s: &str) -> ExtractionResult {
        ExtractionResult::Text(s.to_string())
    }

    fn failed() -> ExtractionResult {
        ExtractionResult::Failure(FailureReason::Timeout)
    }

    #[test]
    fn append_joins_both_sides() {
        assert_eq!(merge("A", &text("B"), MergePolicy::Append), "A ... B");
    }

    #[test]
    fn append_omits_empty_sides() {
        assert_eq!(merge("A", &failed(), MergePolicy::Append), "A");
        assert_eq!(merge("A", &text(""), MergePolicy::Append), "A");
        assert_eq!(merge("", &text("B"), MergePolicy::Append), "B");
        assert_eq!(merge("", &failed(), MergePolicy::Append), "");
    }

    #[test]
    fn discard_always_drops_builtin_even_for_empty_text() {
        assert_eq!(merge("A", &text("B"), MergePolicy::DiscardAlways), "B");
        assert_eq!(merge("A", &text(""), MergePolicy::DiscardAlways), "");
    }

    #[test]
    fn discard_always_keeps_builtin_on_failure() {
        assert_eq!(merge("A", &failed(), MergePolicy::DiscardAlways), "A");
        assert_eq!(merge("", &failed(), MergePolicy::DiscardAlways), "");
    }

    #[test]
    fn discard_if_extracted_needs_text() {
        assert_eq!(merge("A", &text("B"), MergePolicy::DiscardIfExtracted), "B");
        assert_eq!(merge("A", &text(""), MergePolicy::DiscardIfExtracted), "A");
        assert_eq!(merge("A", &failed(), MergePolicy::DiscardIfExtracted), "A");
    }

    #[test]
    fn policy_parses_current_and_legacy_names() {
        assert_eq!("append".parse::<MergePolicy>().unwrap(), MergePolicy::Append);
        assert_eq!("no".parse::<MergePolicy>().unwrap(), MergePolicy::Append);
        assert_eq!(
            "discard-always".parse::<MergePolicy>().unwrap(),
            MergePolicy::DiscardAlways
        );
        assert_eq!("yes".parse::<MergePolicy>().unwrap(), MergePolicy::DiscardAlways);
        assert_eq!(
            "yes_if".parse::<MergePolicy>().unwrap(),
            MergePolicy::DiscardIfExtracted
        );
        assert!("sometimes".parse::<MergePolicy>().is_err());
    }

    #[test]
    fn policy_deserializes_legacy_aliases() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: MergePolicy,
        }
        let parsed: Wrapper = toml::from_str("policy = \"yes_if\"").unwrap();
        assert_eq!(parsed.policy, MergePolicy::DiscardIfExtracted);
        let parsed: Wrapper = toml::from_str("policy = \"discard_always\"").unwrap();
        assert_eq!(parsed.policy, MergePolicy::DiscardAlways);
    }
}
