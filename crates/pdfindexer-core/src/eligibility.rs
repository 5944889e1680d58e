//! File eligibility: extension allow-list and size ceiling.

use std::collections::BTreeSet;

use crate::FileRef;

/// Extensions accepted for extraction, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedExtensions(BTreeSet<String>);

impl AllowedExtensions {
    /// Parse a space-separated list (`"pdf PDF doc"`). Order and duplicates
    /// are irrelevant; a leading dot is tolerated.
    pub fn parse(list: &str) -> Self {
        Self(
            list.split_whitespace()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.0.contains(&extension.trim_start_matches('.').to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for AllowedExtensions {
    fn default() -> Self {
        Self::parse("pdf")
    }
}

/// Whether `file` qualifies for extraction.
///
/// A `max_size_bytes` of `None` or `0` means no size ceiling; a file exactly
/// at the ceiling is still eligible.
pub fn is_eligible(file: &FileRef, allowed: &AllowedExtensions, max_size_bytes: Option<u64>) -> bool {
    if !allowed.contains(&file.extension) {
        return false;
    }
    match max_size_bytes {
        Some(ceiling) if ceiling > 0 => file.size <= ceiling,
        _ => true,
    }
}
