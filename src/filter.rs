//! Post-retrieval filtering.
//!
//! The upstream filter vocabulary accepts at most one value per dimension and
//! has no publisher clause at all, so the full multi-value hint sets are
//! applied here, after retrieval. Dimensions combine with logical AND; values
//! within a dimension with logical OR. Input order is preserved.

use crate::models::Record;

/// The full multi-value filter hint sets for one request.
#[derive(Debug, Clone, Default)]
pub struct FilterHints {
    /// Case-insensitive exact match against the record's document type.
    pub doc_types: Vec<String>,
    /// Case-insensitive substring match against the record's publisher.
    pub publishers: Vec<String>,
    /// The record's DOI must start with the prefix, or `prefix + "/"`.
    pub doi_prefixes: Vec<String>,
    /// Substring match within the space-joined container-title list.
    pub container_titles: Vec<String>,
}

impl FilterHints {
    fn matches(&self, record: &Record) -> bool {
        let doc_types: Vec<String> = lowered(&self.doc_types);
        if !doc_types.is_empty() {
            let doc_type = record.doc_type.as_deref().unwrap_or("").to_lowercase();
            if !doc_types.contains(&doc_type) {
                return false;
            }
        }

        if !self.publishers.is_empty() {
            let publisher = record
                .publisher
                .as_deref()
                .unwrap_or("")
                .to_lowercase();
            if !self
                .publishers
                .iter()
                .any(|name| publisher.contains(&name.to_lowercase()))
            {
                return false;
            }
        }

        if !self.doi_prefixes.is_empty() {
            let doi = record.doi.as_deref().unwrap_or("").to_lowercase();
            let matched = lowered(&self.doi_prefixes).iter().any(|prefix| {
                doi.starts_with(&format!("{prefix}/")) || doi.starts_with(prefix.as_str())
            });
            if !matched {
                return false;
            }
        }

        if !self.container_titles.is_empty() {
            let container = record.container_title.join(" ").to_lowercase();
            if !lowered(&self.container_titles)
                .iter()
                .any(|term| container.contains(term.as_str()))
            {
                return false;
            }
        }

        true
    }
}

fn lowered(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Returns the subsequence of `records` satisfying every non-empty hint
/// dimension, preserving input order.
#[must_use]
pub fn post_filter(records: Vec<Record>, hints: &FilterHints) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| hints.matches(record))
        .collect()
}
