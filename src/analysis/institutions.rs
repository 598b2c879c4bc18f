//! Institution and country rollups from free-text affiliation names.
//!
//! Affiliation strings are uncontrolled text, so deduplication works on a
//! normalized key (lower-case, non-alphanumeric stripped, whitespace
//! collapsed) while the first-seen original casing stays as the display
//! name. Country extraction is a comma-split heuristic over the last part.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::Record;

use super::CountedLabels;

#[allow(clippy::expect_used)]
static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9 ]+").expect("non-word regex is valid") // Static pattern, safe to panic
});

/// How many institutions and countries the breakdown reports.
const TOP_N: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct InstitutionCount {
    pub institution: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryCount {
    pub country: String,
    pub count: u64,
}

/// Top institutions and country rollups for one record set.
#[derive(Debug, Clone, Serialize)]
pub struct InstitutionBreakdown {
    pub top_institutions: Vec<InstitutionCount>,
    pub country_rollups: Vec<CountryCount>,
}

/// Normalized dedup key for an affiliation name.
fn normalize_institution(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = NON_WORD_RE.replace_all(&lowered, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Country candidate: the last comma-separated part, accepted when it is a
/// 2-3 character token or contains at most 3 words.
fn extract_country(affiliation: &str) -> Option<&str> {
    let parts: Vec<&str> = affiliation
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 2 {
        return None;
    }
    let last = parts[parts.len() - 1];
    if matches!(last.len(), 2 | 3) || last.split_whitespace().count() <= 3 {
        Some(last)
    } else {
        None
    }
}

/// Counts affiliations per normalized institution key and per extracted
/// country, reporting the top 20 of each.
#[must_use]
pub fn institutions_breakdown(records: &[Record]) -> InstitutionBreakdown {
    let mut institutions = CountedLabels::default();
    let mut canonical: HashMap<String, String> = HashMap::new();
    let mut countries = CountedLabels::default();

    for record in records {
        for author in &record.authors {
            for affiliation in &author.affiliation {
                let Some(name) = affiliation.name.as_deref() else {
                    continue;
                };
                let key = normalize_institution(name);
                if key.is_empty() {
                    continue;
                }
                canonical
                    .entry(key.clone())
                    .or_insert_with(|| name.trim().to_string());
                institutions.add(&key);
                if let Some(country) = extract_country(name) {
                    countries.add(country);
                }
            }
        }
    }

    let top_institutions = institutions
        .top(TOP_N)
        .into_iter()
        .map(|(key, count)| InstitutionCount {
            institution: canonical.get(&key).cloned().unwrap_or(key),
            count,
        })
        .collect();
    let country_rollups = countries
        .top(TOP_N)
        .into_iter()
        .map(|(country, count)| CountryCount { country, count })
        .collect();

    InstitutionBreakdown {
        top_institutions,
        country_rollups,
    }
}
