//! Shared data model: catalog records, topic/publisher catalogs, and the
//! request/metadata types exchanged with the routing layer.
//!
//! [`Record`] mirrors the subset of a Crossref work item the analytics care
//! about; unrecognized fields are dropped on deserialization, but the raw page
//! payload is what gets cached, so nothing is lost durably.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==================== Catalog Records ====================

/// One bibliographic metadata document returned by the catalog service.
///
/// Records are immutable once fetched; filtering and matching pass ownership
/// along or borrow read-only views, never mutate in place.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Record {
    /// Ordered title segments; Crossref delivers the primary title first.
    #[serde(default)]
    pub title: Vec<String>,

    /// Markup-bearing abstract (JATS), possibly absent.
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,

    /// Ordered container titles; first element is the primary journal name.
    #[serde(default)]
    pub container_title: Vec<String>,

    pub publisher: Option<String>,

    /// Document type, e.g. `journal-article`.
    #[serde(rename = "type")]
    pub doc_type: Option<String>,

    #[serde(rename = "DOI")]
    pub doi: Option<String>,

    #[serde(default, rename = "author")]
    pub authors: Vec<Author>,

    pub issued: Option<DateField>,
    pub published_online: Option<DateField>,
    pub published_print: Option<DateField>,
    pub created: Option<DateField>,
    pub deposited: Option<DateField>,
    pub accepted: Option<DateField>,
}

impl Record {
    /// Publisher label, with blank or absent values normalized to `"Unknown"`.
    #[must_use]
    pub fn publisher_label(&self) -> &str {
        match self.publisher.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => "Unknown",
        }
    }

    /// Primary journal label, with blank or absent values normalized to `"Unknown"`.
    #[must_use]
    pub fn journal_label(&self) -> &str {
        match self.container_title.first().map(|t| t.trim()) {
            Some(name) if !name.is_empty() => name,
            _ => "Unknown",
        }
    }
}

/// An author entry; only affiliations matter downstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub affiliation: Vec<Affiliation>,
}

/// A free-text affiliation entry attached to an author.
#[derive(Debug, Clone, Deserialize)]
pub struct Affiliation {
    pub name: Option<String>,
}

/// A date namespace from the catalog response: a list of
/// `[year, month?, day?]` integer triples.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DateField {
    pub date_parts: Option<Vec<Vec<Option<i32>>>>,
}

// ==================== Configuration Catalogs ====================

/// A configured research topic: keyword vocabulary used for relevance
/// scoring. Loaded once per process lifetime; the core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDefinition {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub negative_keywords: Vec<String>,
}

/// A known publisher: canonical name plus aliases and DOI prefixes, used to
/// resolve user-supplied names before fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherDefinition {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub prefixes: Vec<String>,
}

// ==================== Requests & Metadata ====================

/// Parameters for one record-level analytics operation. The routing layer
/// validates and supplies these; the core treats them as already well-formed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub topic_key: Option<String>,
    pub ad_hoc_query: Option<String>,
    pub from_pub_date: NaiveDate,
    pub until_pub_date: NaiveDate,
    pub doc_types: Vec<String>,
    pub publishers: Vec<String>,
    pub container_titles: Vec<String>,
    pub doi_prefixes: Vec<String>,
    pub max_records: Option<usize>,
    pub rows_per_request: Option<usize>,
    pub refresh_cache: bool,
}

impl Default for AnalyzeRequest {
    fn default() -> Self {
        Self {
            topic_key: None,
            ad_hoc_query: None,
            from_pub_date: default_from_date(),
            until_pub_date: chrono::Utc::now().date_naive(),
            doc_types: vec![
                "journal-article".to_string(),
                "proceedings-article".to_string(),
            ],
            publishers: Vec::new(),
            container_titles: Vec::new(),
            doi_prefixes: Vec::new(),
            max_records: None,
            rows_per_request: None,
            refresh_cache: false,
        }
    }
}

fn default_from_date() -> NaiveDate {
    // Catalog coverage before 2018 is too sparse to trend on.
    NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default()
}

/// Parameters for the catalog-wide sweeps (emerging topics, gap analysis)
/// that fetch one record set per configured topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRequest {
    pub from_pub_date: NaiveDate,
    pub until_pub_date: NaiveDate,
    pub lookback_years: Option<i32>,
    pub max_records_per_topic: Option<usize>,
    pub refresh_cache: bool,
}

impl Default for SweepRequest {
    fn default() -> Self {
        Self {
            from_pub_date: default_from_date(),
            until_pub_date: chrono::Utc::now().date_naive(),
            lookback_years: None,
            max_records_per_topic: None,
            refresh_cache: false,
        }
    }
}

/// Result metadata block attached to every analytics response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMeta {
    /// RFC 3339 timestamp of result generation.
    pub generated_at: String,
    pub cached_responses: u64,
    pub live_responses: u64,
    pub last_api_call_at: Option<String>,
    /// Coverage warnings: which downstream statistic is least trustworthy.
    /// Advisory only, never blocks a result.
    #[serde(default)]
    pub warnings: Vec<String>,
}
