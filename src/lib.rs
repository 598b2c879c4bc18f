//! Publication-Trend Analytics Core
//!
//! This library ingests bibliographic metadata from the paginated Crossref
//! catalog API, caches responses durably, filters and relevance-scores
//! records against configurable research-topic definitions, and derives
//! publication-trend statistics: growth rates, market share, institutional
//! rollups, publication lag, emerging-topic ranking, and market-gap scoring.
//!
//! # Architecture
//!
//! Data flows strictly downward through the modules:
//! - [`client`] - cached, paginated, retrying fetch layer (uses [`cache`])
//! - [`filter`] - post-retrieval multi-value filtering
//! - [`matcher`] - topic/keyword relevance scoring
//! - [`analysis`] - pure statistical aggregation
//! - [`service`] - one async operation per analytics endpoint, composing
//!   the layers above for the (external) routing front-end
//!
//! [`config`] supplies the immutable settings and topic/publisher catalogs;
//! [`models`] holds the shared data model.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod cache;
pub mod client;
pub mod config;
pub mod filter;
pub mod matcher;
pub mod models;
pub mod service;

// Re-export commonly used types
pub use cache::{CacheError, SqliteCache};
pub use client::{ApiStats, CatalogClient, FetchError, WorksQuery, build_filter_string};
pub use config::{AppSettings, ConfigError, load_settings};
pub use filter::{FilterHints, post_filter};
pub use matcher::{MatchResult, TopicMatcher, ad_hoc_match_score, record_text};
pub use models::{AnalyzeRequest, ApiMeta, PublisherDefinition, Record, SweepRequest, TopicDefinition};
pub use service::AnalyticsService;
