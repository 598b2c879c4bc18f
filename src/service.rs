//! Operation layer consumed by the routing front-end.
//!
//! One async function per analytics operation, each the same composition:
//! fetch (through the cache) -> post-filter -> topic match -> aggregate.
//! Every result carries the echoed request, coverage metrics, and an
//! [`ApiMeta`] block with fetch counters and advisory coverage warnings.
//! The routing layer owns transport, validation, and CORS; it hands this
//! module already-validated request values and serializes what comes back.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::analysis::{
    CoverageMetrics, EmergingTopics, GapReport, InstitutionBreakdown, JournalIntelligence,
    PublicationLag, PublisherComparison, TopicOverview, compare_publishers, coverage_metrics,
    emerging_topics, gap_analysis, institutions_breakdown, journal_intelligence, publication_lag,
    topic_overview,
};
use crate::analysis::journals::DEFAULT_TOP_JOURNALS;
use crate::client::{CatalogClient, FetchError, WorksQuery};
use crate::config::AppSettings;
use crate::filter::{FilterHints, post_filter};
use crate::matcher::apply_topic_filter;
use crate::models::{AnalyzeRequest, ApiMeta, Record, SweepRequest};

/// Per-topic record cap for catalog-wide sweeps, unless the request
/// overrides it.
const SWEEP_TOPIC_RECORD_CAP: usize = 1200;

// ==================== Reports ====================

#[derive(Debug, Clone, Serialize)]
pub struct TopicReport {
    pub query: AnalyzeRequest,
    pub record_count: usize,
    pub coverage: CoverageMetrics,
    pub overview: TopicOverview,
    pub journals: JournalIntelligence,
    pub meta: ApiMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub query: AnalyzeRequest,
    pub record_count: usize,
    pub coverage: CoverageMetrics,
    pub comparison: PublisherComparison,
    pub meta: ApiMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstitutionReport {
    pub query: AnalyzeRequest,
    pub record_count: usize,
    pub coverage: CoverageMetrics,
    pub institutions: InstitutionBreakdown,
    pub meta: ApiMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct LagReport {
    pub query: AnalyzeRequest,
    pub record_count: usize,
    pub coverage: CoverageMetrics,
    pub time_to_publication: PublicationLag,
    pub meta: ApiMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergingReport {
    pub query: SweepRequest,
    pub result: EmergingTopics,
    pub meta: ApiMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapAnalysisReport {
    pub query: SweepRequest,
    pub result: GapReport,
    pub meta: ApiMeta,
}

// ==================== Service ====================

/// The analytics operations, bound to one settings catalog and one catalog
/// client. Independent operations may run concurrently; the cache
/// serializes conflicting access internally.
#[derive(Debug)]
pub struct AnalyticsService {
    settings: AppSettings,
    client: CatalogClient,
}

impl AnalyticsService {
    #[must_use]
    pub fn new(settings: AppSettings, client: CatalogClient) -> Self {
        Self { settings, client }
    }

    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Resolves user-supplied publisher names through the configured
    /// catalog: a name matching a definition's name or alias
    /// (case-insensitive) yields the canonical name and its DOI prefixes;
    /// unresolved names pass through verbatim.
    fn resolve_publishers(&self, selected: &[String]) -> (Vec<String>, Vec<String>) {
        if selected.is_empty() {
            return (Vec::new(), Vec::new());
        }
        let selected_lower: BTreeSet<String> =
            selected.iter().map(|s| s.to_lowercase()).collect();

        let mut names: Vec<String> = Vec::new();
        let mut prefixes: BTreeSet<String> = BTreeSet::new();
        for publisher in &self.settings.publishers {
            let mut options: BTreeSet<String> = publisher
                .aliases
                .iter()
                .map(|a| a.to_lowercase())
                .collect();
            options.insert(publisher.name.to_lowercase());
            if options.intersection(&selected_lower).next().is_some() {
                names.push(publisher.name.clone());
                prefixes.extend(publisher.prefixes.iter().cloned());
            }
        }

        let resolved_lower: BTreeSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        names.extend(
            selected
                .iter()
                .filter(|s| !resolved_lower.contains(&s.to_lowercase()))
                .cloned(),
        );
        (names, prefixes.into_iter().collect())
    }

    /// Runs the shared fetch -> post-filter -> topic-match pipeline.
    #[instrument(skip(self, request), fields(topic = request.topic_key.as_deref()))]
    async fn fetch_records(&self, request: &AnalyzeRequest) -> Result<Vec<Record>, FetchError> {
        let (publisher_names, catalog_prefixes) = self.resolve_publishers(&request.publishers);
        let prefixes: Vec<String> = request
            .doi_prefixes
            .iter()
            .chain(catalog_prefixes.iter())
            .cloned()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();

        let topic = request
            .topic_key
            .as_deref()
            .and_then(|key| self.settings.topic(key));
        let search_query = request.ad_hoc_query.clone().or_else(|| {
            topic.map(|t| {
                t.keywords
                    .iter()
                    .take(3)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" OR ")
            })
        });

        let records = self
            .client
            .fetch_works(&WorksQuery {
                query: search_query,
                from_pub_date: request.from_pub_date,
                until_pub_date: request.until_pub_date,
                doc_types: request.doc_types.clone(),
                doi_prefixes: prefixes.clone(),
                container_titles: request.container_titles.clone(),
                max_records: request
                    .max_records
                    .unwrap_or(self.settings.max_records_default),
                rows: request
                    .rows_per_request
                    .unwrap_or(self.settings.rows_per_request),
                refresh_cache: request.refresh_cache,
            })
            .await?;

        let records = post_filter(
            records,
            &FilterHints {
                doc_types: request.doc_types.clone(),
                publishers: publisher_names,
                doi_prefixes: prefixes,
                container_titles: request.container_titles.clone(),
            },
        );

        let (matched, summary) =
            apply_topic_filter(records, topic, request.ad_hoc_query.as_deref());
        debug!(
            mode = summary.mode,
            matched = summary.matched,
            avg_score = summary.avg_score,
            "Relevance filter applied"
        );
        Ok(matched)
    }

    fn meta(&self, warnings: Vec<String>) -> ApiMeta {
        let stats = self.client.stats();
        ApiMeta {
            generated_at: Utc::now().to_rfc3339(),
            cached_responses: stats.cached_responses,
            live_responses: stats.live_responses,
            last_api_call_at: stats.last_api_call_at,
            warnings,
        }
    }

    fn below_threshold(&self, rate: f64) -> bool {
        rate < self.settings.low_coverage_threshold
    }

    /// Topic overview plus journal intelligence for one record set.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the underlying fetch fails terminally.
    pub async fn analyze_topic(&self, request: AnalyzeRequest) -> Result<TopicReport, FetchError> {
        let records = self.fetch_records(&request).await?;
        let coverage = coverage_metrics(&records);

        let mut warnings = Vec::new();
        if self.below_threshold(coverage.abstract_rate) {
            warnings.push("Low abstract coverage; topic relevance may be undercounted.".to_string());
        }
        if self.below_threshold(coverage.affiliation_rate) {
            warnings
                .push("Low affiliation coverage; institution rankings may be incomplete.".to_string());
        }

        Ok(TopicReport {
            record_count: records.len(),
            overview: topic_overview(&records),
            journals: journal_intelligence(&records, DEFAULT_TOP_JOURNALS),
            meta: self.meta(warnings),
            coverage,
            query: request,
        })
    }

    /// Per-publisher volume, market share, and growth.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the underlying fetch fails terminally.
    pub async fn compare_publishers(
        &self,
        request: AnalyzeRequest,
    ) -> Result<ComparisonReport, FetchError> {
        let records = self.fetch_records(&request).await?;
        let coverage = coverage_metrics(&records);
        let comparison = compare_publishers(&records, &request.publishers);
        Ok(ComparisonReport {
            record_count: records.len(),
            coverage,
            comparison,
            meta: self.meta(Vec::new()),
            query: request,
        })
    }

    /// Institution and country rollups.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the underlying fetch fails terminally.
    pub async fn institutions(
        &self,
        request: AnalyzeRequest,
    ) -> Result<InstitutionReport, FetchError> {
        let records = self.fetch_records(&request).await?;
        let coverage = coverage_metrics(&records);

        let mut warnings = Vec::new();
        if self.below_threshold(coverage.affiliation_rate) {
            warnings
                .push("Low affiliation coverage; institution trends are best-effort only.".to_string());
        }

        Ok(InstitutionReport {
            record_count: records.len(),
            institutions: institutions_breakdown(&records),
            meta: self.meta(warnings),
            coverage,
            query: request,
        })
    }

    /// Created-to-published and accepted-to-published lag statistics.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the underlying fetch fails terminally.
    pub async fn time_to_publication(
        &self,
        request: AnalyzeRequest,
    ) -> Result<LagReport, FetchError> {
        let records = self.fetch_records(&request).await?;
        let coverage = coverage_metrics(&records);

        let mut warnings = Vec::new();
        if self.below_threshold(coverage.accepted_date_rate) {
            warnings.push(
                "Accepted-date coverage is low; accepted->published lag may be unstable.".to_string(),
            );
        }

        Ok(LagReport {
            record_count: records.len(),
            time_to_publication: publication_lag(&records),
            meta: self.meta(warnings),
            coverage,
            query: request,
        })
    }

    /// Fetches one record set per configured topic for the sweep
    /// operations. Topics are iterated sequentially; each fetch is
    /// self-contained.
    async fn fetch_by_topic(
        &self,
        request: &SweepRequest,
    ) -> Result<BTreeMap<String, Vec<Record>>, FetchError> {
        let cap = request
            .max_records_per_topic
            .unwrap_or_else(|| self.settings.max_records_default.min(SWEEP_TOPIC_RECORD_CAP));

        let mut records_by_topic = BTreeMap::new();
        for topic in &self.settings.topics {
            let per_topic = AnalyzeRequest {
                topic_key: Some(topic.key.clone()),
                ad_hoc_query: Some(
                    topic
                        .keywords
                        .iter()
                        .take(3)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(" OR "),
                ),
                from_pub_date: request.from_pub_date,
                until_pub_date: request.until_pub_date,
                max_records: Some(cap),
                refresh_cache: request.refresh_cache,
                ..AnalyzeRequest::default()
            };
            let records = self.fetch_records(&per_topic).await?;
            records_by_topic.insert(topic.key.clone(), records);
        }
        Ok(records_by_topic)
    }

    /// Cross-topic emerging-topic ranking over the configured catalog.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when any per-topic fetch fails terminally.
    pub async fn emerging_topics(
        &self,
        request: SweepRequest,
    ) -> Result<EmergingReport, FetchError> {
        let records_by_topic = self.fetch_by_topic(&request).await?;
        let lookback = request
            .lookback_years
            .unwrap_or(self.settings.topic_catalog_lookback_years);
        Ok(EmergingReport {
            result: emerging_topics(&records_by_topic, &self.settings.topics, lookback),
            meta: self.meta(Vec::new()),
            query: request,
        })
    }

    /// Publisher market-gap scoring over the configured topic catalog.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when any per-topic fetch fails terminally.
    pub async fn gap_analysis(
        &self,
        request: SweepRequest,
        target_publisher: &str,
    ) -> Result<GapAnalysisReport, FetchError> {
        let records_by_topic = self.fetch_by_topic(&request).await?;
        Ok(GapAnalysisReport {
            result: gap_analysis(&records_by_topic, target_publisher, &self.settings),
            meta: self.meta(Vec::new()),
            query: request,
        })
    }
}
