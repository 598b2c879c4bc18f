//! Statistical aggregation over filtered, matched record sets.
//!
//! Everything here is pure and synchronous: no I/O, no mutation of inputs.
//! Functions borrow records read-only for the duration of a computation and
//! never fail on malformed or sparse input - every aggregate has a defined
//! absent/zero representation (see [`growth::cagr`], [`coverage`], and the
//! per-topic skip conditions in [`emerging`] and [`gap`]).

pub mod coverage;
pub mod dates;
pub mod emerging;
pub mod gap;
pub mod growth;
pub mod institutions;
pub mod journals;
pub mod lag;
pub mod overview;
pub mod publishers;

pub use coverage::{CoverageMetrics, coverage_metrics};
pub use emerging::{EmergingTopic, EmergingTopics, emerging_topics};
pub use gap::{GapOpportunity, GapReport, gap_analysis};
pub use growth::{YearPoint, cagr, span_cagr, yoy_series};
pub use institutions::{InstitutionBreakdown, institutions_breakdown};
pub use journals::{JournalIntelligence, journal_intelligence};
pub use lag::{PublicationLag, publication_lag};
pub use overview::{JournalTrend, PublisherTrend, TopicOverview, topic_overview};
pub use publishers::{PublisherComparison, compare_publishers};

use std::collections::HashMap;

/// Label counter that remembers first-seen order, so top-N ranking breaks
/// count ties by first appearance rather than alphabetically.
#[derive(Debug, Default)]
pub(crate) struct CountedLabels {
    counts: HashMap<String, u64>,
    order: Vec<String>,
}

impl CountedLabels {
    pub(crate) fn add(&mut self, label: &str) {
        if !self.counts.contains_key(label) {
            self.order.push(label.to_string());
        }
        *self.counts.entry(label.to_string()).or_default() += 1;
    }

    /// Top `n` labels by count, descending; ties keep first-seen order
    /// (stable sort over the insertion-ordered entries).
    pub(crate) fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .order
            .iter()
            .map(|label| (label.clone(), self.counts.get(label).copied().unwrap_or(0)))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(n);
        entries
    }
}
