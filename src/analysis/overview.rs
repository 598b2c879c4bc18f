//! Topic overview: per-year volume, growth, and the top publishers and
//! journals carrying that volume.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::models::Record;

use super::CountedLabels;
use super::dates::published_date;
use super::growth::{YearPoint, span_cagr, yoy_series};

/// How many publishers and journals the overview ranks.
const TOP_N: usize = 10;

/// One publisher's volume, growth, and per-year series within a topic.
#[derive(Debug, Clone, Serialize)]
pub struct PublisherTrend {
    pub name: String,
    pub count: u64,
    pub cagr: Option<f64>,
    pub per_year: BTreeMap<i32, u64>,
}

/// One journal's volume and per-year series, annotated with a publisher
/// label where one is known.
#[derive(Debug, Clone, Serialize)]
pub struct JournalTrend {
    pub name: String,
    pub count: u64,
    pub publisher: String,
    pub per_year: BTreeMap<i32, u64>,
}

/// Publication-trend summary for one record set.
#[derive(Debug, Clone, Serialize)]
pub struct TopicOverview {
    pub per_year: BTreeMap<i32, u64>,
    pub yearly_growth: Vec<YearPoint>,
    pub cagr: Option<f64>,
    pub top_publishers: Vec<PublisherTrend>,
    pub top_journals: Vec<JournalTrend>,
}

/// Aggregates per-year counts, growth series, overall CAGR, and top-10
/// publisher/journal rankings. Records without a resolvable published date
/// are skipped.
#[must_use]
pub fn topic_overview(records: &[Record]) -> TopicOverview {
    let mut by_year: BTreeMap<i32, u64> = BTreeMap::new();
    let mut publishers = CountedLabels::default();
    let mut journals = CountedLabels::default();
    let mut publisher_years: HashMap<String, BTreeMap<i32, u64>> = HashMap::new();
    let mut journal_years: HashMap<String, BTreeMap<i32, u64>> = HashMap::new();

    for record in records {
        let Some(published) = published_date(record) else {
            continue;
        };
        let year = chrono::Datelike::year(&published);
        let publisher = record.publisher_label().to_string();
        let journal = record.journal_label().to_string();

        *by_year.entry(year).or_default() += 1;
        publishers.add(&publisher);
        journals.add(&journal);
        *publisher_years
            .entry(publisher)
            .or_default()
            .entry(year)
            .or_default() += 1;
        *journal_years
            .entry(journal)
            .or_default()
            .entry(year)
            .or_default() += 1;
    }

    let yearly_growth = yoy_series(&by_year);
    let cagr = span_cagr(&by_year);

    let top_publishers = publishers
        .top(TOP_N)
        .into_iter()
        .map(|(name, count)| {
            let per_year = publisher_years.get(&name).cloned().unwrap_or_default();
            let cagr = span_cagr(&per_year);
            PublisherTrend {
                name,
                count,
                cagr,
                per_year,
            }
        })
        .collect();

    let top_journals = journals
        .top(TOP_N)
        .into_iter()
        .map(|(name, count)| JournalTrend {
            per_year: journal_years.get(&name).cloned().unwrap_or_default(),
            publisher: "n/a".to_string(),
            name,
            count,
        })
        .collect();

    TopicOverview {
        per_year: by_year,
        yearly_growth,
        cagr,
        top_publishers,
        top_journals,
    }
}
