//! Emerging-topic ranking: growth within a recent lookback window across
//! the whole topic catalog.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Record, TopicDefinition};

use super::growth::cagr;
use super::overview::topic_overview;

#[derive(Debug, Clone, Serialize)]
pub struct EmergingTopic {
    pub topic_key: String,
    pub topic_name: String,
    /// Total dated volume across the topic's full observed span.
    pub total_volume: u64,
    /// CAGR over the lookback window; absent when the window endpoints do
    /// not support it.
    pub growth_rate: Option<f64>,
    /// Windowed per-year counts, oldest first.
    pub sparkline: Vec<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergingTopics {
    pub ranked_topics: Vec<EmergingTopic>,
}

/// Ranks topics by growth over the most recent `lookback_years` of each
/// topic's own series. Topics with fewer than two distinct years in the
/// window are skipped; ranking is growth descending (absent growth sorts
/// worst) with total volume as tiebreak.
#[must_use]
pub fn emerging_topics(
    records_by_topic: &BTreeMap<String, Vec<Record>>,
    topics: &[TopicDefinition],
    lookback_years: i32,
) -> EmergingTopics {
    let mut ranked: Vec<EmergingTopic> = Vec::new();

    for (key, records) in records_by_topic {
        let overview = topic_overview(records);
        let per_year = &overview.per_year;
        let Some(&last_year) = per_year.keys().next_back() else {
            continue;
        };

        let cutoff = last_year - lookback_years + 1;
        let recent: BTreeMap<i32, u64> = per_year
            .iter()
            .filter(|&(&year, _)| year >= cutoff)
            .map(|(&year, &count)| (year, count))
            .collect();
        if recent.len() < 2 {
            continue;
        }

        #[allow(clippy::cast_precision_loss)]
        let growth_rate = {
            let first = *recent.values().next().unwrap_or(&0) as f64;
            let last = *recent.values().next_back().unwrap_or(&0) as f64;
            let periods = i32::try_from(recent.len()).unwrap_or(i32::MAX) - 1;
            cagr(first, last, periods)
        };

        ranked.push(EmergingTopic {
            topic_key: key.clone(),
            topic_name: topics
                .iter()
                .find(|t| &t.key == key)
                .map_or_else(|| key.clone(), |t| t.name.clone()),
            total_volume: per_year.values().sum(),
            growth_rate,
            sparkline: recent.values().copied().collect(),
        });
    }

    ranked.sort_by(|a, b| {
        let ga = a.growth_rate.unwrap_or(f64::NEG_INFINITY);
        let gb = b.growth_rate.unwrap_or(f64::NEG_INFINITY);
        gb.partial_cmp(&ga)
            .unwrap_or(Ordering::Equal)
            .then(b.total_volume.cmp(&a.total_volume))
    });

    EmergingTopics {
        ranked_topics: ranked,
    }
}
