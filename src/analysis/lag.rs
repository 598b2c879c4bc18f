//! Time-to-publication: created-to-published and accepted-to-published lag
//! statistics with per-publication-year trends.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::Record;

use super::dates::{accepted_date, created_date, published_date};

/// Lags outside this window (in days) are discarded as a sentinel for
/// malformed dates.
const MAX_LAG_DAYS: i64 = 5000;

#[derive(Debug, Clone, Serialize)]
pub struct LagMetrics {
    pub created_to_published_days: Option<f64>,
    pub accepted_to_published_days: Option<f64>,
}

/// Fraction of records contributing to each lag population.
#[derive(Debug, Clone, Serialize)]
pub struct LagCoverage {
    pub created_to_published_rate: f64,
    pub accepted_to_published_rate: f64,
}

/// Mean lag per publication year, for each lag type.
#[derive(Debug, Clone, Serialize)]
pub struct LagTrend {
    pub created_to_published: BTreeMap<i32, f64>,
    pub accepted_to_published: BTreeMap<i32, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicationLag {
    pub metrics: LagMetrics,
    pub coverage: LagCoverage,
    pub trend: LagTrend,
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<i64>() as f64 / values.len() as f64)
}

fn yearly_means(per_year: &BTreeMap<i32, Vec<i64>>) -> BTreeMap<i32, f64> {
    per_year
        .iter()
        .filter_map(|(&year, values)| mean(values).map(|m| (year, m)))
        .collect()
}

/// Computes lag populations over records with a resolvable published date.
#[must_use]
pub fn publication_lag(records: &[Record]) -> PublicationLag {
    let mut c2p: Vec<i64> = Vec::new();
    let mut a2p: Vec<i64> = Vec::new();
    let mut c2p_year: BTreeMap<i32, Vec<i64>> = BTreeMap::new();
    let mut a2p_year: BTreeMap<i32, Vec<i64>> = BTreeMap::new();

    for record in records {
        let Some(published) = published_date(record) else {
            continue;
        };
        let year = chrono::Datelike::year(&published);
        if let Some(created) = created_date(record) {
            let lag = (published - created).num_days();
            if (0..=MAX_LAG_DAYS).contains(&lag) {
                c2p.push(lag);
                c2p_year.entry(year).or_default().push(lag);
            }
        }
        if let Some(accepted) = accepted_date(record) {
            let lag = (published - accepted).num_days();
            if (0..=MAX_LAG_DAYS).contains(&lag) {
                a2p.push(lag);
                a2p_year.entry(year).or_default().push(lag);
            }
        }
    }

    let rate = |n: usize| {
        if records.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let value = n as f64 / records.len() as f64;
            value
        }
    };

    PublicationLag {
        metrics: LagMetrics {
            created_to_published_days: mean(&c2p),
            accepted_to_published_days: mean(&a2p),
        },
        coverage: LagCoverage {
            created_to_published_rate: rate(c2p.len()),
            accepted_to_published_rate: rate(a2p.len()),
        },
        trend: LagTrend {
            created_to_published: yearly_means(&c2p_year),
            accepted_to_published: yearly_means(&a2p_year),
        },
    }
}
