//! Time-series growth: year-over-year deltas and compound annual growth.

use std::collections::BTreeMap;

use serde::Serialize;

/// One year of a count series with its year-over-year growth rate.
/// `yoy` is absent for the first year and whenever the previous year's
/// count is zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearPoint {
    pub year: i32,
    pub count: u64,
    pub yoy: Option<f64>,
}

/// Year-over-year series for a year-to-count map, sorted by year.
#[must_use]
pub fn yoy_series(per_year: &BTreeMap<i32, u64>) -> Vec<YearPoint> {
    let mut out = Vec::with_capacity(per_year.len());
    let mut prev: Option<u64> = None;
    for (&year, &count) in per_year {
        #[allow(clippy::cast_precision_loss)]
        let yoy = match prev {
            Some(p) if p > 0 => Some((count as f64 - p as f64) / p as f64),
            _ => None,
        };
        out.push(YearPoint { year, count, yoy });
        prev = Some(count);
    }
    out
}

/// Compound annual growth rate `(last/first)^(1/periods) - 1`.
///
/// Defined only for positive endpoints and a positive period count, which
/// guards against division and negative-base errors on sparse or
/// declining-to-zero series.
#[must_use]
pub fn cagr(first: f64, last: f64, periods: i32) -> Option<f64> {
    if first <= 0.0 || last <= 0.0 || periods <= 0 {
        return None;
    }
    Some((last / first).powf(1.0 / f64::from(periods)) - 1.0)
}

/// CAGR across a full observed series: first to last observed year, with
/// `periods = observed years - 1`. Absent for fewer than two observed years.
#[must_use]
pub fn span_cagr(per_year: &BTreeMap<i32, u64>) -> Option<f64> {
    let first = per_year.values().next()?;
    let last = per_year.values().next_back()?;
    let periods = i32::try_from(per_year.len()).ok()? - 1;
    #[allow(clippy::cast_precision_loss)]
    let (first, last) = (*first as f64, *last as f64);
    cagr(first, last, periods)
}
