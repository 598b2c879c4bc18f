//! Record date resolution.
//!
//! Catalog date namespaces carry `[year, month?, day?]` integer parts.
//! Month and day default to 1; a calendar-invalid combination resolves to
//! absent rather than failing, and resolution falls through to the next
//! namespace in priority order.

use chrono::NaiveDate;

use crate::models::{DateField, Record};

/// Builds a date from a parts triple. Absent month/day default to 1;
/// anything calendar-invalid yields `None`.
#[must_use]
pub fn date_from_parts(parts: &[Option<i32>]) -> Option<NaiveDate> {
    let year = (*parts.first()?)?;
    let month = parts.get(1).copied().flatten().unwrap_or(1);
    let day = parts.get(2).copied().flatten().unwrap_or(1);
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

fn resolve(field: Option<&DateField>) -> Option<NaiveDate> {
    let parts = field?.date_parts.as_ref()?.first()?;
    date_from_parts(parts)
}

fn first_resolvable<'a>(
    fields: impl IntoIterator<Item = Option<&'a DateField>>,
) -> Option<NaiveDate> {
    fields.into_iter().find_map(resolve)
}

/// Publication date: first resolvable of `issued`, `published-online`,
/// `published-print`, `created`.
#[must_use]
pub fn published_date(record: &Record) -> Option<NaiveDate> {
    first_resolvable([
        record.issued.as_ref(),
        record.published_online.as_ref(),
        record.published_print.as_ref(),
        record.created.as_ref(),
    ])
}

/// Acceptance date, from the `accepted` namespace only.
#[must_use]
pub fn accepted_date(record: &Record) -> Option<NaiveDate> {
    first_resolvable([record.accepted.as_ref()])
}

/// Creation date: `created`, falling back to `deposited`.
#[must_use]
pub fn created_date(record: &Record) -> Option<NaiveDate> {
    first_resolvable([record.created.as_ref(), record.deposited.as_ref()])
}
