//! Cached, paginated, retrying fetch layer for the catalog `/works` API.
//!
//! Every page request is content-addressed (SHA-256 over the canonicalized
//! path + parameters) and served from the [`SqliteCache`] when possible, so
//! re-running an identical multi-page query costs zero upstream calls. Live
//! calls retry transient failures with exponential backoff, honoring a
//! server-supplied `Retry-After` when present.
//!
//! The retry loop is a bounded state machine: each attempt classifies the
//! upstream response into [`AttemptOutcome`] (success, back off, rejected,
//! unexpected) and either returns, sleeps, or escalates; exhausting the
//! attempt budget is a terminal [`FetchError::RetriesExhausted`].

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheError, SqliteCache};
use crate::config::AppSettings;
use crate::models::Record;

/// Default catalog API base URL.
const DEFAULT_BASE_URL: &str = "https://api.crossref.org";

/// Sentinel cursor for the first page of a paginated query.
const FIRST_PAGE_CURSOR: &str = "*";

/// Fetch-layer errors. Retryable failures are absorbed internally up to the
/// retry budget; everything here is terminal for the whole fetch call.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Client-error status from the catalog: the request itself is bad.
    /// Never retried; carries the upstream error body.
    #[error("catalog rejected query parameters: {body}")]
    Rejected { body: String },

    /// Transient failures persisted past the configured retry budget.
    #[error("catalog request failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Any other non-success status.
    #[error("unexpected catalog status {status}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Transport-level failure that is not retry-eligible.
    #[error("catalog transport failure: {0}")]
    Http(#[from] reqwest::Error),

    /// A payload (cached or live) did not match the expected response shape.
    #[error("malformed catalog payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The durable cache is unreachable. Never silently bypassed: degrading
    /// to no-cache would mask repeated redundant upstream calls.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

// ==================== Observability Counters ====================

/// Process-lifetime fetch counters, readable by callers for observability.
/// Counters are monotonically non-decreasing and advisory only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiStats {
    pub cached_responses: u64,
    pub live_responses: u64,
    /// RFC 3339 timestamp of the most recent live upstream call.
    pub last_api_call_at: Option<String>,
}

// ==================== Query Types ====================

/// One logical fetch: free-text query, closed date range, single-value
/// upstream filter hints, and pagination bounds.
#[derive(Debug, Clone)]
pub struct WorksQuery {
    pub query: Option<String>,
    pub from_pub_date: NaiveDate,
    pub until_pub_date: NaiveDate,
    pub doc_types: Vec<String>,
    pub doi_prefixes: Vec<String>,
    pub container_titles: Vec<String>,
    pub max_records: usize,
    pub rows: usize,
    pub refresh_cache: bool,
}

/// Builds the upstream `filter` parameter: comma-joined `key:value` clauses
/// in fixed order (date-from, date-until, type, prefix, container-title).
///
/// The upstream API accepts at most one value per dimension, so only the
/// first element of each hint list is sent; full multi-value filtering is
/// deferred to the post-filter. Absent dimensions are omitted entirely.
#[must_use]
pub fn build_filter_string(
    from_pub_date: NaiveDate,
    until_pub_date: NaiveDate,
    doc_types: &[String],
    doi_prefixes: &[String],
    container_titles: &[String],
) -> String {
    let mut clauses = vec![
        format!("from-pub-date:{from_pub_date}"),
        format!("until-pub-date:{until_pub_date}"),
    ];
    if let Some(doc_type) = doc_types.first() {
        clauses.push(format!("type:{doc_type}"));
    }
    if let Some(prefix) = doi_prefixes.first() {
        clauses.push(format!("prefix:{prefix}"));
    }
    if let Some(container) = container_titles.first() {
        clauses.push(format!("container-title:{container}"));
    }
    clauses.join(",")
}

// ==================== Wire Shapes ====================

/// Top-level catalog works response.
#[derive(Debug, Default, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    message: WorksMessage,
}

/// The `message` field of a works response: one page of items plus the
/// opaque continuation cursor.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct WorksMessage {
    #[serde(default)]
    items: Vec<Record>,
    next_cursor: Option<String>,
}

// ==================== Retry State Machine ====================

/// Classification of one upstream attempt.
#[derive(Debug)]
enum AttemptOutcome {
    /// HTTP 200: cache and return the payload.
    Success(serde_json::Value),
    /// Rate-limited or server-side unavailable: wait, then try again.
    BackOff(Duration),
    /// Client error: fail immediately, no retry.
    Rejected(String),
    /// Anything else: escalate as a generic upstream failure.
    Unexpected(reqwest::StatusCode, String),
}

/// Parses a `Retry-After` header value as delta-seconds or an HTTP-date.
fn retry_after_duration(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<f64>() {
        // Rejects negative, NaN, infinite, and over-large values in one go.
        return Duration::try_from_secs_f64(secs).ok();
    }
    let when = httpdate::parse_http_date(value).ok()?;
    Some(
        when.duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

// ==================== CatalogClient ====================

/// Cached, retrying client for the paginated catalog API.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    cache: SqliteCache,
    max_retries: u32,
    backoff_base: Duration,
    stats: Mutex<ApiStats>,
}

impl CatalogClient {
    /// Creates a client against the production catalog.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &AppSettings, cache: SqliteCache) -> Result<Self, FetchError> {
        Self::with_base_url(settings, cache, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(
        settings: &AppSettings,
        cache: SqliteCache,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_sec))
            .user_agent(settings.user_agent())
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            cache,
            max_retries: settings.max_retries,
            backoff_base: Duration::from_secs_f64(settings.backoff_base_sec),
            stats: Mutex::new(ApiStats::default()),
        })
    }

    /// Snapshot of the process-lifetime fetch counters.
    #[must_use]
    pub fn stats(&self) -> ApiStats {
        match self.stats.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn with_stats(&self, update: impl FnOnce(&mut ApiStats)) {
        let mut guard = match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        update(&mut guard);
    }

    /// Stable content hash of a request: SHA-256 over the canonical JSON of
    /// path + parameters. `BTreeMap` keeps parameter keys sorted, so two
    /// semantically identical requests hash identically regardless of how
    /// their fields were inserted.
    #[must_use]
    pub fn cache_key(path: &str, params: &BTreeMap<String, String>) -> String {
        #[derive(Serialize)]
        struct CanonicalRequest<'a> {
            params: &'a BTreeMap<String, String>,
            path: &'a str,
        }
        let canonical = serde_json::to_string(&CanonicalRequest { params, path })
            .unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{digest:x}")
    }

    /// Fetches one page, consulting the cache first unless `refresh_cache`
    /// is set (a refresh still writes the fresh result back).
    async fn get_page(
        &self,
        path: &str,
        params: &BTreeMap<String, String>,
        refresh_cache: bool,
    ) -> Result<serde_json::Value, FetchError> {
        let key = Self::cache_key(path, params);

        if !refresh_cache
            && let Some(cached) = self.cache.get(&key).await?
        {
            self.with_stats(|stats| stats.cached_responses += 1);
            debug!(key, "Serving page from cache");
            return Ok(cached);
        }

        let url = format!("{}{path}", self.base_url);
        for attempt in 0..=self.max_retries {
            let response = match self.http.get(&url).query(params).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    let delay = self.backoff_delay(attempt);
                    warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64,
                        "Catalog request timed out; backing off");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(FetchError::Http(e)),
            };

            self.with_stats(|stats| {
                stats.last_api_call_at =
                    Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
            });

            match self.classify(response, attempt).await? {
                AttemptOutcome::Success(payload) => {
                    self.cache.set(&key, &payload).await?;
                    self.with_stats(|stats| stats.live_responses += 1);
                    return Ok(payload);
                }
                AttemptOutcome::BackOff(delay) => {
                    debug!(attempt, delay_ms = delay.as_millis() as u64,
                        "Transient catalog failure; backing off");
                    tokio::time::sleep(delay).await;
                }
                AttemptOutcome::Rejected(body) => {
                    return Err(FetchError::Rejected { body });
                }
                AttemptOutcome::Unexpected(status, body) => {
                    return Err(FetchError::UnexpectedStatus { status, body });
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts: self.max_retries + 1,
        })
    }

    /// Classifies one upstream response for the retry loop.
    async fn classify(
        &self,
        response: reqwest::Response,
        attempt: u32,
    ) -> Result<AttemptOutcome, FetchError> {
        let status = response.status();
        if status == reqwest::StatusCode::OK {
            return Ok(AttemptOutcome::Success(response.json().await?));
        }

        if matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504) {
            let delay = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(retry_after_duration)
                .unwrap_or_else(|| self.backoff_delay(attempt));
            return Ok(AttemptOutcome::BackOff(delay));
        }

        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::BAD_REQUEST {
            return Ok(AttemptOutcome::Rejected(body));
        }
        Ok(AttemptOutcome::Unexpected(status, body))
    }

    /// Exponential backoff: `base * 2^attempt`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }

    /// Runs a paginated works query, assembling records across as many pages
    /// as needed, capped at `max_records`.
    ///
    /// Pages are requested strictly in cursor order. The loop stops when the
    /// cap is reached, a page comes back empty, the server supplies no next
    /// cursor, or the cursor repeats (stall guard against a misbehaving
    /// upstream). Each page is cached under its own key.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if any page fails terminally; no partial record
    /// set is returned for a failed page.
    #[instrument(skip(self, query), fields(max_records = query.max_records))]
    pub async fn fetch_works(&self, query: &WorksQuery) -> Result<Vec<Record>, FetchError> {
        let filter = build_filter_string(
            query.from_pub_date,
            query.until_pub_date,
            &query.doc_types,
            &query.doi_prefixes,
            &query.container_titles,
        );

        let mut items: Vec<Record> = Vec::new();
        let mut cursor = FIRST_PAGE_CURSOR.to_string();

        while items.len() < query.max_records {
            let mut params = BTreeMap::new();
            if let Some(text) = query.query.as_deref()
                && !text.is_empty()
            {
                params.insert("query".to_string(), text.to_string());
            }
            params.insert("filter".to_string(), filter.clone());
            params.insert(
                "rows".to_string(),
                query.rows.min(query.max_records - items.len()).to_string(),
            );
            params.insert("cursor".to_string(), cursor.clone());

            let payload = self.get_page("/works", &params, query.refresh_cache).await?;
            let page: WorksResponse = serde_json::from_value(payload)?;
            if page.message.items.is_empty() {
                break;
            }
            items.extend(page.message.items);

            match page.message.next_cursor {
                Some(next) if !next.is_empty() && next != cursor => cursor = next,
                _ => break,
            }
        }

        items.truncate(query.max_records);
        info!(count = items.len(), "Fetched records from catalog");
        Ok(items)
    }
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
