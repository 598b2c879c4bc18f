//! Integration tests for the catalog fetch layer: pagination, retry
//! policy, and cache behavior against a simulated upstream.

use std::time::Duration;

use pubtrend::cache::SqliteCache;
use pubtrend::client::{CatalogClient, FetchError, WorksQuery};
use pubtrend::config::AppSettings;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_settings() -> AppSettings {
    AppSettings {
        max_retries: 3,
        backoff_base_sec: 0.01,
        request_timeout_sec: 5,
        ..AppSettings::default()
    }
}

async fn test_client(server: &MockServer) -> CatalogClient {
    let cache = SqliteCache::new_in_memory(Duration::from_secs(3600))
        .await
        .expect("cache");
    CatalogClient::with_base_url(&test_settings(), cache, server.uri()).expect("client")
}

fn page(dois: &[&str], next_cursor: Option<&str>) -> serde_json::Value {
    let items: Vec<serde_json::Value> = dois
        .iter()
        .map(|doi| json!({"DOI": doi, "publisher": "SPIE"}))
        .collect();
    match next_cursor {
        Some(cursor) => json!({"message": {"items": items, "next-cursor": cursor}}),
        None => json!({"message": {"items": items}}),
    }
}

fn works_query(max_records: usize, rows: usize) -> WorksQuery {
    WorksQuery {
        query: Some("photonics".to_string()),
        from_pub_date: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        until_pub_date: chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        doc_types: Vec::new(),
        doi_prefixes: Vec::new(),
        container_titles: Vec::new(),
        max_records,
        rows,
        refresh_cache: false,
    }
}

#[tokio::test]
async fn paginates_until_upstream_is_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/a", "10.1/b"], Some("c2"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/c", "10.1/d"], Some("c3"))))
        .mount(&server)
        .await;
    // Final page: one item, no next-cursor.
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "c3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/e"], None)))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let records = client.fetch_works(&works_query(10, 2)).await.expect("fetch");

    assert_eq!(records.len(), 5);
    // ceil(5 / 2) = 3 page calls, no probing past the absent cursor.
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn caps_at_max_records_and_bounds_rows_by_remaining() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "*"))
        .and(query_param("rows", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/a", "10.1/b"], Some("c2"))))
        .mount(&server)
        .await;
    // Second page must ask for only the single remaining slot.
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "c2"))
        .and(query_param("rows", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/c"], Some("c3"))))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let records = client.fetch_works(&works_query(3, 2)).await.expect("fetch");

    assert_eq!(records.len(), 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn stops_on_repeated_cursor() {
    let server = MockServer::start().await;

    // Misbehaving upstream echoes the same cursor forever.
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/a"], Some("loop"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "loop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/b"], Some("loop"))))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let records = client.fetch_works(&works_query(100, 1)).await.expect("fetch");

    assert_eq!(records.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn stops_on_empty_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[], Some("c2"))))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let records = client.fetch_works(&works_query(10, 5)).await.expect("fetch");
    assert!(records.is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn two_transient_failures_then_success_uses_three_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/a"], None)))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let records = client.fetch_works(&works_query(10, 5)).await.expect("fetch");

    assert_eq!(records.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    let stats = client.stats();
    assert_eq!(stats.live_responses, 1);
    assert!(stats.last_api_call_at.is_some());
}

#[tokio::test]
async fn retry_after_header_is_honored() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/a"], None)))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let records = client.fetch_works(&works_query(10, 5)).await.expect("fetch");
    assert_eq!(records.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn client_error_fails_immediately_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad filter clause"))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let err = client.fetch_works(&works_query(10, 5)).await.unwrap_err();

    assert!(matches!(err, FetchError::Rejected { ref body } if body == "bad filter clause"));
    // No retries for rejected requests.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn persistent_transient_failures_exhaust_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let err = client.fetch_works(&works_query(10, 5)).await.unwrap_err();

    assert!(matches!(err, FetchError::RetriesExhausted { attempts: 4 }));
    // max_retries = 3 means 4 total attempts.
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn unexpected_status_escalates_immediately() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(418).set_body_string("teapot"))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let err = client.fetch_works(&works_query(10, 5)).await.unwrap_err();
    assert!(matches!(err, FetchError::UnexpectedStatus { .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn identical_query_is_fully_served_from_cache() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/a", "10.1/b"], Some("c2"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/c"], None)))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let query = works_query(10, 2);

    let first = client.fetch_works(&query).await.expect("first fetch");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    let second = client.fetch_works(&query).await.expect("second fetch");
    assert_eq!(second.len(), first.len());
    // Both pages replayed from the durable cache, zero new upstream calls.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    let stats = client.stats();
    assert_eq!(stats.live_responses, 2);
    assert_eq!(stats.cached_responses, 2);
}

#[tokio::test]
async fn refresh_cache_forces_live_calls_but_rewrites_cache() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["10.1/a"], None)))
        .mount(&server)
        .await;

    let client = test_client(&server).await;
    let mut query = works_query(10, 5);

    client.fetch_works(&query).await.expect("warm fetch");
    query.refresh_cache = true;
    client.fetch_works(&query).await.expect("refresh fetch");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    // The refreshed write is reusable by a subsequent cached read.
    query.refresh_cache = false;
    client.fetch_works(&query).await.expect("cached fetch");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert_eq!(client.stats().cached_responses, 1);
}
