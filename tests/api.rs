use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Datelike;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use bulletin::{
    error::{AppError, Result},
    models::{BulletinRecord, Locale, YearFilter},
    server::{AppState, auth::InternalKey, router},
    services::BulletinSource,
    storage::{BulletinStore, LocalStorage},
};

const KEY: &str = "test-internal-key";

fn record(id: i64, date: &str) -> BulletinRecord {
    BulletinRecord {
        id,
        number: format!("7{id:03}"),
        date: date.parse().unwrap(),
        url: format!("https://www.sgg.gov.ma/BO/FR/BO_{id}.pdf"),
    }
}

/// Stubbed upstream that counts every call.
#[derive(Default)]
struct StubSource {
    calls: AtomicUsize,
    schema_changed: bool,
}

impl StubSource {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn listing(&self) -> Result<Vec<BulletinRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.schema_changed {
            return Err(AppError::schema("listing is not a JSON array"));
        }
        Ok(vec![record(30, "2025-03-04"), record(29, "2025-02-27")])
    }
}

#[async_trait]
impl BulletinSource for StubSource {
    async fn fetch_latest(&self, _locale: Locale) -> Result<BulletinRecord> {
        Ok(self.listing()?.remove(0))
    }

    async fn fetch_all(
        &self,
        _locale: Locale,
        year: Option<YearFilter>,
    ) -> Result<Vec<BulletinRecord>> {
        let records = self.listing()?;
        Ok(match year {
            Some(filter) => filter.apply(records),
            None => records,
        })
    }

    async fn fetch_text(&self, locale: Locale) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("Bulletin Officiel {locale}"))
    }
}

struct Harness {
    tmp: TempDir,
    store: Arc<LocalStorage>,
    source: Arc<StubSource>,
    app: Router,
}

fn harness_with(source: StubSource, key: Option<&str>) -> Harness {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(LocalStorage::new(tmp.path()));
    let source = Arc::new(source);
    let state = AppState::new(source.clone(), store.clone(), InternalKey::new(key));
    Harness {
        tmp,
        store,
        source,
        app: router(state),
    }
}

fn harness() -> Harness {
    harness_with(StubSource::default(), Some(KEY))
}

async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_ok() {
    let h = harness();
    let (status, body) = get(&h.app, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn local_read_filters_by_year() {
    let h = harness();
    h.store
        .replace(Locale::Fr, vec![record(2, "2024-01-10"), record(1, "2023-06-22")])
        .await
        .unwrap();

    let (status, body) = get(&h.app, "/api/BO/local/FR?year=2024", None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["BoId"], 2);
    assert_eq!(records[0]["BoDate"], "2024-01-10");
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test]
async fn local_read_of_empty_cache_is_empty_list() {
    let h = harness();
    let (status, body) = get(&h.app, "/api/BO/local/ar", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Array(Vec::new()));
}

#[tokio::test]
async fn local_read_accepts_current_year() {
    let h = harness();
    let this_year = chrono::Local::now().year();
    h.store
        .replace(
            Locale::Fr,
            vec![
                record(8, &format!("{this_year}-01-02")),
                record(7, "2019-12-31"),
            ],
        )
        .await
        .unwrap();

    let (status, body) = get(&h.app, "/api/BO/local/FR?year=current", None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["BoId"], 8);
}

#[tokio::test]
async fn unreadable_cache_file_reads_as_empty() {
    let h = harness();
    h.store
        .replace(Locale::Ar, vec![record(5, "2024-05-01")])
        .await
        .unwrap();
    std::fs::write(h.tmp.path().join("bo_fr.json"), b"{ truncated").unwrap();

    let (status, body) = get(&h.app, "/api/BO/local/FR", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Array(Vec::new()));

    let (status, body) = get(&h.app, "/api/database", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["FR"], Value::Array(Vec::new()));
    assert_eq!(body["AR"][0]["BoId"], 5);

    let (status, body) = get(&h.app, "/api/database/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["FR"]["present"], true);
    assert_eq!(body["FR"]["count"], 0);
    assert_eq!(body["AR"]["count"], 1);

    let (status, body) = get(&h.app, "/api/database/test", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert!(!body["locales"]["FR"]["problems"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn bad_locale_or_year_is_client_error() {
    let h = harness();

    let (status, body) = get(&h.app, "/api/BO/local/EN", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");

    let (status, _) = get(&h.app, "/api/BO/local/FR?year=last", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn internal_endpoints_reject_before_upstream_call() {
    let h = harness();

    for uri in [
        "/api/BO/FR/internal",
        "/api/BO/ALL/FR",
        "/api/BO/ALL/AR/internal?year=2025",
        "/api/BO/Text/FR/internal",
        "/api/database/refresh",
        "/api/database/refresh/internal",
    ] {
        let (status, body) = get(&h.app, uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body["error"].is_string());

        let (status, _) = get(&h.app, uri, Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    assert_eq!(h.source.calls(), 0);
    assert!(h.store.read(Locale::Fr, None).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn internal_endpoints_forbidden_without_configured_key() {
    let h = harness_with(StubSource::default(), None);
    let (status, body) = get(&h.app, "/api/BO/ALL/FR", Some("anything")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test]
async fn latest_is_public_and_live() {
    let h = harness();
    let (status, body) = get(&h.app, "/api/BO/FR", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["BoId"], 30);
    assert_eq!(body["BoNum"], "7030");
    assert_eq!(h.source.calls(), 1);
}

#[tokio::test]
async fn all_and_text_with_valid_token() {
    let h = harness();

    let (status, body) = get(&h.app, "/api/BO/ALL/AR/internal?year=2025", Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = get(&h.app, "/api/BO/Text/AR", Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Bulletin Officiel AR");
}

#[tokio::test]
async fn schema_change_is_bad_gateway() {
    let h = harness_with(
        StubSource {
            schema_changed: true,
            ..StubSource::default()
        },
        Some(KEY),
    );
    let (status, body) = get(&h.app, "/api/BO/ALL/FR", Some(KEY)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "upstream_schema_changed");
}

#[tokio::test]
async fn refresh_replaces_cache_per_locale() {
    let h = harness();
    h.store
        .replace(Locale::Fr, vec![record(1, "2023-06-22")])
        .await
        .unwrap();

    let (status, body) = get(&h.app, "/api/database/refresh/internal", Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refreshed"]["FR"]["count"], 2);
    assert_eq!(body["refreshed"]["AR"]["count"], 2);
    assert_eq!(h.source.calls(), 2);

    let (_, body) = get(&h.app, "/api/BO/local/FR", None).await;
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["BoId"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![30, 29]);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_cache() {
    let h = harness_with(
        StubSource {
            schema_changed: true,
            ..StubSource::default()
        },
        Some(KEY),
    );
    h.store
        .replace(Locale::Fr, vec![record(1, "2023-06-22")])
        .await
        .unwrap();

    let (status, body) = get(&h.app, "/api/database/refresh", Some(KEY)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "refresh_incomplete");
    assert!(body["failed"]["FR"].is_string());

    let (_, body) = get(&h.app, "/api/BO/local/FR", None).await;
    assert_eq!(body[0]["BoId"], 1);
}

#[tokio::test]
async fn database_dump_status_and_check() {
    let h = harness();
    h.store
        .replace(Locale::Ar, vec![record(5, "2024-05-01")])
        .await
        .unwrap();

    for uri in ["/api/database", "/api/database/public"] {
        let (status, body) = get(&h.app, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["FR"], Value::Array(Vec::new()));
        assert_eq!(body["AR"][0]["BoId"], 5);
    }

    let (status, body) = get(&h.app, "/api/database/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["AR"]["count"], 1);
    assert_eq!(body["FR"]["present"], false);
    assert!(body["AR"]["lastRefreshed"].is_string());

    let (status, body) = get(&h.app, "/api/database/test", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["locales"]["AR"]["count"], 1);
}

#[tokio::test]
async fn unknown_path_is_json_not_found() {
    let h = harness();
    let (status, body) = get(&h.app, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header(header::ORIGIN, "https://example.org")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
