// src/server/routes.rs

//! Request handlers.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};

use crate::error::{AppError, Result};
use crate::models::{BulletinRecord, Locale, parse_year};
use crate::pipeline::run_refresh;
use crate::server::AppState;
use crate::storage::{CheckReport, LocaleStatus};

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Bulletin Officiel API</title></head>
<body style="font-family: Arial; padding: 24px; max-width: 960px; margin: auto;">
  <h1>Bulletin Officiel API</h1>
  <p>Public endpoints:</p>
  <ul>
    <li>GET <code>/api/health</code></li>
    <li>GET <code>/api/BO/FR</code>, <code>/api/BO/AR</code></li>
    <li>GET <code>/api/BO/local/{FR|AR}?year=2024|current</code></li>
    <li>GET <code>/api/database</code>, <code>/api/database/public</code></li>
    <li>GET <code>/api/database/status</code>, <code>/api/database/test</code></li>
  </ul>
  <p>Internal endpoints (<code>Authorization: Bearer &lt;INTERNAL_API_KEY&gt;</code>):</p>
  <ul>
    <li>GET <code>/api/BO/{FR|AR}/internal</code></li>
    <li>GET <code>/api/BO/ALL/{FR|AR}[/internal]?year=</code></li>
    <li>GET <code>/api/BO/Text/{FR|AR}[/internal]</code></li>
    <li>GET <code>/api/database/refresh[/internal]</code></li>
  </ul>
  <p>Set <code>SCRAPER_API_BASE</code> and <code>PDF2TEXT_BASE</code> to override the companion services.</p>
</body></html>
"#;

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    year: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TextBody {
    text: String,
}

pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Both cached collections.
#[instrument(skip(state))]
pub async fn database_handler(
    State(state): State<AppState>,
) -> Json<BTreeMap<Locale, Vec<BulletinRecord>>> {
    Json(state.store.dump().await)
}

#[instrument(skip(state))]
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<Locale, LocaleStatus>>> {
    Ok(Json(state.store.status().await?))
}

#[instrument(skip(state))]
pub async fn check_handler(State(state): State<AppState>) -> Result<Json<CheckReport>> {
    Ok(Json(state.store.check().await?))
}

/// Cached records for a locale; a missing or unreadable cache reads as empty.
#[instrument(skip(state))]
pub async fn local_handler(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<BulletinRecord>>> {
    let locale: Locale = locale.parse()?;
    let year = parse_year(query.year.as_deref())?;

    match state.store.read(locale, year).await {
        Ok(records) => Ok(Json(records)),
        Err(e) if e.is_not_found() => Ok(Json(Vec::new())),
        Err(e) => {
            warn!(%locale, error = %e, "cache read failed, serving empty collection");
            Ok(Json(Vec::new()))
        }
    }
}

#[instrument(skip(state))]
pub async fn latest_handler(
    State(state): State<AppState>,
    Path(locale): Path<String>,
) -> Result<Json<BulletinRecord>> {
    let locale: Locale = locale.parse()?;
    Ok(Json(state.source.fetch_latest(locale).await?))
}

#[instrument(skip(state))]
pub async fn all_handler(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<BulletinRecord>>> {
    let locale: Locale = locale.parse()?;
    let year = parse_year(query.year.as_deref())?;
    Ok(Json(state.source.fetch_all(locale, year).await?))
}

#[instrument(skip(state))]
pub async fn text_handler(
    State(state): State<AppState>,
    Path(locale): Path<String>,
) -> Result<Json<TextBody>> {
    let locale: Locale = locale.parse()?;
    let text = state.source.fetch_text(locale).await?;
    Ok(Json(TextBody { text }))
}

/// Re-fetch both locales and replace the cache.
#[instrument(skip(state))]
pub async fn refresh_handler(State(state): State<AppState>) -> Response {
    let outcome = run_refresh(state.source.as_ref(), state.store.as_ref()).await;

    if outcome.is_complete() {
        return (StatusCode::OK, Json(outcome)).into_response();
    }

    let body = json!({
        "error": "Refresh incomplete; failed locales kept their previous cache",
        "kind": "refresh_incomplete",
        "refreshed": outcome.refreshed,
        "failed": outcome.failed,
    });
    (StatusCode::BAD_GATEWAY, Json(body)).into_response()
}

pub async fn fallback_handler() -> AppError {
    AppError::not_found("No such endpoint")
}
