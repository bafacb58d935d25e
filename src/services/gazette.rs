// src/services/gazette.rs

//! Upstream gazette client.
//!
//! Calls the portal's AJAX listing method with the resolved identifiers and
//! maps its raw rows into [`BulletinRecord`]s. A raw row looks like:
//!
//! ```json
//! {"BoId": 5012, "BoNum": "7270", "BoDate": "/Date(1704844800000)/", "BoUrl": "/BO/FR/2024/BO_7270_Fr.pdf"}
//! ```

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{BulletinRecord, Config, HttpConfig, Locale, ResolvedIdentifiers, YearFilter};
use crate::models::{UpstreamConfig, latest};
use crate::services::extractor::{Pdf2TextExtractor, TextExtractor};
use crate::services::resolver::{CachedResolver, IdentifierResolver, ScriptResolver};
use crate::services::BulletinSource;
use crate::utils::{http, resolve_url};

static EPOCH_MILLIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Date\((-?\d+)").expect("valid regex"));

/// Parse an upstream date, `/Date(<epoch-ms>)/` or an ISO date prefix.
pub fn parse_upstream_date(raw: &str) -> Option<NaiveDate> {
    if let Some(caps) = EPOCH_MILLIS.captures(raw) {
        let millis: i64 = caps[1].parse().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive());
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

fn field<'a>(raw: &'a Value, name: &str, index: usize) -> Result<&'a Value> {
    match raw.get(name) {
        Some(Value::Null) | None => Err(AppError::schema(format!(
            "row {index} is missing '{name}'"
        ))),
        Some(value) => Ok(value),
    }
}

/// Map one raw row to a record.
fn parse_row(raw: &Value, index: usize, site_base: &Url) -> Result<BulletinRecord> {
    let id = match field(raw, "BoId", index)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::schema(format!("row {index} has a non-integer 'BoId'")))?;

    let number = match field(raw, "BoNum", index)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(AppError::schema(format!("row {index} has an invalid 'BoNum'"))),
    };

    let date = field(raw, "BoDate", index)?
        .as_str()
        .and_then(parse_upstream_date)
        .ok_or_else(|| AppError::schema(format!("row {index} has an unreadable 'BoDate'")))?;

    let url = field(raw, "BoUrl", index)?
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::schema(format!("row {index} has an empty 'BoUrl'")))?;
    let url = resolve_url(site_base, url)
        .map_err(|e| AppError::schema(format!("row {index} has an invalid 'BoUrl': {e}")))?;

    Ok(BulletinRecord {
        id,
        number,
        date,
        url,
    })
}

/// Map the AJAX listing body, keeping upstream order.
pub fn parse_listing(body: &Value, site_base: &Url) -> Result<Vec<BulletinRecord>> {
    let rows = body
        .as_array()
        .ok_or_else(|| AppError::schema("listing is not a JSON array"))?;

    rows.iter()
        .enumerate()
        .map(|(index, raw)| parse_row(raw, index, site_base))
        .collect()
}

/// Client for the gazette portal's AJAX listing.
pub struct GazetteClient {
    client: Client,
    resolver: Arc<dyn IdentifierResolver>,
    extractor: Arc<dyn TextExtractor>,
    site_base: Url,
    ajax_url: Url,
    ajax_timeout: Duration,
}

impl GazetteClient {
    pub fn new(
        client: Client,
        resolver: Arc<dyn IdentifierResolver>,
        extractor: Arc<dyn TextExtractor>,
        upstream: &UpstreamConfig,
        http: &HttpConfig,
    ) -> Result<Self> {
        let site_base = Url::parse(&upstream.sgg_base_url)?;
        let ajax_url = site_base.join(&upstream.ajax_path)?;
        Ok(Self {
            client,
            resolver,
            extractor,
            site_base,
            ajax_url,
            ajax_timeout: Duration::from_secs(http.ajax_timeout_secs),
        })
    }

    /// Wire up the resolver, extractor and shared HTTP client from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = http::create_async_client(&config.http)?;
        let resolver = CachedResolver::new(
            ScriptResolver::new(client.clone(), &config.upstream)?,
            Duration::from_secs(config.upstream.identifier_ttl_secs),
        );
        let extractor = Pdf2TextExtractor::new(client.clone(), &config.upstream, &config.http)?;

        Self::new(
            client,
            Arc::new(resolver),
            Arc::new(extractor),
            &config.upstream,
            &config.http,
        )
    }

    /// Resolve identifiers, falling back to the last known values.
    async fn identifiers(&self, locale: Locale) -> ResolvedIdentifiers {
        match self.resolver.resolve(locale).await {
            Ok(ids) => ids,
            Err(e) => {
                let fallback = locale.fallback_identifiers();
                log::warn!(
                    "Identifier resolution for {} failed ({}); using ModuleId={} TabId={}",
                    locale,
                    e,
                    fallback.module_id,
                    fallback.tab_id
                );
                fallback
            }
        }
    }

    /// Fetch the full upstream listing for a locale.
    async fn fetch_listing(&self, locale: Locale) -> Result<Vec<BulletinRecord>> {
        let ids = self.identifiers(locale).await;

        let response = self
            .client
            .get(self.ajax_url.clone())
            .header("ModuleId", ids.module_id.to_string())
            .header("TabId", ids.tab_id.to_string())
            .header("RequestVerificationToken", "")
            .timeout(self.ajax_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::upstream("gazette listing", e))?;

        let body = response
            .text()
            .await
            .map_err(|e| AppError::upstream("gazette listing", e))?;
        let json: Value = serde_json::from_str(&body)
            .map_err(|e| AppError::schema(format!("listing is not JSON: {e}")))?;

        let records = parse_listing(&json, &self.site_base)?;
        log::info!("Fetched {} {} bulletins from upstream", records.len(), locale);
        Ok(records)
    }
}

#[async_trait]
impl BulletinSource for GazetteClient {
    async fn fetch_latest(&self, locale: Locale) -> Result<BulletinRecord> {
        let records = self.fetch_listing(locale).await?;
        latest(&records)
            .cloned()
            .ok_or_else(|| AppError::not_found("Latest Bulletin Officiel not found"))
    }

    async fn fetch_all(
        &self,
        locale: Locale,
        year: Option<YearFilter>,
    ) -> Result<Vec<BulletinRecord>> {
        let mut records = self.fetch_listing(locale).await?;
        if let Some(filter) = year {
            records = filter.apply(records);
        }

        if records.is_empty() {
            let scope = year.map(|y| format!(" for {}", y.year())).unwrap_or_default();
            return Err(AppError::not_found(format!(
                "No {} Bulletin Officiel was found{}",
                locale.language(),
                scope
            )));
        }
        Ok(records)
    }

    async fn fetch_text(&self, locale: Locale) -> Result<String> {
        let record = self.fetch_latest(locale).await?;
        self.extractor.extract_text(&record.url).await
    }
}
