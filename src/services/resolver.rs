// src/services/resolver.rs

//! Identifier resolver.
//!
//! The gazette AJAX backend only answers when given the `ModuleId` and `TabId`
//! of the listing module. Neither is documented and both change when the
//! portal is redeployed, so they are read from the listing page's inline
//! scripts, either through the companion scraping proxy or directly.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Locale, ResolvedIdentifiers, ResolverMode, UpstreamConfig};
use crate::utils::join_endpoint;

static MODULE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ModuleId\s*=\s*["']?(\d+)"#).expect("valid regex"));
static TAB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"var\s+TabId\s*=\s*["']?(\d+)"#).expect("valid regex"));

/// Source of the identifiers for the gazette AJAX backend.
#[async_trait]
pub trait IdentifierResolver: Send + Sync {
    async fn resolve(&self, locale: Locale) -> Result<ResolvedIdentifiers>;
}

/// Pull both identifiers out of the listing page script text.
///
/// The page embeds several modules; the French listing is the lowest
/// `ModuleId` and the Arabic listing the highest.
pub fn extract_identifiers(locale: Locale, scripts: &str) -> Result<ResolvedIdentifiers> {
    let module_ids: Vec<u32> = MODULE_ID
        .captures_iter(scripts)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();

    let module_id = match locale {
        Locale::Fr => module_ids.iter().min(),
        Locale::Ar => module_ids.iter().max(),
    }
    .copied()
    .ok_or_else(|| AppError::parse(format!("ModuleId not found in {locale} listing scripts")))?;

    let tab_id = TAB_ID
        .captures(scripts)
        .and_then(|caps| caps[1].parse().ok())
        .ok_or_else(|| AppError::parse(format!("TabId not found in {locale} listing scripts")))?;

    Ok(ResolvedIdentifiers::new(module_id, tab_id))
}

/// Response of the scraping proxy's `/scrape` endpoint.
#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    result: Value,
}

/// Flatten whatever the proxy returned into searchable text.
fn flatten_result(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_result)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .values()
            .map(flatten_result)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// Concatenate the text of every `<script>` element in a page.
fn script_text(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("script").map_err(|e| AppError::parse(format!("script selector: {e}")))?;
    Ok(document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Resolves identifiers by scanning the listing page scripts.
pub struct ScriptResolver {
    client: Client,
    site_base: Url,
    scrape_endpoint: Url,
    mode: ResolverMode,
}

impl ScriptResolver {
    pub fn new(client: Client, upstream: &UpstreamConfig) -> Result<Self> {
        Ok(Self {
            client,
            site_base: Url::parse(&upstream.sgg_base_url)?,
            scrape_endpoint: join_endpoint(&upstream.scraper_api_base, "scrape")?,
            mode: upstream.resolver_mode,
        })
    }

    /// Public listing page for a locale.
    pub fn listing_url(&self, locale: Locale) -> Result<Url> {
        Ok(self.site_base.join(locale.listing_path())?)
    }

    async fn fetch_scripts(&self, locale: Locale) -> Result<String> {
        let page = self.listing_url(locale)?;
        match self.mode {
            ResolverMode::Proxy => self.fetch_via_proxy(&page).await,
            ResolverMode::Direct => self.fetch_direct(&page).await,
        }
    }

    async fn fetch_via_proxy(&self, page: &Url) -> Result<String> {
        let response = self
            .client
            .get(self.scrape_endpoint.clone())
            .query(&[("url", page.as_str()), ("type", "scripts")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::upstream("scraping proxy", e))?;

        let body = response
            .text()
            .await
            .map_err(|e| AppError::upstream("scraping proxy", e))?;
        let parsed: ScrapeResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::parse(format!("scraping proxy returned invalid JSON: {e}")))?;

        Ok(flatten_result(&parsed.result))
    }

    async fn fetch_direct(&self, page: &Url) -> Result<String> {
        let html = self
            .client
            .get(page.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::upstream("listing page", e))?
            .text()
            .await
            .map_err(|e| AppError::upstream("listing page", e))?;

        script_text(&html)
    }
}

#[async_trait]
impl IdentifierResolver for ScriptResolver {
    async fn resolve(&self, locale: Locale) -> Result<ResolvedIdentifiers> {
        let scripts = self.fetch_scripts(locale).await?;
        let ids = extract_identifiers(locale, &scripts)?;
        log::debug!(
            "Resolved {} identifiers: ModuleId={} TabId={}",
            locale,
            ids.module_id,
            ids.tab_id
        );
        Ok(ids)
    }
}

/// Reuses resolved identifiers for a bounded time.
pub struct CachedResolver<R> {
    inner: R,
    ttl: Duration,
    entries: Mutex<HashMap<Locale, (Instant, ResolvedIdentifiers)>>,
}

impl<R: IdentifierResolver> CachedResolver<R> {
    /// A zero `ttl` disables reuse.
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, locale: Locale) -> Option<ResolvedIdentifiers> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(&locale)
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, ids)| *ids)
    }
}

#[async_trait]
impl<R: IdentifierResolver> IdentifierResolver for CachedResolver<R> {
    async fn resolve(&self, locale: Locale) -> Result<ResolvedIdentifiers> {
        if let Some(ids) = self.cached(locale) {
            return Ok(ids);
        }

        let ids = self.inner.resolve(locale).await?;
        if !self.ttl.is_zero() {
            if let Ok(mut entries) = self.entries.lock() {
                entries.insert(locale, (Instant::now(), ids));
            }
        }
        Ok(ids)
    }
}
