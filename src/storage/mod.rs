//! Storage abstractions for the local bulletin cache.
//!
//! One JSON document per locale, replaced as a whole on every refresh:
//!
//! ```text
//! {cache_dir}/
//! ├── bo_fr.json         # French collection + refresh metadata
//! ├── bo_fr.meta.json    # count and refresh time only
//! ├── bo_ar.json         # Arabic collection + refresh metadata
//! └── bo_ar.meta.json
//! ```
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! reader only ever sees a complete previous or complete new collection.

pub mod local;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{BulletinRecord, Locale, YearFilter};

// Re-export for convenience
pub use local::LocalStorage;

/// Persisted per-locale cache document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFile {
    pub locale: Locale,
    /// Time of the refresh that produced this file
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    /// Most recent first, as returned by upstream
    pub records: Vec<BulletinRecord>,
}

impl CacheFile {
    pub fn new(locale: Locale, records: Vec<BulletinRecord>) -> Self {
        Self {
            locale,
            updated_at: Utc::now(),
            count: records.len(),
            records,
        }
    }
}

/// Per-locale cache summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleStatus {
    /// Whether a cache file exists yet
    pub present: bool,
    pub count: usize,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl LocaleStatus {
    pub fn missing() -> Self {
        Self {
            present: false,
            count: 0,
            last_refreshed: None,
        }
    }
}

/// Structural findings for one locale's cache file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocaleCheck {
    pub present: bool,
    pub count: usize,
    pub problems: Vec<String>,
}

impl LocaleCheck {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Result of the cache self-check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub ok: bool,
    pub locales: BTreeMap<Locale, LocaleCheck>,
}

impl CheckReport {
    pub fn new(locales: BTreeMap<Locale, LocaleCheck>) -> Self {
        Self {
            ok: locales.values().all(LocaleCheck::is_valid),
            locales,
        }
    }
}

/// Trait for bulletin cache backends.
#[async_trait]
pub trait BulletinStore: Send + Sync {
    /// Read the cached collection for a locale, optionally restricted to one year.
    ///
    /// Fails with `NotFound` when the locale has never been refreshed.
    async fn read(&self, locale: Locale, year: Option<YearFilter>) -> Result<Vec<BulletinRecord>>;

    /// Replace the whole collection for a locale in one step.
    async fn replace(&self, locale: Locale, records: Vec<BulletinRecord>) -> Result<CacheFile>;

    /// Counts and refresh times, without loading record content.
    async fn status(&self) -> Result<BTreeMap<Locale, LocaleStatus>>;

    /// Structural self-check of every locale's cache file.
    async fn check(&self) -> Result<CheckReport>;

    /// Both collections; a locale whose cache is missing or unreadable comes
    /// back empty without affecting the other.
    async fn dump(&self) -> BTreeMap<Locale, Vec<BulletinRecord>> {
        let mut all = BTreeMap::new();
        for locale in Locale::ALL {
            let records = match self.read(locale, None).await {
                Ok(records) => records,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => {
                    log::warn!("Cache read failed for {locale}, dumping it as empty: {e}");
                    Vec::new()
                }
            };
            all.insert(locale, records);
        }
        all
    }
}
