//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── bo_fr.json
//! ├── bo_fr.meta.json
//! ├── bo_ar.json
//! └── bo_ar.meta.json
//! ```
//!
//! Writes go to a uniquely named temporary file in the same directory which is
//! flushed, synced and renamed over the target. Readers never take a lock.
//!
//! The `.meta.json` sidecar repeats the count and refresh time so status
//! queries never parse a collection. It is trusted only while it matches the
//! size of the data file and is not older than it.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{BulletinRecord, Locale, YearFilter};
use crate::pipeline::validate_records;
use crate::storage::{BulletinStore, CacheFile, CheckReport, LocaleCheck, LocaleStatus};

/// Distinguishes temp files of concurrent writers within this process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File header without the records array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheHeader {
    count: usize,
    updated_at: chrono::DateTime<chrono::Utc>,
}

/// Sidecar summary of a cache file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheMeta {
    count: usize,
    updated_at: chrono::DateTime<chrono::Utc>,
    /// Size of the data file this summary was written for
    bytes: u64,
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Cache file name for a locale.
    fn locale_key(locale: Locale) -> String {
        format!("bo_{}.json", locale.code().to_ascii_lowercase())
    }

    fn meta_key(locale: Locale) -> String {
        format!("bo_{}.meta.json", locale.code().to_ascii_lowercase())
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path(&format!(
            ".{}.{}.{}.tmp",
            key,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = Self::write_and_rename(&tmp, &path, bytes).await {
            // The previous file is untouched; only the temp file needs removing.
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    async fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(tmp, path).await
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Size and modification time, or None if the file doesn't exist.
    async fn stat(&self, key: &str) -> Result<Option<(u64, SystemTime)>> {
        match tokio::fs::metadata(self.path(key)).await {
            Ok(meta) => Ok(Some((meta.len(), meta.modified()?))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load the full cache document for a locale.
    pub async fn load(&self, locale: Locale) -> Result<Option<CacheFile>> {
        self.read_json(&Self::locale_key(locale)).await
    }

    /// Count and refresh time of a locale's cache file.
    ///
    /// Served from the sidecar when it is current, otherwise by scanning the
    /// data file with its records skipped.
    async fn read_header(&self, locale: Locale) -> Result<Option<CacheHeader>> {
        let data_key = Self::locale_key(locale);
        let Some((bytes, modified)) = self.stat(&data_key).await? else {
            return Ok(None);
        };

        let meta_key = Self::meta_key(locale);
        let meta_modified = self.stat(&meta_key).await?.map(|(_, at)| at);
        if meta_modified.is_some_and(|at| at >= modified) {
            match self.read_json::<CacheMeta>(&meta_key).await {
                Ok(Some(meta)) if meta.bytes == bytes => {
                    return Ok(Some(CacheHeader {
                        count: meta.count,
                        updated_at: meta.updated_at,
                    }));
                }
                Ok(_) => log::debug!("Stale {meta_key}, scanning {data_key}"),
                Err(e) => log::debug!("Unreadable {meta_key}, scanning {data_key}: {e}"),
            }
        }

        self.read_json(&data_key).await
    }

    async fn locale_status(&self, locale: Locale) -> LocaleStatus {
        match self.read_header(locale).await {
            Ok(Some(header)) => LocaleStatus {
                present: true,
                count: header.count,
                last_refreshed: Some(header.updated_at),
            },
            Ok(None) => LocaleStatus::missing(),
            Err(e) => {
                log::warn!("Cache status unavailable for {locale}: {e}");
                LocaleStatus {
                    present: true,
                    count: 0,
                    last_refreshed: None,
                }
            }
        }
    }

    async fn check_locale(&self, locale: Locale) -> Result<LocaleCheck> {
        let Some(bytes) = self.read_bytes(&Self::locale_key(locale)).await? else {
            return Ok(LocaleCheck {
                present: false,
                count: 0,
                problems: Vec::new(),
            });
        };

        let file: CacheFile = match serde_json::from_slice(&bytes) {
            Ok(file) => file,
            Err(e) => {
                return Ok(LocaleCheck {
                    present: true,
                    count: 0,
                    problems: vec![format!("unreadable cache file: {e}")],
                });
            }
        };

        let mut problems = validate_records(&file.records, file.count);
        if file.locale != locale {
            problems.push(format!(
                "file holds {} records, expected {}",
                file.locale, locale
            ));
        }

        Ok(LocaleCheck {
            present: true,
            count: file.records.len(),
            problems,
        })
    }
}

#[async_trait]
impl BulletinStore for LocalStorage {
    async fn read(&self, locale: Locale, year: Option<YearFilter>) -> Result<Vec<BulletinRecord>> {
        let file = self.load(locale).await?.ok_or_else(|| {
            AppError::not_found(format!("No cached {} Bulletin Officiel yet", locale.language()))
        })?;

        Ok(match year {
            Some(filter) => filter.apply(file.records),
            None => file.records,
        })
    }

    async fn replace(&self, locale: Locale, records: Vec<BulletinRecord>) -> Result<CacheFile> {
        let mut seen = HashSet::new();
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.id)) {
            return Err(AppError::validation(format!(
                "refusing to cache {} collection with duplicate BoId {}",
                locale, dup.id
            )));
        }

        let file = CacheFile::new(locale, records);
        let bytes = serde_json::to_vec_pretty(&file)?;
        self.write_bytes(&Self::locale_key(locale), &bytes).await?;

        let meta = CacheMeta {
            count: file.count,
            updated_at: file.updated_at,
            bytes: bytes.len() as u64,
        };
        if let Err(e) = self.write_json(&Self::meta_key(locale), &meta).await {
            // Status falls back to scanning the data file.
            log::warn!("Could not write {}: {}", Self::meta_key(locale), e);
        }
        log::info!(
            "Cache replaced: {} records written to {}",
            file.count,
            Self::locale_key(locale)
        );
        Ok(file)
    }

    async fn status(&self) -> Result<BTreeMap<Locale, LocaleStatus>> {
        let mut status = BTreeMap::new();
        for locale in Locale::ALL {
            status.insert(locale, self.locale_status(locale).await);
        }
        Ok(status)
    }

    async fn check(&self) -> Result<CheckReport> {
        let mut locales = BTreeMap::new();
        for locale in Locale::ALL {
            let check = self.check_locale(locale).await?;
            if !check.is_valid() {
                log::warn!("Cache check failed for {}: {:?}", locale, check.problems);
            }
            locales.insert(locale, check);
        }
        Ok(CheckReport::new(locales))
    }
}
