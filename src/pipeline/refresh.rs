// src/pipeline/refresh.rs

//! Cache refresh: re-fetch every locale from upstream and replace its file.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Locale;
use crate::services::BulletinSource;
use crate::storage::BulletinStore;

/// Result of a refresh for one locale.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedLocale {
    pub count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Summary of a refresh run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshOutcome {
    pub refreshed: BTreeMap<Locale, RefreshedLocale>,
    /// Locales whose previous cache file was kept, with the reason
    pub failed: BTreeMap<Locale, String>,
}

impl RefreshOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Refresh every locale; a failing locale keeps its previous file.
pub async fn run_refresh(source: &dyn BulletinSource, store: &dyn BulletinStore) -> RefreshOutcome {
    let mut outcome = RefreshOutcome::default();

    for locale in Locale::ALL {
        let result = match source.fetch_all(locale, None).await {
            Ok(records) => store.replace(locale, records).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(file) => {
                outcome.refreshed.insert(
                    locale,
                    RefreshedLocale {
                        count: file.count,
                        updated_at: file.updated_at,
                    },
                );
            }
            Err(e) => {
                log::error!("Refresh of {} failed: {}", locale, e);
                outcome.failed.insert(locale, e.to_string());
            }
        }
    }

    log::info!(
        "Refresh finished: {} refreshed, {} failed",
        outcome.refreshed.len(),
        outcome.failed.len()
    );
    outcome
}
