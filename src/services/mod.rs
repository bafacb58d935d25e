//! Service layer for the bulletin application.
//!
//! This module contains the upstream integrations:
//! - Identifier resolution from the listing page scripts (`ScriptResolver`)
//! - The gazette AJAX listing client (`GazetteClient`)
//! - PDF text extraction through pdf2text (`Pdf2TextExtractor`)

mod extractor;
mod gazette;
mod resolver;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BulletinRecord, Locale, YearFilter};

pub use extractor::{Pdf2TextExtractor, TextExtractor};
pub use gazette::{GazetteClient, parse_listing, parse_upstream_date};
pub use resolver::{CachedResolver, IdentifierResolver, ScriptResolver, extract_identifiers};

/// Live bulletin data, fetched from upstream on every call.
#[async_trait]
pub trait BulletinSource: Send + Sync {
    /// Most recent issue for a locale.
    async fn fetch_latest(&self, locale: Locale) -> Result<BulletinRecord>;

    /// Every listed issue, optionally restricted to one year.
    async fn fetch_all(&self, locale: Locale, year: Option<YearFilter>)
    -> Result<Vec<BulletinRecord>>;

    /// Full text of the most recent issue.
    async fn fetch_text(&self, locale: Locale) -> Result<String>;
}
