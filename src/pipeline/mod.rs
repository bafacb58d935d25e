//! Pipeline entry points for cache operations.
//!
//! - `run_refresh`: Re-fetch both locales and replace their cache files
//! - `validate_records`: Structural checks behind the cache self-check

pub mod refresh;
pub mod validate;

pub use refresh::{RefreshOutcome, RefreshedLocale, run_refresh};
pub use validate::validate_records;
