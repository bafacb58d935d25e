// src/models/bulletin.rs

//! Bulletin Officiel data structures.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Published language of the gazette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Locale {
    Fr,
    Ar,
}

impl Locale {
    /// Both locales, French first.
    pub const ALL: [Locale; 2] = [Locale::Fr, Locale::Ar];

    /// Uppercase code used in paths and JSON keys.
    pub fn code(&self) -> &'static str {
        match self {
            Locale::Fr => "FR",
            Locale::Ar => "AR",
        }
    }

    /// Path of the public listing page on the gazette site.
    pub fn listing_path(&self) -> &'static str {
        match self {
            Locale::Fr => "/BulletinOfficiel.aspx",
            Locale::Ar => "/arabe/BulletinOfficiel.aspx",
        }
    }

    /// Identifiers known to work when the listing page cannot be scraped.
    pub fn fallback_identifiers(&self) -> ResolvedIdentifiers {
        match self {
            Locale::Fr => ResolvedIdentifiers::new(2873, 775),
            Locale::Ar => ResolvedIdentifiers::new(3111, 847),
        }
    }

    /// Human-readable language name for messages.
    pub fn language(&self) -> &'static str {
        match self {
            Locale::Fr => "French",
            Locale::Ar => "Arabic",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FR" => Ok(Locale::Fr),
            "AR" => Ok(Locale::Ar),
            other => Err(AppError::invalid(format!(
                "unsupported locale '{other}', expected FR or AR"
            ))),
        }
    }
}

/// Year selection for listing endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearFilter {
    Year(i32),
    /// Resolved to the current calendar year when applied
    Current,
}

impl YearFilter {
    /// Concrete year this filter selects.
    pub fn year(&self) -> i32 {
        match self {
            YearFilter::Year(year) => *year,
            YearFilter::Current => Local::now().year(),
        }
    }

    /// Keep only the records published in the selected year.
    pub fn apply(&self, records: Vec<BulletinRecord>) -> Vec<BulletinRecord> {
        let year = self.year();
        records
            .into_iter()
            .filter(|record| record.date.year() == year)
            .collect()
    }
}

impl FromStr for YearFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("current") {
            return Ok(YearFilter::Current);
        }
        if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(year) = s.parse() {
                return Ok(YearFilter::Year(year));
            }
        }
        Err(AppError::invalid(format!(
            "invalid year '{s}', expected a four-digit year or 'current'"
        )))
    }
}

/// Parse an optional `year` query value; blank means no filter.
pub fn parse_year(raw: Option<&str>) -> Result<Option<YearFilter>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

/// One gazette issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinRecord {
    /// Upstream-assigned identifier, unique per locale
    #[serde(rename = "BoId")]
    pub id: i64,

    /// Issue number as published
    #[serde(rename = "BoNum")]
    pub number: String,

    /// Publication date
    #[serde(rename = "BoDate")]
    pub date: NaiveDate,

    /// Absolute URL of the issue PDF
    #[serde(rename = "BoUrl")]
    pub url: String,
}

/// Pick the most recent record; the earliest listed wins on ties.
pub fn latest(records: &[BulletinRecord]) -> Option<&BulletinRecord> {
    records.iter().fold(None, |best, record| match best {
        Some(current) if current.date >= record.date => Some(current),
        _ => Some(record),
    })
}

/// Identifiers the gazette AJAX backend expects in its request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIdentifiers {
    pub module_id: u32,
    pub tab_id: u32,
}

impl ResolvedIdentifiers {
    pub fn new(module_id: u32, tab_id: u32) -> Self {
        Self { module_id, tab_id }
    }
}
