// src/pipeline/validate.rs

//! Structural rules for a cached collection.

use std::collections::HashSet;

use crate::models::BulletinRecord;

/// List every structural problem found in a collection.
///
/// `stored_count` is the count recorded in the file header.
pub fn validate_records(records: &[BulletinRecord], stored_count: usize) -> Vec<String> {
    let mut problems = Vec::new();

    if stored_count != records.len() {
        problems.push(format!(
            "header count {} does not match {} records",
            stored_count,
            records.len()
        ));
    }

    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.id) {
            problems.push(format!("duplicate BoId {}", record.id));
        }
        if record.number.trim().is_empty() {
            problems.push(format!("BoId {} has an empty BoNum", record.id));
        }
        match url::Url::parse(&record.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => problems.push(format!(
                "BoId {} has a non-absolute BoUrl '{}'",
                record.id, record.url
            )),
        }
    }

    if let Some(pair) = records.windows(2).find(|w| w[0].date < w[1].date) {
        problems.push(format!(
            "records out of order: BoId {} ({}) listed before BoId {} ({})",
            pair[0].id, pair[0].date, pair[1].id, pair[1].date
        ));
    }

    problems
}
