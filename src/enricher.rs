//! Citation and breadcrumb projections over structured records.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::record::{EnrichedRecord, StructuredRecord};

/// Separator placed between breadcrumb levels.
pub const BREADCRUMB_SEPARATOR: &str = " → ";

const UNKNOWN: &str = "Unknown";

/// Adds `citation`, `breadcrumb_path` and a fresh `retrieved_at` stamp.
pub fn enrich(record: StructuredRecord) -> EnrichedRecord {
    enrich_at(record, Utc::now())
}

/// Same as [`enrich`] with an explicit enrichment time.
pub fn enrich_at(record: StructuredRecord, at: DateTime<Utc>) -> EnrichedRecord {
    let citation = citation(&record);
    let breadcrumb_path = breadcrumb(&record);
    EnrichedRecord {
        record,
        citation,
        breadcrumb_path,
        retrieved_at: at.to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}

/// `"<title> CCR § <section>"`, with `Unknown` standing in for either gap.
pub fn citation(record: &StructuredRecord) -> String {
    let title = present(&record.title_number).unwrap_or(UNKNOWN);
    let section = present(&record.section_number).unwrap_or(UNKNOWN);
    format!("{title} CCR § {section}")
}

/// Hierarchy path from title down to section.
///
/// Title, division, chapter and article are omitted when absent. The section level is always
/// rendered, as `Section Unknown` when the number is missing.
pub fn breadcrumb(record: &StructuredRecord) -> String {
    let mut parts = Vec::with_capacity(5);

    if let Some(number) = present(&record.title_number) {
        match present(&record.title_name) {
            Some(name) => parts.push(format!("Title {number} ({name})")),
            None => parts.push(format!("Title {number}")),
        }
    }
    for (level, value) in [
        ("Division", &record.division),
        ("Chapter", &record.chapter),
        ("Article", &record.article),
    ] {
        if let Some(value) = present(value) {
            parts.push(format!("{level} {value}"));
        }
    }
    match (
        present(&record.section_number),
        present(&record.section_name),
    ) {
        (Some(number), Some(name)) => parts.push(format!("Section {number} – {name}")),
        (Some(number), None) => parts.push(format!("Section {number}")),
        (None, _) => parts.push(format!("Section {UNKNOWN}")),
    }

    parts.join(BREADCRUMB_SEPARATOR)
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
