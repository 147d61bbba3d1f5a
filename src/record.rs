//! Record shapes passed between pipeline stages.
//!
//! Every stage reads and writes one JSON object per line. Optional hierarchy fields serialize
//! as `null` when extraction could not find them; `source_url` and `content_markdown` are
//! always present.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One crawled page as emitted by the crawl transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Page URL.
    pub url: String,
    /// Markdown (or HTML) body captured by the crawler.
    #[serde(default, alias = "markdown_text", alias = "content")]
    pub markdown: String,
}

impl RawDocument {
    /// Builds a raw document from its parts.
    pub fn new(url: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            markdown: markdown.into(),
        }
    }
}

/// Regulatory unit reconstructed from a single crawled page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredRecord {
    /// Title number, e.g. `17`.
    #[serde(default)]
    pub title_number: Option<String>,
    /// Title name, e.g. `Public Health`.
    #[serde(default)]
    pub title_name: Option<String>,
    /// Division identifier.
    #[serde(default)]
    pub division: Option<String>,
    /// Chapter identifier.
    #[serde(default)]
    pub chapter: Option<String>,
    /// Article identifier.
    #[serde(default)]
    pub article: Option<String>,
    /// Section number, e.g. `12345` or `1234.5`.
    #[serde(default)]
    pub section_number: Option<String>,
    /// Section heading text.
    #[serde(default)]
    pub section_name: Option<String>,
    /// Page the record was extracted from. Unique per record.
    pub source_url: String,
    /// Full page body as crawled.
    pub content_markdown: String,
    /// When the page was turned into this record (RFC 3339, UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawled_at: Option<String>,
}

impl StructuredRecord {
    /// Creates a record with only the mandatory fields set.
    pub fn new(source_url: impl Into<String>, content_markdown: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            content_markdown: content_markdown.into(),
            ..Self::default()
        }
    }
}

/// Structured record plus the derived citation projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Underlying structured fields.
    #[serde(flatten)]
    pub record: StructuredRecord,
    /// Compact citation, e.g. `17 CCR § 12345`.
    pub citation: String,
    /// Arrow-joined hierarchy path.
    pub breadcrumb_path: String,
    /// Enrichment timestamp (RFC 3339, UTC, `Z` suffix).
    pub retrieved_at: String,
}

/// Section-like record rebuilt from a vector index hit.
///
/// Index metadata is stringly typed, so every field is a `String` and an empty string means the
/// value was absent when the record was indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    /// Title number.
    pub title_number: String,
    /// Title name used by title-domain scoring rules.
    pub title_name: String,
    /// Section number.
    pub section_number: String,
    /// Section heading.
    pub section_name: String,
    /// Citation string computed at enrichment time.
    pub citation: String,
    /// Breadcrumb computed at enrichment time.
    pub breadcrumb_path: String,
    /// Source page.
    pub source_url: String,
    /// Body text used by content scoring rules.
    pub content: String,
}

impl Candidate {
    /// Rebuilds a candidate from flattened index metadata and the stored document text.
    pub fn from_metadata(metadata: &BTreeMap<String, String>, content: impl Into<String>) -> Self {
        let field = |key: &str| metadata.get(key).cloned().unwrap_or_default();
        Self {
            title_number: field("title_number"),
            title_name: field("title_name"),
            section_number: field("section_number"),
            section_name: field("section_name"),
            citation: field("citation"),
            breadcrumb_path: field("breadcrumb_path"),
            source_url: field("source_url"),
            content: content.into(),
        }
    }
}

impl From<&EnrichedRecord> for Candidate {
    fn from(enriched: &EnrichedRecord) -> Self {
        let record = &enriched.record;
        Self {
            title_number: record.title_number.clone().unwrap_or_default(),
            title_name: record.title_name.clone().unwrap_or_default(),
            section_number: record.section_number.clone().unwrap_or_default(),
            section_name: record.section_name.clone().unwrap_or_default(),
            citation: enriched.citation.clone(),
            breadcrumb_path: enriched.breadcrumb_path.clone(),
            source_url: record.source_url.clone(),
            content: record.content_markdown.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_document_accepts_alias_fields() {
        let doc: RawDocument =
            serde_json::from_str(r#"{"url":"https://x/1","markdown_text":"body"}"#).unwrap();
        assert_eq!(doc.markdown, "body");

        let doc: RawDocument = serde_json::from_str(r#"{"url":"https://x/2"}"#).unwrap();
        assert!(doc.markdown.is_empty());
    }

    #[test]
    fn enriched_record_serializes_flat_with_nulls() {
        let mut record = StructuredRecord::new("https://x/1", "text");
        record.title_number = Some("17".into());
        let enriched = EnrichedRecord {
            record,
            citation: "17 CCR § Unknown".into(),
            breadcrumb_path: "Title 17 → Section Unknown".into(),
            retrieved_at: "2024-01-01T00:00:00.000000Z".into(),
        };

        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value["title_number"], "17");
        assert!(value["division"].is_null());
        assert_eq!(value["source_url"], "https://x/1");
        assert_eq!(value["citation"], "17 CCR § Unknown");

        let back: EnrichedRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, enriched);
    }

    #[test]
    fn candidate_from_metadata_defaults_missing_keys() {
        let mut metadata = BTreeMap::new();
        metadata.insert("title_name".to_string(), "Public Health".to_string());
        let candidate = Candidate::from_metadata(&metadata, "kitchen");
        assert_eq!(candidate.title_name, "Public Health");
        assert_eq!(candidate.section_number, "");
        assert_eq!(candidate.content, "kitchen");
    }
}
