//! Corpus store: turns enriched records into vector index entries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::embedder::Embedder;
use crate::error::StoreError;
use crate::record::{Candidate, EnrichedRecord};

pub mod memory;
pub mod pgvector;

pub use memory::MemoryIndex;
pub use pgvector::{PgVectorIndex, TableName};

/// One row of the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEntry {
    /// Stable identifier; re-indexing the same record overwrites this entry.
    pub id: String,
    /// Embedding of `content`.
    pub embedding: Vec<f32>,
    /// Document text.
    pub content: String,
    /// Flattened record fields, all strings.
    pub metadata: BTreeMap<String, String>,
}

/// Nearest-neighbor store holding indexed entries.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts or replaces entries by id.
    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<(), StoreError>;

    /// Returns up to `k` entries closest to `vector`, nearest first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Candidate>, StoreError>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// How entry ids are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdPolicy {
    /// `ccr:<source_url>`; stable even if the input file is reordered.
    #[default]
    SourceUrl,
    /// `ccr_<n>` from the record's position in the input.
    Position,
}

impl IdPolicy {
    /// Id for the record at `position`.
    pub fn id_for(&self, position: usize, record: &EnrichedRecord) -> String {
        match self {
            Self::SourceUrl => format!("ccr:{}", record.record.source_url),
            Self::Position => format!("ccr_{position}"),
        }
    }
}

/// Flattens an enriched record into index metadata.
///
/// The index cannot store nulls, so absent fields become empty strings.
pub fn flatten_metadata(enriched: &EnrichedRecord) -> BTreeMap<String, String> {
    let record = &enriched.record;
    let optional = [
        ("title_number", &record.title_number),
        ("title_name", &record.title_name),
        ("division", &record.division),
        ("chapter", &record.chapter),
        ("article", &record.article),
        ("section_number", &record.section_number),
        ("section_name", &record.section_name),
    ];
    let mut metadata: BTreeMap<String, String> = optional
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.clone().unwrap_or_default()))
        .collect();
    metadata.insert("citation".into(), enriched.citation.clone());
    metadata.insert("breadcrumb_path".into(), enriched.breadcrumb_path.clone());
    metadata.insert("source_url".into(), record.source_url.clone());
    metadata.insert("retrieved_at".into(), enriched.retrieved_at.clone());
    metadata
}

/// Counts from one indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Entries upserted.
    pub indexed: usize,
    /// Records skipped because they had no content.
    pub skipped: usize,
}

/// Embeds enriched records and upserts them into a [`VectorIndex`].
pub struct CorpusIndexer<'a, E: ?Sized, V: ?Sized> {
    embedder: &'a E,
    index: &'a V,
    id_policy: IdPolicy,
    batch_size: usize,
}

impl<'a, E, V> CorpusIndexer<'a, E, V>
where
    E: Embedder + ?Sized,
    V: VectorIndex + ?Sized,
{
    /// Uses the embedder's preferred batch size and source-URL ids.
    pub fn new(embedder: &'a E, index: &'a V) -> Self {
        Self {
            embedder,
            index,
            id_policy: IdPolicy::default(),
            batch_size: embedder.batch_size().max(1),
        }
    }

    /// Overrides the id policy.
    pub fn with_id_policy(mut self, id_policy: IdPolicy) -> Self {
        self.id_policy = id_policy;
        self
    }

    /// Overrides how many records are embedded and upserted together.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Indexes `records`, skipping those without content.
    ///
    /// Each batch is one upsert; a failed batch aborts the run but earlier batches stay
    /// written.
    pub async fn index(&self, records: &[EnrichedRecord]) -> Result<IndexReport, StoreError> {
        let mut report = IndexReport::default();
        let mut pending: Vec<(String, &EnrichedRecord)> = Vec::with_capacity(self.batch_size);

        for (position, record) in records.iter().enumerate() {
            if record.record.content_markdown.trim().is_empty() {
                debug!(url = %record.record.source_url, "skipping record without content");
                report.skipped += 1;
                continue;
            }
            pending.push((self.id_policy.id_for(position, record), record));
            if pending.len() >= self.batch_size {
                report.indexed += self.flush(&mut pending).await?;
            }
        }
        report.indexed += self.flush(&mut pending).await?;

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            "indexing complete"
        );
        Ok(report)
    }

    async fn flush(&self, pending: &mut Vec<(String, &EnrichedRecord)>) -> Result<usize, StoreError> {
        if pending.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = pending
            .iter()
            .map(|(_, record)| record.record.content_markdown.clone())
            .collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(StoreError::EmbeddingCount {
                expected: texts.len(),
                found: vectors.len(),
            });
        }

        let entries: Vec<IndexedEntry> = pending
            .drain(..)
            .zip(vectors)
            .zip(texts)
            .map(|(((id, record), embedding), content)| IndexedEntry {
                id,
                embedding,
                content,
                metadata: flatten_metadata(record),
            })
            .collect();
        self.index.upsert(&entries).await?;
        debug!(batch = entries.len(), "upserted batch");
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::enricher::enrich;
    use crate::record::StructuredRecord;

    fn enriched(url: &str, content: &str) -> EnrichedRecord {
        let mut record = StructuredRecord::new(url, content);
        record.title_number = Some("17".into());
        record.section_number = Some("1".into());
        enrich(record)
    }

    #[test]
    fn metadata_has_no_gaps() {
        let metadata = flatten_metadata(&enriched("https://ccr/1", "text"));
        assert_eq!(metadata["title_number"], "17");
        assert_eq!(metadata["division"], "");
        assert_eq!(metadata["title_name"], "");
        assert_eq!(metadata["citation"], "17 CCR § 1");
        assert_eq!(metadata.len(), 11);
    }

    #[test]
    fn id_policies_are_stable() {
        let record = enriched("https://ccr/1", "text");
        assert_eq!(IdPolicy::SourceUrl.id_for(7, &record), "ccr:https://ccr/1");
        assert_eq!(IdPolicy::Position.id_for(7, &record), "ccr_7");
    }

    #[tokio::test]
    async fn indexing_twice_does_not_duplicate() {
        let embedder = HashingEmbedder::new(32);
        let index = MemoryIndex::new();
        let corpus = vec![
            enriched("https://ccr/1", "food sanitation"),
            enriched("https://ccr/2", "pesticide use"),
            enriched("https://ccr/3", "fire exits"),
        ];

        let indexer = CorpusIndexer::new(&embedder, &index).with_batch_size(2);
        indexer.index(&corpus).await.unwrap();
        let first = index.count().await.unwrap();
        indexer.index(&corpus).await.unwrap();
        assert_eq!(index.count().await.unwrap(), first);
        assert_eq!(first, 3);
    }

    #[tokio::test]
    async fn records_without_content_are_skipped() {
        let embedder = HashingEmbedder::new(32);
        let index = MemoryIndex::new();
        let corpus = vec![
            enriched("https://ccr/1", "food"),
            enriched("https://ccr/2", "   "),
            enriched("https://ccr/3", "farm"),
        ];

        let report = CorpusIndexer::new(&embedder, &index)
            .with_id_policy(IdPolicy::Position)
            .index(&corpus)
            .await
            .unwrap();
        assert_eq!(
            report,
            IndexReport {
                indexed: 2,
                skipped: 1
            }
        );
        assert_eq!(index.ids(), ["ccr_0", "ccr_2"]);
    }
}
