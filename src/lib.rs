#![warn(missing_docs)]
//! Core library for the CCR knowledge base: citation extraction, enrichment, indexing and
//! facility relevance ranking.

pub mod advisor;
pub mod controls;
pub mod embedder;
pub mod enricher;
pub mod error;
pub mod extractor;
pub mod facility;
pub mod interchange;
pub mod ranker;
pub mod record;
pub mod store;
pub mod telemetry;

pub use advisor::{Advisor, CitationRow, QueryResult, CANDIDATE_POOL, DISCLAIMER};
pub use embedder::{Embedder, HashingEmbedder, OpenAiEmbedder};
pub use enricher::{breadcrumb, citation, enrich, enrich_at};
pub use error::{AdvisorError, CatalogError, InterchangeError, StoreError, ValidationError};
pub use extractor::{CitationExtractor, ExtractedFields, Extraction, SectionMarker, TitleMarker};
pub use facility::{normalize_facility, FacilityCatalog, FacilityProfile};
pub use interchange::{read_jsonl, write_jsonl, JsonlRecords, ReadReport};
pub use ranker::{
    explain, rank, score, RankedSections, Ranker, ScoredCandidate, DEFAULT_DISPLAY_LIMIT,
};
pub use record::{Candidate, EnrichedRecord, RawDocument, StructuredRecord};
pub use store::{
    CorpusIndexer, IdPolicy, IndexReport, IndexedEntry, MemoryIndex, PgVectorIndex, TableName,
    VectorIndex,
};
