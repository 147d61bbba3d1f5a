//! Error types for the knowledge base pipeline.
//!
//! Parse gaps and skipped records are not errors: they surface as `Extraction::NotFound`,
//! `ReadReport::malformed` and `IndexReport::skipped`. The enums here cover what callers have
//! to react to.

use std::path::PathBuf;

use thiserror::Error;

/// A facility type that is not in the configured catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Input did not match any facility profile after trimming and lower-casing.
    #[error("unsupported facility type '{given}'; choose one of: {supported}")]
    UnknownFacility {
        /// The input as given by the caller.
        given: String,
        /// Comma-separated list of supported facility types.
        supported: String,
    },
}

/// Failures while reading or writing JSONL interchange files.
#[derive(Debug, Error)]
pub enum InterchangeError {
    /// Underlying reader or writer failed.
    #[error("i/o error at line {line}: {source}")]
    Io {
        /// 1-based line number (0 when writing).
        line: usize,
        /// Source error.
        #[source]
        source: std::io::Error,
    },
    /// A line could not be decoded into the expected record shape.
    #[error("malformed record at line {line}: {source}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// A record could not be encoded.
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failures raised by embedding or vector index backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Postgres driver error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    /// Backend returned a different number of vectors than inputs.
    #[error("embedder returned {found} vectors for {expected} inputs")]
    EmbeddingCount {
        /// Inputs submitted.
        expected: usize,
        /// Vectors received.
        found: usize,
    },
    /// A vector did not match the dimension the index was prepared with.
    #[error("vector dimension {found} does not match index dimension {expected}")]
    Dimension {
        /// Dimension of the index.
        expected: usize,
        /// Dimension of the offending vector.
        found: usize,
    },
    /// Any other backend failure (HTTP, task join, configuration).
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Failures while loading a facility catalog override.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog file could not be read.
    #[error("failed to read facility catalog {path:?}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Source error.
        #[source]
        source: std::io::Error,
    },
    /// Catalog file is not valid TOML for the profile schema.
    #[error("invalid facility catalog: {0}")]
    Parse(#[from] toml::de::Error),
    /// The catalog defines no facility types.
    #[error("facility catalog defines no facility types")]
    Empty,
    /// An entry has no facility name after normalization.
    #[error("facility catalog entry has a blank name")]
    BlankName,
    /// Two entries normalize to the same facility key.
    #[error("facility type '{0}' is defined more than once")]
    Duplicate(String),
}

/// Failures surfaced by `Advisor::answer`.
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// The facility type was rejected before any retrieval happened.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Embedding or retrieval failed.
    #[error("retrieval failed: {0}")]
    Store(#[from] StoreError),
}
