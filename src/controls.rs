//! Command-line argument groups shared by the pipeline binaries.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use crate::embedder::{Embedder, HashingEmbedder, OpenAiEmbedder};
use crate::facility::FacilityCatalog;
use crate::store::TableName;

/// Which embedding backend to use.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings` endpoint.
    Openai,
    /// Local feature-hashing embedder (no network).
    Hashing,
}

/// Embedding backend settings.
#[derive(Args, Debug, Clone)]
pub struct EmbeddingArgs {
    /// Embedding backend
    #[arg(long, env = "CCRKB_EMBEDDER", value_enum, default_value = "openai")]
    pub embedder: EmbeddingBackend,

    /// OpenAI API key used for embedding calls
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Embedding model identifier
    #[arg(
        long,
        env = "CCRKB_OPENAI_MODEL",
        default_value = "text-embedding-3-small"
    )]
    pub openai_model: String,

    /// Optional dimension override when supported by the model
    #[arg(long, env = "CCRKB_OPENAI_DIMENSIONS")]
    pub openai_dimensions: Option<usize>,

    /// Base URL for the OpenAI-compatible API
    #[arg(
        long,
        env = "CCRKB_OPENAI_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_base_url: String,

    /// Max inputs per embedding request
    #[arg(long, env = "CCRKB_EMBED_BATCH", default_value_t = 32)]
    pub batch_size: usize,

    /// Max seconds to wait for each embedding request
    #[arg(long, env = "CCRKB_OPENAI_TIMEOUT_SECS", default_value_t = 30)]
    pub openai_timeout_secs: u64,

    /// Retries for rate limits or transient errors
    #[arg(long, env = "CCRKB_OPENAI_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: usize,

    /// Vector size produced by the hashing embedder
    #[arg(long, env = "CCRKB_HASHING_DIMENSIONS", default_value_t = 256)]
    pub hashing_dimensions: usize,
}

impl EmbeddingArgs {
    /// Builds the selected embedder.
    pub fn build(&self) -> Result<Arc<dyn Embedder>> {
        match self.embedder {
            EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(self.hashing_dimensions))),
            EmbeddingBackend::Openai => {
                let key = self
                    .openai_api_key
                    .as_deref()
                    .context("OPENAI_API_KEY must be set for the openai embedder")?;
                let embedder = OpenAiEmbedder::new(
                    key,
                    &self.openai_base_url,
                    self.openai_model.clone(),
                    self.openai_dimensions,
                    Duration::from_secs(self.openai_timeout_secs.max(1)),
                    self.max_retries,
                    self.batch_size,
                )?;
                Ok(Arc::new(embedder))
            }
        }
    }
}

/// pgvector connection settings.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Postgres connection string (postgres://...)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Schema for the vector table
    #[arg(long, env = "CCRKB_PGVECTOR_SCHEMA", default_value = "public")]
    pub schema: String,

    /// Table storing indexed sections
    #[arg(long, env = "CCRKB_PGVECTOR_TABLE", default_value = "ccr_sections")]
    pub table: String,
}

impl StoreArgs {
    /// Validated table name.
    pub fn table_name(&self) -> Result<TableName> {
        TableName::new(self.schema.clone(), self.table.clone())
    }

    /// Connection string, required when talking to Postgres.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to use the pgvector store")
    }
}

/// Facility profile settings.
#[derive(Args, Debug, Clone)]
pub struct FacilityArgs {
    /// TOML file replacing the built-in facility profiles
    #[arg(long, env = "CCRKB_FACILITIES")]
    pub facilities: Option<PathBuf>,
}

impl FacilityArgs {
    /// Loads the override file or falls back to the built-in catalog.
    pub fn load(&self) -> Result<FacilityCatalog> {
        match &self.facilities {
            Some(path) => FacilityCatalog::from_path(path)
                .with_context(|| format!("failed to load facility profiles from {path:?}")),
            None => Ok(FacilityCatalog::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        embedding: EmbeddingArgs,
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        facilities: FacilityArgs,
    }

    #[test]
    fn hashing_backend_needs_no_key() {
        let cli = TestCli::parse_from(["test", "--embedder", "hashing", "--hashing-dimensions", "8"]);
        assert_eq!(cli.embedding.embedder, EmbeddingBackend::Hashing);
        assert_eq!(cli.embedding.batch_size, 32);
        assert!(cli.embedding.build().is_ok());
        assert_eq!(cli.store.table_name().unwrap().qualified(), "\"public\".\"ccr_sections\"");
        assert!(cli.facilities.load().is_ok());
    }

    #[test]
    fn openai_backend_requires_key() {
        let args = EmbeddingArgs {
            embedder: EmbeddingBackend::Openai,
            openai_api_key: None,
            openai_model: "m".into(),
            openai_dimensions: None,
            openai_base_url: "https://api.openai.com/v1".into(),
            batch_size: 4,
            openai_timeout_secs: 1,
            max_retries: 1,
            hashing_dimensions: 8,
        };
        assert!(args.build().is_err());
    }
}
