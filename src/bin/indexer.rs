use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use ccrkb::controls::{EmbeddingArgs, StoreArgs};
use ccrkb::{
    read_jsonl, telemetry, CorpusIndexer, EnrichedRecord, IdPolicy, PgVectorIndex, VectorIndex,
};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum IdMode {
    /// `ccr:<source_url>`
    Url,
    /// `ccr_<line position>`
    Position,
}

impl From<IdMode> for IdPolicy {
    fn from(mode: IdMode) -> Self {
        match mode {
            IdMode::Url => IdPolicy::SourceUrl,
            IdMode::Position => IdPolicy::Position,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "ccrkb-index",
    about = "Embed enriched CCR records and upsert them into pgvector"
)]
struct IndexCli {
    /// Enriched records produced by ccrkb-enrich
    #[arg(
        long,
        env = "CCRKB_ENRICHED_OUTPUT",
        default_value = "ccr_enriched.jsonl"
    )]
    input: PathBuf,

    #[command(flatten)]
    embedding: EmbeddingArgs,

    #[command(flatten)]
    store: StoreArgs,

    /// How entry ids are derived
    #[arg(long, env = "CCRKB_ID_POLICY", value_enum, default_value = "url")]
    id_policy: IdMode,

    /// Vector column size; probed from the embedder when omitted
    #[arg(long, env = "CCRKB_VECTOR_DIMENSIONS")]
    dimensions: Option<usize>,

    /// Create the vector extension, table and index if missing
    #[arg(long, env = "CCRKB_PGVECTOR_PREPARE", default_value_t = true, action = clap::ArgAction::Set)]
    prepare_table: bool,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = IndexCli::parse();
    telemetry::init(cli.verbose);

    let input =
        File::open(&cli.input).with_context(|| format!("failed to open {:?}", cli.input))?;
    let report = read_jsonl::<EnrichedRecord, _>(BufReader::new(input))
        .context("failed to read enriched records")?;
    if report.malformed > 0 {
        warn!(malformed = report.malformed, "skipped malformed input lines");
    }
    if report.records.is_empty() {
        println!("No enriched records to index; nothing to do.");
        return Ok(());
    }

    let embedder = cli.embedding.build()?;
    let database_url = cli.store.require_database_url()?;
    let index = PgVectorIndex::connect(database_url, cli.store.table_name()?)
        .await
        .context("failed to connect to Postgres")?;

    if cli.prepare_table {
        let dimensions = match cli.dimensions.or(cli.embedding.openai_dimensions) {
            Some(dimensions) => dimensions,
            None => {
                let probe = embedder
                    .embed_one("California Code of Regulations")
                    .await
                    .context("failed to probe embedding dimensions")?;
                probe.len()
            }
        };
        index
            .prepare(dimensions)
            .await
            .context("failed to prepare vector table")?;
    }

    let indexed = CorpusIndexer::new(&*embedder, &index)
        .with_id_policy(cli.id_policy.into())
        .index(&report.records)
        .await
        .context("indexing failed")?;
    let total = index.count().await?;
    info!(table = %index.table().qualified(), total, "index updated");
    println!(
        "Indexed {} sections ({} skipped without content, {} malformed lines); table now holds {} entries.",
        indexed.indexed, indexed.skipped, report.malformed, total
    );
    Ok(())
}
