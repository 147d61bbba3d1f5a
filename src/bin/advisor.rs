use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ccrkb::controls::{EmbeddingArgs, FacilityArgs, StoreArgs};
use ccrkb::{
    read_jsonl, telemetry, Advisor, AdvisorError, CorpusIndexer, EnrichedRecord, MemoryIndex,
    PgVectorIndex, VectorIndex, CANDIDATE_POOL, DEFAULT_DISPLAY_LIMIT,
};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "ccrkb-advisor",
    about = "List the CCR sections most relevant to a facility type"
)]
struct AdvisorCli {
    /// Facility type to look up; prompts on stdin when omitted or unsupported
    #[arg(long)]
    facility: Option<String>,

    /// Enriched JSONL to index in memory instead of querying pgvector
    #[arg(long, env = "CCRKB_CORPUS")]
    corpus: Option<PathBuf>,

    /// Number of ranked sections to display
    #[arg(long, default_value_t = DEFAULT_DISPLAY_LIMIT)]
    limit: usize,

    /// Candidates retrieved before ranking
    #[arg(long, env = "CCRKB_CANDIDATE_POOL", default_value_t = CANDIDATE_POOL)]
    pool_size: usize,

    #[command(flatten)]
    embedding: EmbeddingArgs,

    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    facilities: FacilityArgs,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AdvisorCli::parse();
    telemetry::init(cli.verbose);

    let catalog = Arc::new(cli.facilities.load()?);
    let embedder = cli.embedding.build()?;
    let index: Arc<dyn VectorIndex> = match &cli.corpus {
        Some(path) => {
            let index = MemoryIndex::new();
            let file = File::open(path).with_context(|| format!("failed to open {path:?}"))?;
            let corpus = read_jsonl::<EnrichedRecord, _>(BufReader::new(file))
                .context("failed to read corpus")?;
            if corpus.malformed > 0 {
                warn!(malformed = corpus.malformed, "skipped malformed corpus lines");
            }
            let report = CorpusIndexer::new(&*embedder, &index)
                .index(&corpus.records)
                .await
                .context("failed to index corpus in memory")?;
            info!(indexed = report.indexed, "loaded in-memory corpus");
            Arc::new(index)
        }
        None => {
            let database_url = cli.store.require_database_url()?;
            let index = PgVectorIndex::connect(database_url, cli.store.table_name()?)
                .await
                .context("failed to connect to Postgres")?;
            Arc::new(index)
        }
    };

    let advisor = Advisor::new(catalog, embedder, index)
        .with_pool_size(cli.pool_size)
        .with_display_limit(cli.limit);
    let stdin = io::stdin();
    let mut prompt = stdin.lock();
    let mut requested = cli.facility.clone();

    let result = loop {
        let facility = match requested.take() {
            Some(facility) => facility,
            None => read_facility(&mut prompt, &advisor.catalog().names())?,
        };
        match advisor.answer(&facility).await {
            Ok(result) => break result,
            Err(AdvisorError::Validation(err)) => {
                println!("Invalid input: {err}\n");
            }
            Err(err) => return Err(err).context("facility query failed"),
        }
    };

    println!("{result}");
    Ok(())
}

fn read_facility<R: BufRead>(input: &mut R, supported: &[&str]) -> Result<String> {
    print!("Enter facility type ({}): ", supported.join(", "));
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("no facility type provided");
    }
    Ok(line)
}
