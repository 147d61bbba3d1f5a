use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use ccrkb::{enrich, telemetry, write_jsonl, JsonlRecords, StructuredRecord};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "ccrkb-enrich",
    about = "Attach citations and breadcrumb paths to structured CCR records"
)]
struct EnrichCli {
    /// Structured records produced by ccrkb-extract
    #[arg(
        long,
        env = "CCRKB_STRUCTURED_OUTPUT",
        default_value = "ccr_structured.jsonl"
    )]
    input: PathBuf,

    /// Enriched records output
    #[arg(
        long,
        env = "CCRKB_ENRICHED_OUTPUT",
        default_value = "ccr_enriched.jsonl"
    )]
    output: PathBuf,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = EnrichCli::parse();
    telemetry::init(cli.verbose);

    let input =
        File::open(&cli.input).with_context(|| format!("failed to open {:?}", cli.input))?;
    let output =
        File::create(&cli.output).with_context(|| format!("failed to create {:?}", cli.output))?;
    let mut writer = BufWriter::new(output);

    let mut records = JsonlRecords::<_, StructuredRecord>::new(BufReader::new(input));
    let mut written = 0usize;
    for record in records.by_ref() {
        let record = record.context("failed to read structured records")?;
        write_jsonl(&mut writer, &enrich(record))
            .with_context(|| format!("failed to write {:?}", cli.output))?;
        written += 1;
    }
    writer.flush()?;

    info!(
        written,
        malformed = records.malformed(),
        output = ?cli.output,
        "enrichment complete"
    );
    Ok(())
}
