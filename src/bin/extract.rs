use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use ccrkb::{telemetry, write_jsonl, CitationExtractor, JsonlRecords, RawDocument};
use clap::Parser;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "ccrkb-extract",
    about = "Extract CCR title and section markers from crawled pages"
)]
struct ExtractCli {
    /// Crawled pages, one `{url, markdown}` object per line
    #[arg(long, env = "CCRKB_CRAWL_INPUT", default_value = "ccr_pages.jsonl")]
    input: PathBuf,

    /// Structured records output
    #[arg(
        long,
        env = "CCRKB_STRUCTURED_OUTPUT",
        default_value = "ccr_structured.jsonl"
    )]
    output: PathBuf,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = ExtractCli::parse();
    telemetry::init(cli.verbose);

    let input =
        File::open(&cli.input).with_context(|| format!("failed to open {:?}", cli.input))?;
    let output =
        File::create(&cli.output).with_context(|| format!("failed to create {:?}", cli.output))?;
    let mut writer = BufWriter::new(output);

    let extractor = CitationExtractor::new();
    let mut pages = JsonlRecords::<_, RawDocument>::new(BufReader::new(input));
    let mut written = 0usize;
    let mut empty = 0usize;
    for page in pages.by_ref() {
        let page = page.context("failed to read crawled pages")?;
        if page.markdown.trim().is_empty() {
            debug!(url = %page.url, "skipping page without text");
            empty += 1;
            continue;
        }
        let record = extractor.structure(&page);
        if record.section_number.is_none() {
            debug!(url = %record.source_url, "no section marker found");
        }
        write_jsonl(&mut writer, &record)
            .with_context(|| format!("failed to write {:?}", cli.output))?;
        written += 1;
    }
    writer.flush()?;

    info!(
        written,
        empty,
        malformed = pages.malformed(),
        output = ?cli.output,
        "extraction complete"
    );
    Ok(())
}
