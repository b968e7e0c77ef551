use std::{path::PathBuf, time::Instant};

use anyhow::Context;
use clap::{ArgAction, Parser};
use tokio::{
    fs::File,
    io::{stdin, stdout, AsyncReadExt, BufWriter},
    task::spawn_blocking,
};
use tracing::{debug, info};
use word_count_rs::mr::{
    logging::init_logging,
    pipeline::{sort_and_reduce, tokenize_files, tokenize_shard, write_aggregates},
    Aggregate, Normalization,
};

/// Word count in a single process: tokenize every input, sort the records by key, aggregate.
///
/// Gives the same totals as `mrtokenize | LC_ALL=C sort | mraggregate`.
#[derive(Debug, Parser)]
#[command(name = "mrlocal", version)]
struct Args {
    /// Input files, each tokenized in parallel as its own shard; stdin when none are given
    inputs: Vec<PathBuf>,
    /// Write the aggregates here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Tokenizer threads (defaults to one per core)
    #[arg(long)]
    threads: Option<usize>,
    /// How a line is cut into keys
    #[arg(long, value_enum, default_value_t = Normalization::Runs)]
    normalize: Normalization,
    /// Log more (-v debug, -vv trace); logs go to stderr
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to set up the tokenizer thread pool")?;
    }

    let started = Instant::now();
    let normalization = args.normalize;

    let tokens = if args.inputs.is_empty() {
        let mut contents = Vec::new();
        stdin()
            .read_to_end(&mut contents)
            .await
            .context("failed to read stdin")?;
        spawn_blocking(move || tokenize_shard(&contents, normalization)).await?
    } else {
        let inputs = args.inputs.clone();
        spawn_blocking(move || tokenize_files(&inputs, normalization)).await??
    };
    info!(
        shards = args.inputs.len().max(1),
        tokens = tokens.len(),
        "[Local] Tokenize phase finished"
    );

    let aggregates: Vec<Aggregate> = spawn_blocking(move || sort_and_reduce(tokens).collect()).await?;
    info!(aggregates = aggregates.len(), "[Local] Sort and aggregate phase finished");

    let written = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("failed to create output file {}", path.display()))?;
            let mut output = BufWriter::new(file);
            write_aggregates(&mut output, aggregates)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?
        }
        None => {
            let mut output = BufWriter::new(stdout());
            match write_aggregates(&mut output, aggregates).await {
                Ok(written) => written,
                Err(e) if e.is_broken_pipe() => {
                    debug!("[Local] Output closed early, stopping");
                    return Ok(());
                }
                Err(e) => return Err(e).context("failed to write aggregates"),
            }
        }
    };

    info!(written, elapsed = ?started.elapsed(), "[Local] Word count finished");
    Ok(())
}
