use anyhow::Context;
use clap::{ArgAction, Parser};
use tokio::io::{stdin, stdout, BufReader, BufWriter};
use tracing::{debug, info};
use word_count_rs::mr::{logging::init_logging, pipeline::aggregate_stream};

/// The reduce side of the word count: `key<TAB>value` records on stdin, one `key<TAB>total` per key on stdout.
///
/// The input must already be sorted by key (`LC_ALL=C sort` does). Unsorted input is
/// not detected: a key whose records are not contiguous is reported once per run.
/// Malformed lines are skipped.
#[derive(Debug, Parser)]
#[command(name = "mraggregate", version)]
struct Args {
    /// Log more (-v debug, -vv trace); logs go to stderr
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let input = BufReader::new(stdin());
    let mut output = BufWriter::new(stdout());

    match aggregate_stream(input, &mut output).await {
        Ok(stats) => {
            info!(lines = stats.lines, aggregates = stats.records, "[Aggregate] Input exhausted");
            Ok(())
        }
        Err(e) if e.is_broken_pipe() => {
            debug!("[Aggregate] Output closed early, stopping");
            Ok(())
        }
        Err(e) => Err(e).context("aggregate stage failed"),
    }
}
