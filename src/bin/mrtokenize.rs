use anyhow::Context;
use clap::{ArgAction, Parser};
use tokio::io::{stdin, stdout, BufReader, BufWriter};
use tracing::{debug, info};
use word_count_rs::mr::{logging::init_logging, pipeline::tokenize_stream, Normalization};

/// The map side of the word count: text lines on stdin, one `key<TAB>1` record per word on stdout.
/// Feed the output through a sort by key before `mraggregate`.
#[derive(Debug, Parser)]
#[command(name = "mrtokenize", version)]
struct Args {
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

    let input = BufReader::new(stdin());
    let mut output = BufWriter::new(stdout());

    match tokenize_stream(input, &mut output, args.normalize).await {
        Ok(stats) => {
            info!(lines = stats.lines, records = stats.records, "[Tokenize] Input exhausted");
            Ok(())
        }
        Err(e) if e.is_broken_pipe() => {
            // Nobody is reading any more, which is not our failure
            debug!("[Tokenize] Output closed early, stopping");
            Ok(())
        }
        Err(e) => Err(e).context("tokenize stage failed"),
    }
}
