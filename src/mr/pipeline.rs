//! Wiring the two stages to real input and output.
//!
//! The streaming helpers run one stage over a byte stream, which is how the
//! stages are deployed around an external sort (`mrtokenize | sort | mraggregate`).
//! The local helpers compose tokenize, sort and aggregate inside one process
//! for machines without a distributed sort; they give the same aggregates.

use std::{fmt::Display, io, path::PathBuf, pin::pin};

use futures::{future, stream, Stream, StreamExt};
use rayon::prelude::*;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Split};
use tracing::debug;

use crate::mr::{
    aggregator::{parse_record, try_reduce_stream, Reduce, Sorted},
    error::{Error, Result},
    function::Normalization,
    record::{Aggregate, KeyValue},
    tokenizer::tokenize_lines,
};

/// What one stage consumed and produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Input lines read, well-formed or not
    pub lines: u64,
    /// Records (tokenizer) or aggregates (aggregator) written
    pub records: u64,
}

/// Newline-delimited raw lines pulled off an async reader, counting as it goes
struct LineSource<R> {
    split: Split<R>,
    lines: u64,
}

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    fn new(reader: R) -> Self {
        Self {
            split: reader.split(b'\n'),
            lines: 0,
        }
    }

    async fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let line = self.split.next_segment().await?;
        if line.is_some() {
            self.lines += 1;
        }
        Ok(line)
    }

    /// The lines as a stream; a read error is its last item
    fn stream(&mut self) -> impl Stream<Item = io::Result<Vec<u8>>> + '_ {
        stream::unfold(Some(self), |source| async move {
            let source = source?;
            match source.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some(source))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

async fn write_line<W, T>(writer: &mut W, item: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Display,
{
    writer
        .write_all(format!("{}\n", item).as_bytes())
        .await
        .map_err(Error::Output)
}

/// Run the tokenizer over every line of `reader`, writing `key\t1` lines to `writer`
pub async fn tokenize_stream<R, W>(reader: R, writer: &mut W, normalization: Normalization) -> Result<StageStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut source = LineSource::new(reader);
    let mut records = 0;
    while let Some(line) = source.next_line().await.map_err(Error::Input)? {
        for kv in tokenize_lines([line], normalization) {
            write_line(writer, &kv).await?;
            records += 1;
        }
    }
    writer.flush().await.map_err(Error::Output)?;
    Ok(StageStats {
        lines: source.lines,
        records,
    })
}

/// Run the aggregator over the `key\tvalue` lines of `reader`, writing `key\ttotal` lines to `writer`.
///
/// `reader` must deliver the output of a sort by key; see [`Sorted`] for what
/// happens when it does not. Malformed lines are dropped before they reach the
/// aggregator. A read error fails the stage after the aggregates finished so
/// far have been written; the key that was still being summed is lost.
pub async fn aggregate_stream<R, W>(reader: R, writer: &mut W) -> Result<StageStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut source = LineSource::new(reader);
    let mut records = 0;
    let mut failure = None;
    {
        let parsed = source
            .stream()
            .filter_map(|line| future::ready(line.map(parse_record).transpose()));
        let mut aggregates = pin!(try_reduce_stream(Sorted::assume_sorted(parsed)));
        while let Some(aggregate) = aggregates.next().await {
            match aggregate {
                Ok(aggregate) => {
                    write_line(writer, &aggregate).await?;
                    records += 1;
                }
                Err(e) => failure = Some(e),
            }
        }
    }
    writer.flush().await.map_err(Error::Output)?;
    match failure {
        Some(e) => Err(Error::Input(e)),
        None => Ok(StageStats {
            lines: source.lines,
            records,
        }),
    }
}

/// Tokenize one in-memory shard of newline-delimited text
pub fn tokenize_shard(contents: &[u8], normalization: Normalization) -> Vec<KeyValue> {
    tokenize_lines(contents.split(|b| *b == b'\n'), normalization).collect()
}

/// Tokenize independent shards in parallel, one tokenizer per shard
pub fn tokenize_shards<S>(shards: &[S], normalization: Normalization) -> Vec<KeyValue>
where
    S: AsRef<[u8]> + Sync,
{
    shards
        .par_iter()
        .flat_map_iter(|shard| tokenize_lines(shard.as_ref().split(|b| *b == b'\n'), normalization))
        .collect()
}

/// Read and tokenize every file in `paths` in parallel, each file being its own shard
pub fn tokenize_files(paths: &[PathBuf], normalization: Normalization) -> Result<Vec<KeyValue>> {
    let shards = paths
        .par_iter()
        .map(|path| {
            let contents = std::fs::read(path).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            let tokens = tokenize_shard(&contents, normalization);
            debug!(path = %path.display(), bytes = contents.len(), tokens = tokens.len(), "tokenized shard");
            Ok(tokens)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(shards.into_iter().flatten().collect())
}

/// The local stand-in for the external sort followed by the aggregator
pub fn sort_and_reduce(tokens: Vec<KeyValue>) -> Reduce<std::vec::IntoIter<KeyValue>> {
    Sorted::sort(tokens).reduce()
}

/// Word count over in-memory shards, entirely in this process
pub fn word_count<S>(shards: &[S], normalization: Normalization) -> Vec<Aggregate>
where
    S: AsRef<[u8]> + Sync,
{
    sort_and_reduce(tokenize_shards(shards, normalization)).collect()
}

/// Write aggregates as `key\ttotal` lines, returning how many were written
pub async fn write_aggregates<W, I>(writer: &mut W, aggregates: I) -> Result<u64>
where
    W: AsyncWrite + Unpin,
    I: IntoIterator<Item = Aggregate>,
{
    let mut written = 0;
    for aggregate in aggregates {
        write_line(writer, &aggregate).await?;
        written += 1;
    }
    writer.flush().await.map_err(Error::Output)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use tokio::io::BufReader;

    use super::*;

    async fn run_tokenize(input: &[u8]) -> (String, StageStats) {
        let mut output = Vec::new();
        let stats = tokenize_stream(input, &mut output, Normalization::Runs).await.unwrap();
        (String::from_utf8(output).unwrap(), stats)
    }

    async fn run_aggregate(input: &[u8]) -> (String, StageStats) {
        let mut output = Vec::new();
        let stats = aggregate_stream(input, &mut output).await.unwrap();
        (String::from_utf8(output).unwrap(), stats)
    }

    #[tokio::test]
    async fn tokenize_stream_writes_wire_records() {
        let (output, stats) = run_tokenize(b"the quick fox\nthe fox runs\n").await;
        assert_eq!(output, "the\t1\nquick\t1\nfox\t1\nthe\t1\nfox\t1\nruns\t1\n");
        assert_eq!(stats, StageStats { lines: 2, records: 6 });
    }

    #[tokio::test]
    async fn tokenize_stream_tolerates_undecodable_bytes() {
        let (output, _) = run_tokenize(b"Hello, \xff\xfeHELLO!! hello.").await;
        assert_eq!(output, "hello\t1\nhello\t1\nhello\t1\n");
    }

    #[tokio::test]
    async fn aggregate_stream_sums_runs() {
        let (output, stats) = run_aggregate(b"fox\t1\nfox\t1\nquick\t1\nruns\t1\nthe\t1\nthe\t1\n").await;
        assert_eq!(output, "fox\t2\nquick\t1\nruns\t1\nthe\t2\n");
        assert_eq!(stats, StageStats { lines: 6, records: 4 });
    }

    #[tokio::test]
    async fn aggregate_stream_skips_malformed_lines() {
        let (output, _) = run_aggregate(b"x\t1\nnot\ta\tvalid\trecord\nx\t1\n\nx\tten\r\nx\t1").await;
        assert_eq!(output, "x\t3\n");
    }

    #[tokio::test]
    async fn aggregate_stream_loses_the_in_flight_key_on_read_error() {
        let reader = tokio_test::io::Builder::new()
            .read(b"a\t1\na\t1\nb\t1\nb\t1\n")
            .read_error(io::Error::new(io::ErrorKind::Other, "connection reset"))
            .build();
        let mut output = Vec::new();
        let result = aggregate_stream(BufReader::new(reader), &mut output).await;

        assert!(matches!(result, Err(Error::Input(_))));
        // `a` was closed by the arrival of `b`; `b` never saw the end of its run
        assert_eq!(String::from_utf8(output).unwrap(), "a\t2\n");
    }

    #[tokio::test]
    async fn tokenize_stream_reports_read_errors() {
        let reader = tokio_test::io::Builder::new()
            .read(b"the fox\n")
            .read_error(io::Error::new(io::ErrorKind::Other, "connection reset"))
            .build();
        let mut output = Vec::new();
        let result = tokenize_stream(BufReader::new(reader), &mut output, Normalization::Runs).await;

        assert!(matches!(result, Err(Error::Input(_))));
        assert_eq!(String::from_utf8(output).unwrap(), "the\t1\nfox\t1\n");
    }

    #[tokio::test]
    async fn empty_streams_produce_nothing() {
        assert_eq!(run_tokenize(b"").await, (String::new(), StageStats::default()));
        assert_eq!(run_aggregate(b"").await, (String::new(), StageStats::default()));
    }

    #[test]
    fn local_composition_matches_scenarios() {
        let output = word_count(&["the quick fox\nthe fox runs"], Normalization::Runs)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        assert_eq!(output, ["fox\t2", "quick\t1", "runs\t1", "the\t2"]);

        let output = word_count(&["Hello, HELLO!! hello."], Normalization::Runs);
        assert_eq!(output, [Aggregate::new("hello".to_string(), 3)]);

        assert!(word_count::<&str>(&[], Normalization::Runs).is_empty());
    }

    #[test]
    fn sharding_does_not_change_totals() {
        let whole = word_count(&["a b c\nb c\nc"], Normalization::Runs);
        let sharded = word_count(&["a b c", "b c", "c"], Normalization::Runs);
        assert_eq!(whole, sharded);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = tokenize_files(&[PathBuf::from("/definitely/not/here.txt")], Normalization::Runs).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
