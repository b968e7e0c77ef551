//! The reduce stage: a key-sorted record stream in, one `(key, total)` per distinct key out.
//!
//! The aggregator keeps nothing but the key it is currently summing and the
//! running total, so its memory use is independent of the input size. That
//! only works because the input is required to present every record of a key
//! in one contiguous run, a guarantee that has to come from whoever sorted the
//! stream (an external sort, a shuffle service, or [`Sorted::sort`] locally).
//! The guarantee is carried in the type: the aggregator only accepts input
//! wrapped in [`Sorted`].
//!
//! The guarantee is never re-checked. If a key shows up in two separate runs
//! the aggregator emits two aggregates for it; noticing the repeat would need
//! memory proportional to the number of distinct keys.

use std::{convert::Infallible, iter::Fuse, pin::Pin};

use futures::{stream, Stream, StreamExt};
use rayon::slice::ParallelSliceMut;
use tracing::{debug, trace};

use crate::mr::{
    function::wc,
    record::{Aggregate, KeyValue},
};

/// A record source whose equal keys are known to be contiguous
#[derive(Debug)]
pub struct Sorted<I> {
    inner: I,
}

impl<I> Sorted<I> {
    /// Accept `inner` as sorted by key without checking it.
    ///
    /// The caller vouches that all records sharing a key arrive back to back,
    /// typically because the stream was produced by an external sort. Order
    /// within a run does not matter. Breaking the promise does not panic or
    /// error; it splits the totals of the offending key across several
    /// aggregates.
    pub fn assume_sorted(inner: I) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl Sorted<std::vec::IntoIter<KeyValue>> {
    /// Establish the guarantee locally by sorting `records` by key (byte order).
    ///
    /// The sort is parallel and unstable: records with equal keys may trade
    /// places, which the aggregator does not care about.
    pub fn sort(mut records: Vec<KeyValue>) -> Self {
        records.par_sort_unstable_by(|lhs, rhs| lhs.key().cmp(rhs.key()));
        Self::assume_sorted(records.into_iter())
    }
}

impl<I: Iterator<Item = KeyValue>> Sorted<I> {
    /// Fold the sorted records into per-key aggregates
    pub fn reduce(self) -> Reduce<I> {
        Reduce::new(self)
    }
}

/// The parse-or-drop stage in front of the aggregator: decode every wire
/// line, silently skipping the ones that are malformed
pub fn parse_records<I, L>(lines: I) -> impl Iterator<Item = KeyValue>
where
    I: IntoIterator<Item = L>,
    L: AsRef<[u8]>,
{
    lines.into_iter().filter_map(parse_record)
}

/// Decode a single wire line, `None` (and a trace event) when it is malformed
pub fn parse_record<L: AsRef<[u8]>>(line: L) -> Option<KeyValue> {
    let kv = KeyValue::parse_line(&line);
    if kv.is_none() {
        trace!(line = %String::from_utf8_lossy(line.as_ref()), "skipping malformed record");
    }
    kv
}

/// The aggregator's state machine.
///
/// `current_key` is `None` while idle (nothing seen yet, or just flushed) and
/// holds the key being summed while accumulating. One `Reducer` belongs to
/// exactly one key-sorted stream; independent partitions use independent
/// reducers.
#[derive(Debug, Default)]
pub struct Reducer {
    current_key: Option<String>,
    running_total: i64,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The key currently being summed, if any
    pub fn current_key(&self) -> Option<&str> {
        self.current_key.as_deref()
    }

    pub fn running_total(&self) -> i64 {
        self.running_total
    }

    /// Feed the next record, returning the finished aggregate of the
    /// previous key when `kv` starts a new run
    pub fn push(&mut self, kv: KeyValue) -> Option<Aggregate> {
        let (key, value) = kv.into_parts();
        if self.current_key.as_deref() == Some(key.as_str()) {
            self.running_total = wc::reduce(self.running_total, value);
            return None;
        }
        // Either the first record or a key transition: flush and restart
        let finished = self.finish();
        self.current_key = Some(key);
        self.running_total = value;
        finished
    }

    /// End of input: hand out the in-flight aggregate, if any, and go back to idle
    pub fn finish(&mut self) -> Option<Aggregate> {
        let key = self.current_key.take()?;
        let total = std::mem::take(&mut self.running_total);
        trace!(key = %key, total, "aggregate finalized");
        Some(Aggregate::new(key, total))
    }
}

/// Iterator adapter driving a [`Reducer`] over a [`Sorted`] record source
pub struct Reduce<I> {
    input: Fuse<I>,
    reducer: Reducer,
}

impl<I: Iterator<Item = KeyValue>> Reduce<I> {
    pub fn new(input: Sorted<I>) -> Self {
        Self {
            input: input.into_inner().fuse(),
            reducer: Reducer::new(),
        }
    }
}

impl<I: Iterator<Item = KeyValue>> Iterator for Reduce<I> {
    type Item = Aggregate;

    fn next(&mut self) -> Option<Aggregate> {
        loop {
            match self.input.next() {
                Some(kv) => {
                    if let Some(aggregate) = self.reducer.push(kv) {
                        return Some(aggregate);
                    }
                }
                // Idle reducers finish with nothing, so this also covers empty input
                None => return self.reducer.finish(),
            }
        }
    }
}

/// The asynchronous counterpart of [`Reduce`], for record streams that arrive over I/O
pub fn reduce_stream<S>(input: Sorted<S>) -> impl Stream<Item = Aggregate>
where
    S: Stream<Item = KeyValue>,
{
    let records = input.into_inner().map(Ok::<_, Infallible>);
    try_reduce_stream(Sorted::assume_sorted(records)).map(|aggregate| match aggregate {
        Ok(aggregate) => aggregate,
        Err(never) => match never {},
    })
}

/// Like [`reduce_stream`], for sources that can fail part way through.
///
/// An error is passed on and ends the stream. The key being summed when it
/// arrives is dropped, not emitted: its total is only known to be partial.
/// Aggregates emitted before the error are final.
pub fn try_reduce_stream<S, E>(input: Sorted<S>) -> impl Stream<Item = Result<Aggregate, E>>
where
    S: Stream<Item = Result<KeyValue, E>>,
{
    let input: Pin<Box<S>> = Box::pin(input.into_inner());
    stream::unfold(
        (input, Reducer::new(), false),
        |(mut input, mut reducer, done)| async move {
            if done {
                return None;
            }
            while let Some(kv) = input.next().await {
                match kv {
                    Ok(kv) => {
                        if let Some(aggregate) = reducer.push(kv) {
                            return Some((Ok(aggregate), (input, reducer, false)));
                        }
                    }
                    Err(e) => {
                        if let Some(key) = reducer.current_key() {
                            debug!(key, partial = reducer.running_total(), "input failed, dropping in-flight key");
                        }
                        return Some((Err(e), (input, Reducer::new(), true)));
                    }
                }
            }
            let last = reducer.finish()?;
            Some((Ok(last), (input, reducer, true)))
        },
    )
}
