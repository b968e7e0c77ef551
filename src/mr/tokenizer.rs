//! The map stage: raw text lines in, `(key, 1)` records out.
//!
//! A tokenizer holds no state beyond the tokens of the line it is currently
//! draining, so any number of them can run side by side over disjoint shards
//! of the input. Output order follows input order but carries no meaning;
//! the aggregator only sees it after the external sort.

use crate::mr::{
    function::{wc, Normalization},
    record::KeyValue,
};

/// Lazily turns a sequence of lines into `(key, 1)` records
pub struct Tokenizer<I> {
    lines: I,
    normalization: Normalization,
    /// The records of the line currently being drained
    pending: std::vec::IntoIter<KeyValue>,
}

impl<I, L> Tokenizer<I>
where
    I: Iterator<Item = L>,
    L: AsRef<[u8]>,
{
    pub fn new(lines: I, normalization: Normalization) -> Self {
        Self {
            lines,
            normalization,
            pending: Vec::new().into_iter(),
        }
    }
}

impl<I, L> Iterator for Tokenizer<I>
where
    I: Iterator<Item = L>,
    L: AsRef<[u8]>,
{
    type Item = KeyValue;

    fn next(&mut self) -> Option<KeyValue> {
        loop {
            if let Some(kv) = self.pending.next() {
                return Some(kv);
            }
            // Lines without a single key just fall through to the next one
            let line = self.lines.next()?;
            self.pending = wc::map(line.as_ref(), self.normalization).into_iter();
        }
    }
}

/// Tokenize every line of `lines`, see [`Tokenizer`]
pub fn tokenize_lines<I, L>(lines: I, normalization: Normalization) -> Tokenizer<I::IntoIter>
where
    I: IntoIterator<Item = L>,
    L: AsRef<[u8]>,
{
    Tokenizer::new(lines.into_iter(), normalization)
}
