//! The line-oriented wire format shared by every stage: one record per line,
//! `<key>\t<value>`, value rendered as a base-10 integer.

use std::fmt;

/// A single `(key, value)` record flowing from the tokenizer to the aggregator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyValue {
    key: String,
    value: i64,
}

impl KeyValue {
    pub fn new(key: String, value: i64) -> Self {
        Self { key, value }
    }

    /// The record every token occurrence turns into
    pub fn one(key: String) -> Self {
        Self::new(key, 1)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn into_parts(self) -> (String, i64) {
        (self.key, self.value)
    }

    /// Decode one wire line, returning `None` for anything malformed.
    ///
    /// The line is trimmed, then must hold exactly two tab-separated fields:
    /// a non-empty key and an integer value (surrounding whitespace and a
    /// leading sign are accepted). Lines that are not valid UTF-8, blank
    /// lines, lines with the wrong field count and non-integer values all
    /// decode to `None`; callers drop them.
    pub fn parse_line<L: AsRef<[u8]>>(line: L) -> Option<Self> {
        let line = std::str::from_utf8(line.as_ref()).ok()?.trim();
        let mut fields = line.split('\t');
        let (key, value) = (fields.next()?, fields.next()?);
        if fields.next().is_some() || key.is_empty() {
            return None;
        }
        let value = value.trim().parse::<i64>().ok()?;
        Some(Self::new(key.to_owned(), value))
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.value)
    }
}

/// The finalized total for one key, immutable once emitted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aggregate {
    key: String,
    total: i64,
}

impl Aggregate {
    pub fn new(key: String, total: i64) -> Self {
        Self { key, total }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn total(&self) -> i64 {
        self.total
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.total)
    }
}
