//! Streaming word count: a tokenizer that emits `(key, 1)` records and an
//! aggregator that folds a key-sorted record stream into one total per key.

pub mod mr;
