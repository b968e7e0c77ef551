pub mod aggregator;
pub mod error;
pub mod function;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod tokenizer;

pub use aggregator::{parse_record, parse_records, reduce_stream, try_reduce_stream, Reduce, Reducer, Sorted};
pub use error::{Error, Result};
pub use function::Normalization;
pub use record::{Aggregate, KeyValue};
pub use tokenizer::{tokenize_lines, Tokenizer};
