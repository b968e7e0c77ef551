use std::{io, path::PathBuf};

use thiserror::Error;

/// Everything that can go wrong around the word count core.
///
/// Only I/O fails: malformed text and malformed records are skipped where they
/// are found and never reach this type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read input file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read input stream")]
    Input(#[source] io::Error),
    #[error("failed to write output")]
    Output(#[source] io::Error),
}

impl Error {
    /// The reading end of our output went away, e.g. `mrtokenize | head`
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Error::Output(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
