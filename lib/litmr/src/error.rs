use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for collaborator loading, pipeline validation and runtime coordination.
#[derive(Debug, Error)]
pub enum Error {
    #[error("source '{}' is unavailable: {reason}", path.display())]
    SourceUnavailable { path: PathBuf, reason: String },
    #[error("pipeline error: {0}")]
    Pipeline(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("barrier '{phase}' timed out with {done}/{expected} participants")]
    BarrierTimeout {
        phase: String,
        done: usize,
        expected: usize,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
