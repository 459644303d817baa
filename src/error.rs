//! Errors that abort a benchmark run.
//!
//! Per-operation failures (an insert that finds the key, a remove that
//! misses) are not errors: they are absorbed by the workload threads.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is outside of its admissible domain.
    #[error("invalid configuration: `{param}` = {value}: {reason}")]
    Config {
        param: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Prefill could not insert the requested number of entries.
    #[error(
        "initialization of {variant} failed: key {key} was rejected after \
         {inserted} of {requested} entries"
    )]
    Initialization {
        variant: String,
        key: u64,
        inserted: u64,
        requested: u64,
    },

    #[error("initialization of {0} failed: prefill thread panicked")]
    PrefillPanicked(String),

    #[error("invalid thread type: {0}")]
    UnsupportedThreadType(String),

    #[error("unknown benchmark variant: {0}")]
    UnknownVariant(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn config(param: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Error::Config {
            param,
            value: value.to_string(),
            reason,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
