use std::io;

use thiserror::Error;

/// Result alias used by every fallible operation of the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or running a counting pass.
///
/// Source read failures during a run are not returned through this type directly:
/// they are carried by [`Ingestion::Interrupted`](crate::counter::Ingestion::Interrupted)
/// so the run still produces an estimate over the records read before the failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration {name}: {message}")]
    InvalidConfig { name: &'static str, message: String },

    #[error("i/o error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} worker(s) stopped without reporting")]
    WorkerLost(usize),

    #[error("chunk reader panicked")]
    ProducerPanicked,
}

impl Error {
    pub(crate) fn invalid_config(name: &'static str, message: impl Into<String>) -> Error {
        Error::InvalidConfig {
            name,
            message: message.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Error {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}
