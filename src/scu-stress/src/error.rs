use std::io;
use std::path::PathBuf;

use thiserror::Error;

use scu_api::ProtocolError;
use scu_ipc::{RpcError, TransportError};

/// A probe answered differently from the first answer recorded for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{probe}: result mismatch, observed {observed}, expected {expected}")]
pub struct Mismatch {
    pub probe: &'static str,
    pub expected: String,
    pub observed: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field} must be at least 1, got {value}")]
    ZeroCount { field: &'static str, value: u64 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Mismatch(#[from] Mismatch),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] io::Error),
    #[error("worker {0} panicked")]
    Panicked(usize),
}

impl From<RpcError> for Error {
    fn from(other: RpcError) -> Self {
        match other {
            RpcError::Transport(e) => Error::Transport(e),
            RpcError::Protocol(e) => Error::Protocol(e),
        }
    }
}

impl Error {
    #[inline]
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Error::Mismatch(_))
    }
}
