use thiserror::Error;

use scu_api::ProtocolError;

use crate::transport::BusId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("no firmware channel on this platform")]
    Unavailable,
    #[error("failed to open {bus}: status {status}")]
    Open { bus: BusId, status: i32 },
    #[error("{op}: channel returned status {status}, expected {expected}")]
    Status {
        op: &'static str,
        status: i32,
        expected: i32,
    },
    #[error("channel closed")]
    Closed,
}

/// Failure of a single RPC as seen by its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
