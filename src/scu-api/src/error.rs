use thiserror::Error;

use crate::header::{Service, RPC_VERSION};

/// A frame whose shape does not match what the protocol or the operation expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,
    #[error("frame of {0} bytes is not a whole number of words")]
    Unaligned(usize),
    #[error("header declares {declared} words but {actual} were transferred")]
    SizeMismatch { declared: usize, actual: usize },
    #[error("unsupported protocol version {0}, expected {RPC_VERSION}")]
    Version(u8),
    #[error("payload of {0} words does not fit in a frame")]
    TooLong(usize),
    #[error("{op}: frame addressed to {got}, expected {expected}")]
    ServiceMismatch {
        op: &'static str,
        expected: Service,
        got: Service,
    },
    #[error("{op}: expected a {expected}-word frame, got {got} words")]
    UnexpectedLength {
        op: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{op}: invalid {field} {value:#x}")]
    InvalidField {
        op: &'static str,
        field: &'static str,
        value: u32,
    },
}
