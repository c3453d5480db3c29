use std::fmt;
use std::sync::Arc;

use crate::error::TransportError;

/// Channel status codes used by the firmware channel.
pub mod status {
    pub const OK: i32 = 0;
    pub const ENOENT: i32 = -2;
    pub const EIO: i32 = -5;
    pub const EINVAL: i32 = -22;
}

/// Identifier of the mailbox unit a channel is opened on.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusId(pub u32);

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mu{}", self.0)
    }
}

/// Whether a transport tolerates overlapping calls from several threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// Calls may overlap.
    Shared,
    /// Only one call may be in flight; the caller must serialize.
    Exclusive,
}

/// What the channel handed back for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Status reported by the channel for this call.
    pub status: i32,
    /// Response frame bytes.
    pub frame: Vec<u8>,
}

/// An open channel to the firmware.
///
/// `call` blocks until the firmware answers or the channel gives up; this crate adds no timeout
/// of its own.
pub trait Transport: Send + Sync {
    fn call(&self, request: &[u8]) -> Result<RawResponse, TransportError>;

    fn concurrency(&self) -> Concurrency {
        Concurrency::Exclusive
    }
}

/// Something channels can be opened on.
pub trait Bus {
    /// Discovers the mailbox unit assigned to this processor.
    fn default_bus(&self) -> Result<BusId, TransportError>;

    fn open(&self, bus: BusId) -> Result<Arc<dyn Transport>, TransportError>;
}

/// A platform without the firmware.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBus;

impl Bus for NoBus {
    fn default_bus(&self) -> Result<BusId, TransportError> {
        Err(TransportError::Unavailable)
    }

    fn open(&self, _bus: BusId) -> Result<Arc<dyn Transport>, TransportError> {
        Err(TransportError::Unavailable)
    }
}
