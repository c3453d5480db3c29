//! Wire definitions of the system-controller RPC protocol.
//!
//! Every frame is a sequence of little-endian 32-bit words. The first word is an [`RpcHeader`],
//! the rest is an operation-specific payload. Each probed firmware call is described by a type
//! implementing [`Operation`], which owns the request and response layouts of that call.

pub mod error;
pub use error::ProtocolError;

pub mod header;
pub use header::{RpcHeader, Service, HEADER_WORDS, RPC_VERSION};

pub mod message;
pub use message::RpcMessage;

pub mod operation;
pub use operation::Operation;

pub mod misc;
pub mod rm;
pub mod seco;
