//! Channel side of the harness: the transport seam, the RPC client and an in-process firmware.

pub mod error;
pub use error::{RpcError, TransportError};

pub mod transport;
pub use transport::{status, Bus, BusId, Concurrency, NoBus, RawResponse, Transport};

pub mod client;
pub use client::RpcClient;

pub mod sim;
pub use sim::{Fault, SimBus, SimConfig, SimFirmware, SimRegion};
