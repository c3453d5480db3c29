use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use scu_api::{Operation, RpcMessage};

use crate::error::{RpcError, TransportError};
use crate::transport::{Concurrency, Transport};

/// Issues typed RPCs over a shared channel.
///
/// One client is shared by every worker. When the transport cannot take overlapping calls, each
/// call is serialized by the client; the lock covers a single call, never a sequence of them.
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    gate: Option<Mutex<()>>,
    calls: AtomicU64,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let gate = match transport.concurrency() {
            Concurrency::Shared => None,
            Concurrency::Exclusive => Some(Mutex::new(())),
        };
        RpcClient {
            transport,
            gate,
            calls: AtomicU64::new(0),
        }
    }

    /// Sends one request and waits for its response. Failures are returned as they are; nothing
    /// is retried.
    pub fn call<O: Operation>(&self, req: &O::Request) -> Result<O::Response, RpcError> {
        let request = O::encode_request(req)?.to_bytes();

        let raw = {
            let _guard = self
                .gate
                .as_ref()
                .map(|gate| gate.lock().unwrap_or_else(PoisonError::into_inner));
            self.transport.call(&request)?
        };
        self.calls.fetch_add(1, Ordering::Relaxed);

        if raw.status != O::EXPECTED_STATUS {
            tracing::debug!(op = O::NAME, status = raw.status, "unexpected channel status");
            return Err(TransportError::Status {
                op: O::NAME,
                status: raw.status,
                expected: O::EXPECTED_STATUS,
            }
            .into());
        }

        let msg = RpcMessage::from_bytes(&raw.frame)?;
        Ok(O::decode_response(&msg)?)
    }

    /// Number of calls the channel has answered so far.
    #[inline]
    pub fn completed_calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_serialized(&self) -> bool {
        self.gate.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Fault, SimConfig, SimFirmware};
    use crate::transport::{status, RawResponse};
    use scu_api::misc::{BuildInfo, BuildInfoResponse, BUILD_INFO_EXPECTED_STATUS};
    use scu_api::rm::{FindMemreg, MemoryRegion, MemregRange};
    use scu_api::ProtocolError;

    struct Garbage;

    impl Transport for Garbage {
        fn call(&self, _request: &[u8]) -> Result<RawResponse, TransportError> {
            Ok(RawResponse {
                status: BUILD_INFO_EXPECTED_STATUS,
                frame: vec![1, 2, 3],
            })
        }

        fn concurrency(&self) -> Concurrency {
            Concurrency::Shared
        }
    }

    #[test]
    fn typed_calls() {
        let fw = Arc::new(SimFirmware::new(SimConfig::default()));
        let client = RpcClient::new(fw);
        assert!(client.is_serialized());

        let info = client.call::<BuildInfo>(&()).unwrap();
        assert_eq!(info, BuildInfoResponse { build: 0x1f4a, commit: 0x2b7c_e103 });

        let range = MemregRange {
            start: 0x9607_4000,
            end: 0x9607_8000,
        };
        assert_eq!(client.call::<FindMemreg>(&range).unwrap(), MemoryRegion(2));
        assert_eq!(client.completed_calls(), 2);
    }

    #[test]
    fn status_is_checked_per_operation() {
        let fw = Arc::new(SimFirmware::with_faults(
            SimConfig::default(),
            vec![Fault::FailCall {
                call: 1,
                status: status::OK,
            }],
        ));
        let client = RpcClient::new(fw);
        // success status is not what build-info completes with
        assert_eq!(
            client.call::<BuildInfo>(&()),
            Err(RpcError::Transport(TransportError::Status {
                op: "build-info",
                status: 0,
                expected: BUILD_INFO_EXPECTED_STATUS,
            }))
        );
        assert!(client.call::<BuildInfo>(&()).is_ok());
    }

    #[test]
    fn malformed_response_is_a_protocol_error() {
        let client = RpcClient::new(Arc::new(Garbage));
        assert!(!client.is_serialized());
        assert_eq!(
            client.call::<BuildInfo>(&()),
            Err(RpcError::Protocol(ProtocolError::Unaligned(3)))
        );
    }

    #[test]
    fn exclusive_transport_sees_one_call_at_a_time() {
        let config = SimConfig {
            latency_us: 50,
            ..Default::default()
        };
        let fw = Arc::new(SimFirmware::new(config));
        let client = RpcClient::new(fw.clone());

        crossbeam::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|_| {
                    for _ in 0..20 {
                        client.call::<BuildInfo>(&()).unwrap();
                    }
                });
            }
        })
        .unwrap();

        assert_eq!(client.completed_calls(), 160);
        assert_eq!(fw.max_in_flight(), 1);
    }
}
