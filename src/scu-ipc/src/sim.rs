//! An in-process stand-in for the system-controller firmware.
//!
//! It answers the probed calls with fixed values, so repeated identical requests get identical
//! answers unless a [`Fault`] says otherwise. Used by the harness on hosts without the firmware
//! and by tests.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spin::Mutex;

use scu_api::misc::{BuildInfo, BuildInfoResponse, MISC_FUNC_BUILD_INFO};
use scu_api::rm::{FindMemreg, MemoryRegion, RM_FUNC_FIND_MEMREG};
use scu_api::seco::{
    SecvioAccess, SecvioConfig, SecvioWords, SECO_FUNC_SECVIO_CONFIG, SECVIO_DATA_WORDS,
};
use scu_api::{Operation, ProtocolError, RpcMessage, Service};

use crate::error::TransportError;
use crate::transport::{status, Bus, BusId, Concurrency, RawResponse, Transport};

/// Result code the firmware writes into the response header.
const RESULT_NONE: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimRegion {
    pub id: u8,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub build: u32,
    pub commit: u32,
    pub regions: Vec<SimRegion>,
    /// Words returned when reading a configuration id that was never written.
    pub secvio_words: [u32; SECVIO_DATA_WORDS],
    /// Time each call spends inside the firmware.
    pub latency_us: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            build: 0x1f4a,
            commit: 0x2b7c_e103,
            regions: vec![
                SimRegion {
                    id: 0,
                    start: 0x0,
                    end: 0x8000_0000,
                },
                SimRegion {
                    id: 1,
                    start: 0x8000_0000,
                    end: 0x9600_0000,
                },
                SimRegion {
                    id: 2,
                    start: 0x9600_0000,
                    end: 0x1_0000_0000,
                },
            ],
            secvio_words: [0x0000_0101, 0x0, 0x8000_0000, 0x0, 0x0000_00ff],
            latency_us: 0,
        }
    }
}

/// Misbehavior injected at a given call. Calls are numbered from 1 across all operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Answer call `call` normally but report `status` for it.
    FailCall { call: u64, status: i32 },
    /// Drop the last word of the response to call `call`.
    TruncateResponse { call: u64 },
    /// Report `build` for every build-info call from `from_call` on.
    ChangeBuild { from_call: u64, build: u32 },
}

pub struct SimFirmware {
    config: SimConfig,
    faults: Vec<Fault>,
    secvio: Mutex<HashMap<u8, [u32; SECVIO_DATA_WORDS]>>,
    calls: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SimFirmware {
    pub fn new(config: SimConfig) -> Self {
        Self::with_faults(config, Vec::new())
    }

    pub fn with_faults(config: SimConfig, faults: Vec<Fault>) -> Self {
        SimFirmware {
            config,
            faults,
            secvio: Mutex::new(HashMap::new()),
            calls: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Calls received so far, including those still in flight.
    #[inline]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }

    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Highest number of calls observed in flight at the same time.
    #[inline]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Acquire)
    }

    fn serve(&self, call: u64, request: &[u8]) -> RawResponse {
        let (mut code, response) = match RpcMessage::from_bytes(request) {
            Ok(msg) => self.dispatch(call, &msg),
            Err(e) => {
                tracing::debug!(call, error = %e, "sim: malformed request");
                (status::EINVAL, None)
            }
        };

        // a failed call leaves the request in the buffer
        let mut frame = match response {
            Some(msg) => msg.to_bytes(),
            None => request.to_vec(),
        };

        for fault in &self.faults {
            match *fault {
                Fault::FailCall { call: n, status } if n == call => code = status,
                Fault::TruncateResponse { call: n } if n == call => {
                    frame.truncate(frame.len().saturating_sub(4))
                }
                _ => {}
            }
        }

        RawResponse {
            status: code,
            frame,
        }
    }

    fn dispatch(&self, call: u64, msg: &RpcMessage) -> (i32, Option<RpcMessage>) {
        let header = msg.header();
        let answer = match (header.svc, header.func) {
            (Service::MISC, MISC_FUNC_BUILD_INFO) => self
                .build_info(call, msg)
                .map(|m| (BuildInfo::EXPECTED_STATUS, m)),
            (Service::RM, RM_FUNC_FIND_MEMREG) => self.find_memreg(msg),
            (Service::SECO, SECO_FUNC_SECVIO_CONFIG) => {
                self.secvio_config(msg).map(|m| (status::OK, m))
            }
            (svc, func) => {
                tracing::debug!(call, %svc, func, "sim: unsupported call");
                return (status::EINVAL, None);
            }
        };

        match answer {
            Ok((status, response)) => (status, Some(response)),
            Err(e) => {
                tracing::debug!(call, error = %e, "sim: rejected request");
                (status::EINVAL, None)
            }
        }
    }

    fn build_info(&self, call: u64, msg: &RpcMessage) -> Result<RpcMessage, ProtocolError> {
        BuildInfo::decode_request(msg)?;
        let build = self
            .faults
            .iter()
            .rev()
            .find_map(|fault| match *fault {
                Fault::ChangeBuild { from_call, build } if from_call <= call => Some(build),
                _ => None,
            })
            .unwrap_or(self.config.build);
        let resp = BuildInfoResponse {
            build,
            commit: self.config.commit,
        };
        BuildInfo::encode_response(&resp, RESULT_NONE)
    }

    fn find_memreg(&self, msg: &RpcMessage) -> Result<(i32, RpcMessage), ProtocolError> {
        let range = FindMemreg::decode_request(msg)?;
        let region = self
            .config
            .regions
            .iter()
            .find(|r| r.start <= range.start && range.end <= r.end && range.start < range.end);
        match region {
            Some(r) => Ok((
                status::OK,
                FindMemreg::encode_response(&MemoryRegion(r.id), RESULT_NONE)?,
            )),
            None => Ok((status::ENOENT, msg.clone())),
        }
    }

    fn secvio_config(&self, msg: &RpcMessage) -> Result<RpcMessage, ProtocolError> {
        let req = SecvioConfig::decode_request(msg)?;
        let size = req.size as usize;
        let mut store = self.secvio.lock();
        let words = store.entry(req.id).or_insert(self.config.secvio_words);
        if req.access == SecvioAccess::Write {
            words[..size].copy_from_slice(&req.data[..size]);
        }
        let mut out = [0; SECVIO_DATA_WORDS];
        out[..size].copy_from_slice(&words[..size]);
        SecvioConfig::encode_response(&SecvioWords(out), RESULT_NONE)
    }
}

impl Transport for SimFirmware {
    fn call(&self, request: &[u8]) -> Result<RawResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::AcqRel) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(now, Ordering::AcqRel);

        if self.config.latency_us > 0 {
            thread::sleep(Duration::from_micros(self.config.latency_us));
        }
        let response = self.serve(call, request);

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        Ok(response)
    }

    fn concurrency(&self) -> Concurrency {
        // a single mailbox, like the hardware
        Concurrency::Exclusive
    }
}

/// Opens [`SimFirmware`] channels.
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    pub config: SimConfig,
    pub faults: Vec<Fault>,
}

impl Bus for SimBus {
    fn default_bus(&self) -> Result<BusId, TransportError> {
        Ok(BusId(1))
    }

    fn open(&self, bus: BusId) -> Result<Arc<dyn Transport>, TransportError> {
        tracing::debug!(%bus, "opening simulated firmware channel");
        Ok(Arc::new(SimFirmware::with_faults(
            self.config.clone(),
            self.faults.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scu_api::rm::MemregRange;
    use scu_api::seco::SecvioConfigRequest;

    fn roundtrip<O: Operation>(fw: &SimFirmware, req: &O::Request) -> (i32, RpcMessage) {
        let raw = fw
            .call(&O::encode_request(req).unwrap().to_bytes())
            .unwrap();
        (raw.status, RpcMessage::from_bytes(&raw.frame).unwrap())
    }

    #[test]
    fn build_change_fault() {
        let fw = SimFirmware::with_faults(
            SimConfig::default(),
            vec![Fault::ChangeBuild {
                from_call: 2,
                build: 7,
            }],
        );
        let (st, first) = roundtrip::<BuildInfo>(&fw, &());
        assert_eq!(st, BuildInfo::EXPECTED_STATUS);
        assert_eq!(BuildInfo::decode_response(&first).unwrap().build, 0x1f4a);
        let (_, second) = roundtrip::<BuildInfo>(&fw, &());
        assert_eq!(BuildInfo::decode_response(&second).unwrap().build, 7);
    }

    #[test]
    fn unknown_range_is_not_found() {
        let fw = SimFirmware::new(SimConfig {
            regions: Vec::new(),
            ..Default::default()
        });
        let range = MemregRange {
            start: 0x1000,
            end: 0x2000,
        };
        let (st, _) = roundtrip::<FindMemreg>(&fw, &range);
        assert_eq!(st, status::ENOENT);
    }

    #[test]
    fn secvio_write_then_read() {
        let fw = SimFirmware::new(SimConfig::default());
        let mut req = SecvioConfigRequest {
            id: 3,
            access: SecvioAccess::Read,
            size: 5,
            data: [0; 5],
        };
        let (_, before) = roundtrip::<SecvioConfig>(&fw, &req);
        assert_eq!(
            SecvioConfig::decode_response(&before).unwrap(),
            SecvioWords(SimConfig::default().secvio_words)
        );

        req.access = SecvioAccess::Write;
        req.size = 2;
        req.data = [9, 8, 7, 6, 5];
        roundtrip::<SecvioConfig>(&fw, &req);

        req.access = SecvioAccess::Read;
        req.size = 5;
        let (st, after) = roundtrip::<SecvioConfig>(&fw, &req);
        assert_eq!(st, status::OK);
        let mut expected = SimConfig::default().secvio_words;
        expected[..2].copy_from_slice(&[9, 8]);
        assert_eq!(
            SecvioConfig::decode_response(&after).unwrap(),
            SecvioWords(expected)
        );
    }

    #[test]
    fn truncated_response() {
        let fw = SimFirmware::with_faults(
            SimConfig::default(),
            vec![Fault::TruncateResponse { call: 1 }],
        );
        let raw = fw
            .call(&BuildInfo::encode_request(&()).unwrap().to_bytes())
            .unwrap();
        assert_eq!(
            RpcMessage::from_bytes(&raw.frame),
            Err(ProtocolError::SizeMismatch {
                declared: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn unsupported_call() {
        let fw = SimFirmware::new(SimConfig::default());
        let req = RpcMessage::new(Service::MISC, 99, Vec::new()).unwrap();
        let raw = fw.call(&req.to_bytes()).unwrap();
        assert_eq!(raw.status, status::EINVAL);
        assert_eq!(raw.frame, req.to_bytes());
        assert_eq!(fw.calls(), 1);
        assert_eq!(fw.in_flight(), 0);
    }
}
