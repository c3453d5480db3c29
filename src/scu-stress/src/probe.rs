//! The probed firmware calls.
use std::sync::Arc;

use scu_api::misc::BuildInfo;
use scu_api::rm::{FindMemreg, MemregRange};
use scu_api::seco::{SecvioAccess, SecvioConfig, SecvioConfigRequest, SECVIO_DATA_WORDS};
use scu_api::Operation;
use scu_ipc::RpcClient;

use crate::burst::Iteration;
use crate::error::Error;
use crate::oracle::{Oracle, ProbeValue, Verdict};

/// Start of the memory range looked up by the memory-region probe.
pub const MEMREG_PROBE_START: u64 = 0x9607_4000;
/// End of the memory range looked up by the memory-region probe.
pub const MEMREG_PROBE_END: u64 = 0x9607_8000;

/// Configuration id read by the security-violation probe.
pub const SECVIO_PROBE_ID: u8 = 0;

pub trait Probe: Send + Sync {
    fn name(&self) -> &'static str;

    /// Calls the firmware once and checks the answer against the first one seen.
    fn run(&self, client: &RpcClient) -> Result<Verdict, Error>;

    /// The reference result, once one has been recorded.
    fn expected(&self) -> Option<String>;
}

/// A probe that issues a fixed request and checks the whole response.
pub struct RpcProbe<O: Operation> {
    request: O::Request,
    oracle: Oracle<O::Response>,
}

impl<O: Operation> RpcProbe<O>
where
    O::Response: ProbeValue,
{
    pub fn new(request: O::Request) -> Self {
        RpcProbe {
            request,
            oracle: Oracle::new(O::NAME),
        }
    }

    #[inline]
    pub fn oracle(&self) -> &Oracle<O::Response> {
        &self.oracle
    }
}

impl<O: Operation> Probe for RpcProbe<O>
where
    O::Request: Send + Sync,
    O::Response: ProbeValue,
{
    fn name(&self) -> &'static str {
        O::NAME
    }

    fn run(&self, client: &RpcClient) -> Result<Verdict, Error> {
        let response = client.call::<O>(&self.request)?;
        Ok(self.oracle.check(response)?)
    }

    fn expected(&self) -> Option<String> {
        self.oracle.expected().map(ToString::to_string)
    }
}

pub fn build_info_probe() -> RpcProbe<BuildInfo> {
    RpcProbe::new(())
}

pub fn memreg_probe() -> RpcProbe<FindMemreg> {
    RpcProbe::new(MemregRange {
        start: MEMREG_PROBE_START,
        end: MEMREG_PROBE_END,
    })
}

/// Reads configuration [`SECVIO_PROBE_ID`]; the echoed words must not change between reads.
pub fn secvio_probe() -> RpcProbe<SecvioConfig> {
    RpcProbe::new(SecvioConfigRequest {
        id: SECVIO_PROBE_ID,
        access: SecvioAccess::Read,
        size: SECVIO_DATA_WORDS as u8,
        data: [0; SECVIO_DATA_WORDS],
    })
}

/// The probes of one iteration, run in a fixed order over a shared client.
pub struct ProbeSet {
    client: Arc<RpcClient>,
    probes: Vec<Box<dyn Probe>>,
}

impl ProbeSet {
    /// build-info, then memory-region, then security-violation config.
    pub fn new(client: Arc<RpcClient>) -> Self {
        let probes: [Box<dyn Probe>; 3] = [
            Box::new(build_info_probe()),
            Box::new(memreg_probe()),
            Box::new(secvio_probe()),
        ];
        Self::with_probes(client, probes.into())
    }

    pub fn with_probes(client: Arc<RpcClient>, probes: Vec<Box<dyn Probe>>) -> Self {
        ProbeSet { client, probes }
    }

    pub fn probes(&self) -> impl Iterator<Item = &dyn Probe> {
        self.probes.iter().map(|p| p.as_ref())
    }

    #[inline]
    pub fn client(&self) -> &RpcClient {
        &self.client
    }
}

impl Iteration for ProbeSet {
    fn run_once(&self) -> Result<(), Error> {
        for probe in &self.probes {
            probe.run(&self.client)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scu_ipc::{Fault, SimConfig, SimFirmware, TransportError};

    fn probe_set(faults: Vec<Fault>) -> (Arc<SimFirmware>, ProbeSet) {
        let fw = Arc::new(SimFirmware::with_faults(SimConfig::default(), faults));
        let client = Arc::new(RpcClient::new(fw.clone()));
        (fw, ProbeSet::new(client))
    }

    #[test]
    fn fixed_order() {
        let (_, set) = probe_set(Vec::new());
        let names: Vec<_> = set.probes().map(|p| p.name()).collect();
        assert_eq!(names, ["build-info", "find-memreg", "secvio-config"]);
    }

    #[test]
    fn repeated_iterations_are_consistent() {
        let (fw, set) = probe_set(Vec::new());
        for _ in 0..5 {
            set.run_once().unwrap();
        }
        assert_eq!(fw.calls(), 15);
        let expected: Vec<_> = set.probes().map(|p| p.expected()).collect();
        assert_eq!(
            expected,
            [
                Some("00001f4a 2b7ce103".to_owned()),
                Some("mr2".to_owned()),
                Some("00000101 00000000 80000000 00000000 000000ff".to_owned()),
            ]
        );
    }

    #[test]
    fn changed_build_is_a_mismatch() {
        // call 4 is the second build-info
        let (_, set) = probe_set(vec![Fault::ChangeBuild {
            from_call: 4,
            build: 0x1f4b,
        }]);
        set.run_once().unwrap();
        let err = set.run_once().unwrap_err();
        match err {
            Error::Mismatch(m) => {
                assert_eq!(m.probe, "build-info");
                assert_eq!(m.expected, "00001f4a 2b7ce103");
                assert_eq!(m.observed, "00001f4b 2b7ce103");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn transport_failure_stops_the_iteration() {
        // the memory-region call of the first iteration fails
        let (fw, set) = probe_set(vec![Fault::FailCall {
            call: 2,
            status: -5,
        }]);
        let err = set.run_once().unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Status {
                op: "find-memreg",
                status: -5,
                expected: 0
            })
        ));
        assert_eq!(fw.calls(), 2);
    }

    #[test]
    fn truncated_response_is_a_protocol_error() {
        let (_, set) = probe_set(vec![Fault::TruncateResponse { call: 3 }]);
        assert!(matches!(set.run_once(), Err(Error::Protocol(_))));
    }
}
