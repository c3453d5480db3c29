//! Miscellaneous service calls.
use std::fmt;

use crate::error::ProtocolError;
use crate::header::Service;
use crate::operation::{payload_array, Operation};

pub const MISC_FUNC_BUILD_INFO: u8 = 15;

/// Channel status the build-info call completes with on this firmware.
///
/// The firmware fills in the response but the channel reports an I/O status for it, so this value
/// is what a healthy call looks like. Any other status, including zero, is a failure.
pub const BUILD_INFO_EXPECTED_STATUS: i32 = -5;

/// Firmware build number and commit id.
pub struct BuildInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfoResponse {
    pub build: u32,
    pub commit: u32,
}

impl fmt::Display for BuildInfoResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x} {:08x}", self.build, self.commit)
    }
}

impl Operation for BuildInfo {
    const NAME: &'static str = "build-info";
    const SERVICE: Service = Service::MISC;
    const FUNCTION: u8 = MISC_FUNC_BUILD_INFO;
    const REQUEST_WORDS: usize = 1;
    const RESPONSE_WORDS: usize = 3;
    const EXPECTED_STATUS: i32 = BUILD_INFO_EXPECTED_STATUS;

    type Request = ();
    type Response = BuildInfoResponse;

    fn request_payload(_req: &()) -> Vec<u32> {
        Vec::new()
    }

    fn parse_request(payload: &[u32]) -> Result<(), ProtocolError> {
        payload_array::<Self, 0>(payload).map(|_| ())
    }

    fn response_payload(resp: &BuildInfoResponse) -> Vec<u32> {
        vec![resp.build, resp.commit]
    }

    fn parse_response(payload: &[u32]) -> Result<BuildInfoResponse, ProtocolError> {
        let [build, commit] = payload_array::<Self, 2>(payload)?;
        Ok(BuildInfoResponse { build, commit })
    }
}
