//! Security controller service calls.
use std::fmt;

use crate::error::ProtocolError;
use crate::header::Service;
use crate::operation::{payload_array, Operation};

pub const SECO_FUNC_SECVIO_CONFIG: u8 = 34;

/// Number of data words carried by a security-violation configuration access.
pub const SECVIO_DATA_WORDS: usize = 5;

/// Reads or writes a security-violation configuration register set.
pub struct SecvioConfig;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecvioAccess {
    Read = 0,
    Write = 1,
}

impl TryFrom<u8> for SecvioAccess {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(SecvioAccess::Read),
            1 => Ok(SecvioAccess::Write),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecvioConfigRequest {
    pub id: u8,
    pub access: SecvioAccess,
    /// Number of meaningful data words, at most [`SECVIO_DATA_WORDS`].
    pub size: u8,
    pub data: [u32; SECVIO_DATA_WORDS],
}

/// The data words the firmware echoes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecvioWords(pub [u32; SECVIO_DATA_WORDS]);

impl fmt::Display for SecvioWords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [d0, d1, d2, d3, d4] = self.0;
        write!(f, "{d0:08x} {d1:08x} {d2:08x} {d3:08x} {d4:08x}")
    }
}

impl Operation for SecvioConfig {
    const NAME: &'static str = "secvio-config";
    const SERVICE: Service = Service::SECO;
    const FUNCTION: u8 = SECO_FUNC_SECVIO_CONFIG;
    const REQUEST_WORDS: usize = 7;
    const RESPONSE_WORDS: usize = 6;

    type Request = SecvioConfigRequest;
    type Response = SecvioWords;

    fn request_payload(req: &SecvioConfigRequest) -> Vec<u32> {
        let mut words = req.data.to_vec();
        words.push(u32::from_le_bytes([req.id, req.access as u8, req.size, 0]));
        words
    }

    fn parse_request(payload: &[u32]) -> Result<SecvioConfigRequest, ProtocolError> {
        let [d0, d1, d2, d3, d4, tail] = payload_array::<Self, 6>(payload)?;
        let [id, access, size, _] = tail.to_le_bytes();
        let access = SecvioAccess::try_from(access).map_err(|v| ProtocolError::InvalidField {
            op: Self::NAME,
            field: "access",
            value: u32::from(v),
        })?;
        if size as usize > SECVIO_DATA_WORDS {
            return Err(ProtocolError::InvalidField {
                op: Self::NAME,
                field: "size",
                value: u32::from(size),
            });
        }
        Ok(SecvioConfigRequest {
            id,
            access,
            size,
            data: [d0, d1, d2, d3, d4],
        })
    }

    fn response_payload(resp: &SecvioWords) -> Vec<u32> {
        resp.0.to_vec()
    }

    fn parse_response(payload: &[u32]) -> Result<SecvioWords, ProtocolError> {
        payload_array::<Self, SECVIO_DATA_WORDS>(payload).map(SecvioWords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RpcMessage;

    #[test]
    fn trailing_fields_pack_into_one_word() {
        let req = SecvioConfigRequest {
            id: 0x10,
            access: SecvioAccess::Write,
            size: 5,
            data: [1, 2, 3, 4, 5],
        };
        let msg = SecvioConfig::encode_request(&req).unwrap();
        assert_eq!(msg.header().size, 7);
        assert_eq!(msg.payload()[5], 0x0005_0110);
    }

    #[test]
    fn unknown_access_mode() {
        let msg = RpcMessage::new(Service::SECO, 34, vec![0, 0, 0, 0, 0, 0x0005_0700]).unwrap();
        assert_eq!(
            SecvioConfig::decode_request(&msg),
            Err(ProtocolError::InvalidField {
                op: "secvio-config",
                field: "access",
                value: 7
            })
        );
    }

    #[test]
    fn response_words_in_order() {
        let msg = RpcMessage::new(Service::SECO, 0, vec![5, 4, 3, 2, 1]).unwrap();
        assert_eq!(
            SecvioConfig::decode_response(&msg).unwrap(),
            SecvioWords([5, 4, 3, 2, 1])
        );
        assert_eq!(
            SecvioWords([5, 4, 3, 2, 1]).to_string(),
            "00000005 00000004 00000003 00000002 00000001"
        );
    }
}
