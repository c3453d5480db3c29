use std::mem::size_of;

use crate::error::ProtocolError;
use crate::header::{RpcHeader, Service, HEADER_WORDS, RPC_VERSION};

const WORD_BYTES: usize = size_of::<u32>();

/// A complete frame: header followed by payload words.
///
/// The header's `size` is always derived from the payload when a message is built, and checked
/// against the words actually present when one is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcMessage {
    header: RpcHeader,
    payload: Vec<u32>,
}

impl RpcMessage {
    pub fn new(svc: Service, func: u8, payload: Vec<u32>) -> Result<Self, ProtocolError> {
        let words = HEADER_WORDS + payload.len();
        let size = u8::try_from(words).map_err(|_| ProtocolError::TooLong(payload.len()))?;
        Ok(RpcMessage {
            header: RpcHeader::new(svc, func, size),
            payload,
        })
    }

    #[inline]
    pub fn header(&self) -> RpcHeader {
        self.header
    }

    #[inline]
    pub fn payload(&self) -> &[u32] {
        &self.payload
    }

    /// Words in the frame, header included.
    #[inline]
    pub fn word_count(&self) -> usize {
        HEADER_WORDS + self.payload.len()
    }

    pub fn to_words(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(self.word_count());
        words.push(self.header.to_word());
        words.extend_from_slice(&self.payload);
        words
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_words()
            .into_iter()
            .flat_map(u32::to_le_bytes)
            .collect()
    }

    pub fn from_words(words: &[u32]) -> Result<Self, ProtocolError> {
        let (&first, payload) = words.split_first().ok_or(ProtocolError::Empty)?;
        let header = RpcHeader::from_word(first);
        if header.ver != RPC_VERSION {
            return Err(ProtocolError::Version(header.ver));
        }
        if header.size as usize != words.len() {
            return Err(ProtocolError::SizeMismatch {
                declared: header.size as usize,
                actual: words.len(),
            });
        }
        Ok(RpcMessage {
            header,
            payload: payload.to_vec(),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() % WORD_BYTES != 0 {
            return Err(ProtocolError::Unaligned(bytes.len()));
        }
        let words: Vec<u32> = bytes
            .chunks_exact(WORD_BYTES)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::from_words(&words)
    }
}
