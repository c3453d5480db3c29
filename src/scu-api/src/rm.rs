//! Resource-manager service calls.
use std::fmt;

use crate::error::ProtocolError;
use crate::header::Service;
use crate::operation::{payload_array, Operation};

pub const RM_FUNC_FIND_MEMREG: u8 = 30;

/// Looks up the memory region covering an address range.
pub struct FindMemreg;

/// Inclusive start and exclusive end of the range to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemregRange {
    pub start: u64,
    pub end: u64,
}

/// Memory region id assigned by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRegion(pub u8);

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mr{}", self.0)
    }
}

#[inline]
fn split(addr: u64) -> [u32; 2] {
    [(addr >> 32) as u32, addr as u32]
}

#[inline]
fn join(hi: u32, lo: u32) -> u64 {
    (u64::from(hi) << 32) | u64::from(lo)
}

impl Operation for FindMemreg {
    const NAME: &'static str = "find-memreg";
    const SERVICE: Service = Service::RM;
    const FUNCTION: u8 = RM_FUNC_FIND_MEMREG;
    const REQUEST_WORDS: usize = 5;
    const RESPONSE_WORDS: usize = 2;

    type Request = MemregRange;
    type Response = MemoryRegion;

    fn request_payload(req: &MemregRange) -> Vec<u32> {
        let [start_hi, start_lo] = split(req.start);
        let [end_hi, end_lo] = split(req.end);
        vec![start_hi, start_lo, end_hi, end_lo]
    }

    fn parse_request(payload: &[u32]) -> Result<MemregRange, ProtocolError> {
        let [start_hi, start_lo, end_hi, end_lo] = payload_array::<Self, 4>(payload)?;
        Ok(MemregRange {
            start: join(start_hi, start_lo),
            end: join(end_hi, end_lo),
        })
    }

    fn response_payload(resp: &MemoryRegion) -> Vec<u32> {
        vec![u32::from(resp.0)]
    }

    fn parse_response(payload: &[u32]) -> Result<MemoryRegion, ProtocolError> {
        let [word] = payload_array::<Self, 1>(payload)?;
        // the id occupies the first byte on the wire, the rest is padding
        Ok(MemoryRegion(word.to_le_bytes()[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RpcMessage;

    #[test]
    fn range_is_split_high_word_first() {
        let range = MemregRange {
            start: 0x1_9607_4000,
            end: 0x9607_8000,
        };
        let msg = FindMemreg::encode_request(&range).unwrap();
        assert_eq!(msg.header().size, 5);
        assert_eq!(msg.payload(), &[0x1, 0x9607_4000, 0x0, 0x9607_8000]);
        assert_eq!(FindMemreg::decode_request(&msg).unwrap(), range);
    }

    #[test]
    fn padding_bytes_are_ignored() {
        let msg = RpcMessage::new(Service::RM, 0, vec![0xffff_ff02]).unwrap();
        assert_eq!(FindMemreg::decode_response(&msg).unwrap(), MemoryRegion(2));
    }
}
