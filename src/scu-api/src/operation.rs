use crate::error::ProtocolError;
use crate::header::{Service, HEADER_WORDS};
use crate::message::RpcMessage;

/// One firmware call: its address, its frame sizes and the layouts of both directions.
///
/// Implementors only describe payload words; framing and validation are provided here.
pub trait Operation {
    /// Short name used in logs and errors.
    const NAME: &'static str;
    const SERVICE: Service;
    const FUNCTION: u8;
    /// Request frame size in words, header included.
    const REQUEST_WORDS: usize;
    /// Response frame size in words, header included.
    const RESPONSE_WORDS: usize;
    /// Channel status that means the call went through.
    const EXPECTED_STATUS: i32 = 0;

    type Request;
    type Response;

    fn request_payload(req: &Self::Request) -> Vec<u32>;

    fn parse_request(payload: &[u32]) -> Result<Self::Request, ProtocolError>;

    fn response_payload(resp: &Self::Response) -> Vec<u32>;

    fn parse_response(payload: &[u32]) -> Result<Self::Response, ProtocolError>;

    fn encode_request(req: &Self::Request) -> Result<RpcMessage, ProtocolError> {
        let msg = RpcMessage::new(Self::SERVICE, Self::FUNCTION, Self::request_payload(req))?;
        expect_len::<Self>(&msg, Self::REQUEST_WORDS)?;
        Ok(msg)
    }

    fn decode_request(msg: &RpcMessage) -> Result<Self::Request, ProtocolError> {
        expect_service::<Self>(msg)?;
        expect_len::<Self>(msg, Self::REQUEST_WORDS)?;
        Self::parse_request(msg.payload())
    }

    /// Builds a response frame. `result` lands in the header's `func` byte.
    fn encode_response(resp: &Self::Response, result: u8) -> Result<RpcMessage, ProtocolError> {
        let msg = RpcMessage::new(Self::SERVICE, result, Self::response_payload(resp))?;
        expect_len::<Self>(&msg, Self::RESPONSE_WORDS)?;
        Ok(msg)
    }

    fn decode_response(msg: &RpcMessage) -> Result<Self::Response, ProtocolError> {
        expect_service::<Self>(msg)?;
        expect_len::<Self>(msg, Self::RESPONSE_WORDS)?;
        Self::parse_response(msg.payload())
    }
}

fn expect_service<O: Operation + ?Sized>(msg: &RpcMessage) -> Result<(), ProtocolError> {
    let got = msg.header().svc;
    if got != O::SERVICE {
        return Err(ProtocolError::ServiceMismatch {
            op: O::NAME,
            expected: O::SERVICE,
            got,
        });
    }
    Ok(())
}

fn expect_len<O: Operation + ?Sized>(msg: &RpcMessage, words: usize) -> Result<(), ProtocolError> {
    if msg.word_count() != words {
        return Err(ProtocolError::UnexpectedLength {
            op: O::NAME,
            expected: words,
            got: msg.word_count(),
        });
    }
    Ok(())
}

/// Views a payload as exactly `N` words.
pub fn payload_array<O: Operation + ?Sized, const N: usize>(
    payload: &[u32],
) -> Result<[u32; N], ProtocolError> {
    payload
        .try_into()
        .map_err(|_| ProtocolError::UnexpectedLength {
            op: O::NAME,
            expected: HEADER_WORDS + N,
            got: HEADER_WORDS + payload.len(),
        })
}
