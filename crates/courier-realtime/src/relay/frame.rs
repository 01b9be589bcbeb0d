//! Outbound frames and push-stream framing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

/// One unit written to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A bus payload, framed the way the transport frames deliveries.
    Payload(Bytes),
    /// A control message generated by the server, such as an upload receipt.
    Text(String),
}

impl Outbound {
    /// Raw bytes carried by the frame.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Payload(data) => data,
            Self::Text(text) => text.as_bytes(),
        }
    }
}

/// Frames `payload` as one push-stream event: `data:<base64>\n\n`.
pub fn frame_event(payload: &[u8]) -> Bytes {
    let mut framed = String::with_capacity(payload.len().div_ceil(3) * 4 + 7);
    framed.push_str("data:");
    STANDARD.encode_string(payload, &mut framed);
    framed.push_str("\n\n");
    Bytes::from(framed)
}
