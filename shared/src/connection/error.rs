use thiserror::Error;

use crate::PayloadType;

/// Errors that can occur while reading a packet off the wire
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Invalid payload type index received (SECURITY: potentially malicious packet)
    #[error("Invalid payload type index {index} received (valid range: 0-6). This may indicate a malformed or malicious packet")]
    InvalidPayloadTypeIndex {
        index: u8,
    },

    /// Invalid container control command received
    #[error("Invalid container control command {index} received")]
    InvalidControlCommand {
        index: u8,
    },

    /// The packet header could not be read
    #[error("Failed to read link header ({length} bytes)")]
    MalformedHeader {
        length: usize,
    },

    /// The payload following a valid header could not be read
    #[error("Failed to read {payload_type:?} payload")]
    MalformedPayload {
        payload_type: PayloadType,
    },
}
