use thiserror::Error;

/// The only error the codec produces. Raised when a buffer is truncated or
/// holds a value that cannot be decoded into the requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Failed to deserialize value: buffer is truncated or malformed")]
pub struct SerdeErr;
