use thiserror::Error;

use crate::transport::LinkKey;

/// Errors raised by the discovery handshake
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// No matching DISCOVER_REPLY arrived after every retry
    #[error("Discovery on link {link} timed out after {attempts} attempts")]
    Timeout {
        link: LinkKey,
        attempts: u8,
    },

    /// A DISCOVER_REPLY carried our own node id
    #[error("Link {link} loops back to this node")]
    SelfConnection {
        link: LinkKey,
    },
}
