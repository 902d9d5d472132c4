use thiserror::Error;

use super::LinkKey;

/// Errors that can occur while moving packets through a [`Transport`](super::Transport)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Another transport already listens at this address
    #[error("Address '{address}' is already in use")]
    AddressInUse {
        address: String,
    },

    /// Nothing listens at this address
    #[error("No listener at address '{address}'. The peer may not be running yet")]
    AddressNotFound {
        address: String,
    },

    /// The link is not (or no longer) known to the transport
    #[error("Link {link} is not open")]
    LinkNotFound {
        link: LinkKey,
    },

    /// The remote end of the link went away
    #[error("Link {link} was closed by the remote peer")]
    LinkClosed {
        link: LinkKey,
    },

    /// The shared state backing the transport is unusable
    #[error("Transport backend is unavailable")]
    Unavailable,
}
