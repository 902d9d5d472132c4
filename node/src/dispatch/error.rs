use thiserror::Error;

use peerlink_shared::Id;

/// Errors raised while tracking topic interest
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A topic was announced under a type other than the one already
    /// recorded for it
    #[error("Topic '{topic}' is registered as '{expected}' but '{received}' was announced{}", source_suffix(.peer))]
    TypeMismatch {
        topic: String,
        expected: String,
        received: String,
        peer: Option<Id>,
    },
}

fn source_suffix(peer: &Option<Id>) -> String {
    match peer {
        Some(peer) => format!(" by peer {:?}", peer),
        None => String::new(),
    }
}
