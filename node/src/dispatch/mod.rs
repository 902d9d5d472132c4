mod error;
mod message_payload;
mod remote_dispatcher;

pub use error::DispatchError;
pub use message_payload::MessagePayload;
pub use remote_dispatcher::RemoteDispatcher;
