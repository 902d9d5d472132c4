use peerlink_shared::{BitWrite, Serde};

/// A message waiting to be published. Serialization is deferred until the
/// event loop knows someone is listening.
pub trait MessagePayload: Send {
    fn write(&self, writer: &mut dyn BitWrite);
}

impl<T: Serde + Send> MessagePayload for T {
    fn write(&self, writer: &mut dyn BitWrite) {
        self.ser(writer);
    }
}
