use smol::channel::Sender;

use peerlink_shared::Serde;

use crate::{
    container::{ContainerCommand, ContainerError, ContainerRegistry},
    dispatch::MessagePayload,
    link::LinkManager,
    NodeClosedError,
};

pub(crate) enum Command {
    Publish {
        topic: String,
        message: Box<dyn MessagePayload>,
    },
    Container(ContainerCommand),
}

/// A cloneable, thread-safe way to feed work into a [`Node`](crate::Node).
///
/// Calls only enqueue; the work runs on the node's own thread during its
/// next `update`.
#[derive(Clone)]
pub struct NodeHandle {
    sender: Sender<Command>,
}

impl NodeHandle {
    pub(crate) fn new(sender: Sender<Command>) -> Self {
        Self { sender }
    }

    /// Publishes a message on a topic. Nothing is serialized unless some
    /// peer subscribes to the topic when the command runs.
    pub fn publish<M: Serde + Send + 'static>(
        &self,
        topic: &str,
        message: M,
    ) -> Result<(), NodeClosedError> {
        self.send(Command::Publish {
            topic: topic.to_string(),
            message: Box::new(message),
        })
    }

    /// Writes a value into a container. Errors from the write itself, such
    /// as an unknown container, are reported as node error events.
    pub fn insert_or_update<K, V>(
        &self,
        container: &str,
        key: K,
        value: V,
    ) -> Result<(), NodeClosedError>
    where
        K: Serde + Ord + Send + 'static,
        V: Serde + Send + 'static,
    {
        let name = container.to_string();
        let command: ContainerCommand = Box::new(
            move |containers: &mut ContainerRegistry,
                  link_manager: &mut LinkManager|
                  -> Result<(), ContainerError> {
                containers
                    .get_mut::<K, V>(&name)?
                    .insert_or_update(link_manager, key, value)
                    .map(|_| ())
            },
        );
        self.send(Command::Container(command))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), NodeClosedError> {
        self.sender.try_send(command).map_err(|_| NodeClosedError)
    }
}
