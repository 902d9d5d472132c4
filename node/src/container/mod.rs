mod container_base;
mod error;
mod replication_connection;
mod shared_set;

pub(crate) use container_base::{ContainerBase, ContainerCommand, ContainerRegistry};
pub use error::ContainerError;
pub use replication_connection::ReplicationConnection;
pub use shared_set::{SetEntry, SharedSet};
