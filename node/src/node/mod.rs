mod node;
mod node_config;
mod node_handle;

pub use node::Node;
pub use node_config::NodeConfig;
pub(crate) use node_handle::Command;
pub use node_handle::NodeHandle;
