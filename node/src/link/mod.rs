mod error;
mod link;
mod link_manager;

pub use error::DiscoveryError;
pub use link::{Link, LinkState};
pub use link_manager::{LinkEvent, LinkManager};
