use std::{default::Default, time::Duration};

/// Contains Config properties which will be used by every link a node holds
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// The duration to wait before an established link is considered dead
    /// because nothing has been received on it
    pub disconnection_timeout_duration: Duration,
    /// The duration between heartbeat packets on established links
    pub heartbeat_interval: Duration,
    /// The duration between DISCOVER retransmissions on links whose
    /// discovery has not been answered yet
    pub discovery_retry_interval: Duration,
    /// The number of DISCOVER packets sent on a link before giving up on it
    pub discovery_max_attempts: u8,
}

impl ConnectionConfig {
    /// Creates a new ConnectionConfig, used to initialize a Connection
    pub fn new(
        disconnection_timeout_duration: Duration,
        heartbeat_interval: Duration,
        discovery_retry_interval: Duration,
        discovery_max_attempts: u8,
    ) -> Self {
        Self {
            disconnection_timeout_duration,
            heartbeat_interval,
            discovery_retry_interval,
            discovery_max_attempts,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            disconnection_timeout_duration: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(4),
            discovery_retry_interval: Duration::from_secs(1),
            discovery_max_attempts: 10,
        }
    }
}
