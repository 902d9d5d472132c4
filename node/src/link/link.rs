use std::time::{Duration, Instant};

use peerlink_shared::{Id, Timer};

use crate::transport::LinkKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// DISCOVER sent, waiting for the matching reply
    Discovering,
    /// The one link used to reach `node_id`
    Established { node_id: Id, instance_id: Id },
    /// Resolved to a node that is already reachable over another link
    Redundant { node_id: Id, instance_id: Id },
}

/// One transport link and its discovery progress
pub struct Link {
    key: LinkKey,
    state: LinkState,
    outbound_id: Id,
    discovery_attempts: u8,
    retry_timer: Timer,
    liveness_timer: Timer,
}

impl Link {
    pub(crate) fn new(
        key: LinkKey,
        retry_interval: Duration,
        disconnection_timeout: Duration,
        now: Instant,
    ) -> Self {
        Self {
            key,
            state: LinkState::Discovering,
            outbound_id: Id::generate(),
            discovery_attempts: 0,
            retry_timer: Timer::new(retry_interval, now),
            liveness_timer: Timer::new(disconnection_timeout, now),
        }
    }

    pub fn key(&self) -> LinkKey {
        self.key
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Id correlating this link's DISCOVER with its reply
    pub fn outbound_id(&self) -> Id {
        self.outbound_id
    }

    pub fn discovery_attempts(&self) -> u8 {
        self.discovery_attempts
    }

    /// The remote node, once resolved
    pub fn node_id(&self) -> Option<Id> {
        match self.state {
            LinkState::Discovering => None,
            LinkState::Established { node_id, .. } | LinkState::Redundant { node_id, .. } => {
                Some(node_id)
            }
        }
    }

    pub fn instance_id(&self) -> Option<Id> {
        match self.state {
            LinkState::Discovering => None,
            LinkState::Established { instance_id, .. }
            | LinkState::Redundant { instance_id, .. } => Some(instance_id),
        }
    }

    pub fn is_discovering(&self) -> bool {
        self.state == LinkState::Discovering
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, LinkState::Established { .. })
    }

    // Crate-public

    pub(crate) fn set_state(&mut self, state: LinkState) {
        self.state = state;
    }

    pub(crate) fn record_discovery_sent(&mut self, now: Instant) {
        self.discovery_attempts = self.discovery_attempts.saturating_add(1);
        self.retry_timer.reset(now);
    }

    pub(crate) fn should_retry_discovery(&self, now: Instant) -> bool {
        self.is_discovering() && self.retry_timer.ringing(now)
    }

    pub(crate) fn mark_heard(&mut self, now: Instant) {
        self.liveness_timer.reset(now);
    }

    /// Nothing received for longer than the disconnection timeout
    pub(crate) fn is_silent(&self, now: Instant) -> bool {
        self.liveness_timer.ringing(now)
    }
}
