use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use log::debug;
use smol::{
    channel,
    channel::{Receiver, Sender, TryRecvError},
};

use super::{LinkKey, Transport, TransportError, TransportEvent};

enum Frame {
    Opened { link: LinkKey, remote: RemoteEnd },
    Packet(LinkKey, Box<[u8]>),
    Closed(LinkKey),
}

#[derive(Clone)]
struct RemoteEnd {
    inbox: Sender<Frame>,
    // the same link, as the remote transport knows it
    link: LinkKey,
    // where the remote transport listens, if it does
    address: Option<String>,
}

#[derive(Default)]
struct HubState {
    listeners: HashMap<String, Sender<Frame>>,
    drops: HashMap<String, usize>,
    next_link: u64,
}

/// An in-process network. Every [`ChannelTransport`] created from the same
/// hub can reach the others by address.
#[derive(Clone, Default)]
pub struct ChannelHub {
    state: Arc<Mutex<HubState>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport attached to this hub
    pub fn transport(&self) -> ChannelTransport {
        let (inbox, receiver) = channel::unbounded();
        ChannelTransport {
            hub: self.clone(),
            inbox,
            receiver,
            address: None,
            links: HashMap::new(),
        }
    }

    /// Silently discards the next `count` packets addressed to the transport
    /// listening at `address`. Link open/close notifications are never
    /// dropped. `usize::MAX` black-holes the address.
    pub fn drop_packets_to(&self, address: &str, count: usize) {
        if let Ok(mut state) = self.lock() {
            state.drops.insert(address.to_string(), count);
        }
    }

    /// Removes any drop rule for `address`
    pub fn restore(&self, address: &str) {
        if let Ok(mut state) = self.lock() {
            state.drops.remove(address);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HubState>, TransportError> {
        self.state.lock().map_err(|_| TransportError::Unavailable)
    }

    fn should_drop(&self, address: Option<&str>) -> bool {
        let Some(address) = address else {
            return false;
        };
        let Ok(mut state) = self.lock() else {
            return false;
        };
        let Some(remaining) = state.drops.get_mut(address) else {
            return false;
        };
        if *remaining == 0 {
            return false;
        }
        *remaining -= 1;
        true
    }
}

/// A [`Transport`] backed by `smol` channels
pub struct ChannelTransport {
    hub: ChannelHub,
    inbox: Sender<Frame>,
    receiver: Receiver<Frame>,
    address: Option<String>,
    links: HashMap<LinkKey, RemoteEnd>,
}

impl ChannelTransport {
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

impl Transport for ChannelTransport {
    fn listen(&mut self, address: &str) -> Result<(), TransportError> {
        let mut state = self.hub.lock()?;
        if state.listeners.contains_key(address) {
            return Err(TransportError::AddressInUse {
                address: address.to_string(),
            });
        }
        state
            .listeners
            .insert(address.to_string(), self.inbox.clone());
        self.address = Some(address.to_string());
        Ok(())
    }

    fn connect(&mut self, address: &str) -> Result<LinkKey, TransportError> {
        let (listener, local, remote) = {
            let mut state = self.hub.lock()?;
            let Some(listener) = state.listeners.get(address).cloned() else {
                return Err(TransportError::AddressNotFound {
                    address: address.to_string(),
                });
            };
            let local = LinkKey::new(state.next_link);
            let remote = LinkKey::new(state.next_link + 1);
            state.next_link += 2;
            (listener, local, remote)
        };

        let opened = Frame::Opened {
            link: remote,
            remote: RemoteEnd {
                inbox: self.inbox.clone(),
                link: local,
                address: self.address.clone(),
            },
        };
        if listener.try_send(opened).is_err() {
            return Err(TransportError::AddressNotFound {
                address: address.to_string(),
            });
        }

        self.links.insert(
            local,
            RemoteEnd {
                inbox: listener,
                link: remote,
                address: Some(address.to_string()),
            },
        );

        Ok(local)
    }

    fn send(&mut self, link: &LinkKey, payload: &[u8]) -> Result<(), TransportError> {
        let Some(remote) = self.links.get(link) else {
            return Err(TransportError::LinkNotFound { link: *link });
        };

        if self.hub.should_drop(remote.address.as_deref()) {
            debug!("dropping packet on link {}", link);
            return Ok(());
        }

        remote
            .inbox
            .try_send(Frame::Packet(remote.link, payload.into()))
            .map_err(|_| TransportError::LinkClosed { link: *link })
    }

    fn disconnect(&mut self, link: &LinkKey) {
        if let Some(remote) = self.links.remove(link) {
            let _ = remote.inbox.try_send(Frame::Closed(remote.link));
        }
    }

    fn receive(&mut self) -> Result<Option<TransportEvent>, TransportError> {
        loop {
            match self.receiver.try_recv() {
                Ok(Frame::Opened { link, remote }) => {
                    self.links.insert(link, remote);
                    return Ok(Some(TransportEvent::Connected(link)));
                }
                Ok(Frame::Packet(link, payload)) => {
                    if !self.links.contains_key(&link) {
                        // arrived after we closed the link
                        continue;
                    }
                    return Ok(Some(TransportEvent::Packet(link, payload)));
                }
                Ok(Frame::Closed(link)) => {
                    if self.links.remove(&link).is_some() {
                        return Ok(Some(TransportEvent::Disconnected(link)));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(_) => return Err(TransportError::Unavailable),
            }
        }
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        for (_, remote) in self.links.drain() {
            let _ = remote.inbox.try_send(Frame::Closed(remote.link));
        }
        if let Some(address) = self.address.take() {
            if let Ok(mut state) = self.hub.lock() {
                state.listeners.remove(&address);
            }
        }
    }
}
