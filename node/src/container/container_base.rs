use std::{any::Any, collections::HashMap};

use peerlink_shared::{BitReader, ContainerHeader, Id, Serde};

use super::{ContainerError, SharedSet};
use crate::{events::ContainerUpdateEvent, link::LinkManager};

/// The part of a container the node drives without knowing its key and
/// value types
pub(crate) trait ContainerBase {
    fn name(&self) -> &str;

    fn on_new_peer(&mut self, link_manager: &mut LinkManager, node_id: &Id);

    fn on_peer_left(&mut self, node_id: &Id);

    fn receive(
        &mut self,
        link_manager: &mut LinkManager,
        from: &Id,
        header: &ContainerHeader,
        reader: &mut BitReader,
    ) -> Result<Option<ContainerUpdateEvent>, ContainerError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Work on a typed container, queued from another thread
pub(crate) type ContainerCommand = Box<
    dyn FnOnce(&mut ContainerRegistry, &mut LinkManager) -> Result<(), ContainerError> + Send,
>;

/// Every container of a node, by name
pub(crate) struct ContainerRegistry {
    containers: HashMap<String, Box<dyn ContainerBase>>,
}

impl ContainerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            containers: HashMap::new(),
        }
    }

    pub(crate) fn add<K, V>(
        &mut self,
        name: &str,
        node_id: Id,
    ) -> Result<&mut SharedSet<K, V>, ContainerError>
    where
        K: Serde + Ord + 'static,
        V: Serde + 'static,
    {
        if self.containers.contains_key(name) {
            return Err(ContainerError::DuplicateContainer {
                name: name.to_string(),
            });
        }
        self.containers.insert(
            name.to_string(),
            Box::new(SharedSet::<K, V>::new(name, node_id)),
        );
        self.get_mut::<K, V>(name)
    }

    pub(crate) fn get<K, V>(&self, name: &str) -> Result<&SharedSet<K, V>, ContainerError>
    where
        K: Serde + Ord + 'static,
        V: Serde + 'static,
    {
        let Some(container) = self.containers.get(name) else {
            return Err(ContainerError::UnknownContainer {
                name: name.to_string(),
            });
        };
        container
            .as_any()
            .downcast_ref::<SharedSet<K, V>>()
            .ok_or_else(|| ContainerError::ContainerTypeMismatch {
                name: name.to_string(),
            })
    }

    pub(crate) fn get_mut<K, V>(
        &mut self,
        name: &str,
    ) -> Result<&mut SharedSet<K, V>, ContainerError>
    where
        K: Serde + Ord + 'static,
        V: Serde + 'static,
    {
        let Some(container) = self.containers.get_mut(name) else {
            return Err(ContainerError::UnknownContainer {
                name: name.to_string(),
            });
        };
        container
            .as_any_mut()
            .downcast_mut::<SharedSet<K, V>>()
            .ok_or_else(|| ContainerError::ContainerTypeMismatch {
                name: name.to_string(),
            })
    }

    pub(crate) fn get_base_mut(&mut self, name: &str) -> Option<&mut Box<dyn ContainerBase>> {
        self.containers.get_mut(name)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn ContainerBase>> {
        self.containers.values_mut()
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.containers.keys().map(|name| name.as_str())
    }
}
