//! The Endpoint Descriptor Table.
//!
//! Plain data structure; locking and snapshot publication live in
//! [`super::EndpointRegistry`]. Cloning is cheap enough (descriptors are
//! `Arc`ed) that writers stage mutations on a clone and commit only when
//! composition succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::descriptor::{EndpointDescriptor, RouteKey};
use super::error::RegistryError;

#[derive(Debug, Clone, Default)]
pub struct DescriptorTable {
    entries: BTreeMap<RouteKey, Arc<EndpointDescriptor>>,
    /// Keys per owner, in registration order.
    by_owner: BTreeMap<String, Vec<RouteKey>>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor.
    ///
    /// Fails when another owner already holds the same method and path
    /// shape. The same owner registering the key again replaces its prior
    /// descriptor.
    pub fn register(&mut self, descriptor: EndpointDescriptor) -> Result<(), RegistryError> {
        let key = descriptor.key();

        if let Some(existing) = self.entries.get(&key) {
            if existing.owner != descriptor.owner {
                return Err(RegistryError::conflict(
                    descriptor.method,
                    descriptor.full_path.clone(),
                    descriptor.owner.clone(),
                    existing.owner.clone(),
                ));
            }
        }

        let owned = self.by_owner.entry(descriptor.owner.clone()).or_default();
        if !owned.contains(&key) {
            owned.push(key.clone());
        }
        self.entries.insert(key, Arc::new(descriptor));
        Ok(())
    }

    /// Remove every descriptor owned by `owner`, returning them in the order
    /// they were registered. Unknown owners yield an empty list.
    pub fn unregister(&mut self, owner: &str) -> Vec<Arc<EndpointDescriptor>> {
        let Some(keys) = self.by_owner.remove(owner) else {
            return Vec::new();
        };
        keys.iter()
            .filter_map(|key| self.entries.remove(key))
            .collect()
    }

    /// Currently registered descriptors, ordered by method and path shape.
    pub fn all(&self) -> Vec<Arc<EndpointDescriptor>> {
        self.entries.values().cloned().collect()
    }

    pub fn owned_by(&self, owner: &str) -> Vec<Arc<EndpointDescriptor>> {
        self.by_owner
            .get(owner)
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| self.entries.get(key).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
