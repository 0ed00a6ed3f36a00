//! Endpoint registry.
//!
//! Owns the Descriptor Table and the live [`DispatchTable`]. Writers are
//! serialized by a mutex over the table; each mutation is staged on a copy,
//! composed, and only then committed and published by swapping the `Arc`
//! behind the read lock. Readers take a cheap clone of that `Arc` and keep
//! dispatching against it even if a newer table is published meanwhile.

mod composer;
mod descriptor;
mod error;
pub mod path;
mod table;

pub use composer::{CoreRoute, DispatchTable, RouteMatch, compose};
pub use descriptor::{CORE_OWNER, EndpointDescriptor, RouteKey};
pub use error::RegistryError;
pub use table::DescriptorTable;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};
use trellis_sdk::Endpoint;

pub struct EndpointRegistry {
    table: Mutex<DescriptorTable>,
    live: RwLock<Arc<DispatchTable>>,
    core_routes: Vec<CoreRoute>,
}

impl EndpointRegistry {
    pub fn new(core_routes: Vec<CoreRoute>) -> Self {
        Self {
            table: Mutex::new(DescriptorTable::new()),
            live: RwLock::new(Arc::new(DispatchTable::default())),
            core_routes,
        }
    }

    /// The current dispatch table.
    pub fn snapshot(&self) -> Arc<DispatchTable> {
        Arc::clone(&*self.live.read())
    }

    /// Register a single descriptor.
    pub fn register(&self, descriptor: EndpointDescriptor) -> Result<(), RegistryError> {
        let owner = descriptor.owner.clone();
        self.mutate(&owner, |staged| staged.register(descriptor))
            .map(|_| ())
    }

    /// Replace everything `owner` has registered with `endpoints`.
    ///
    /// Either every declaration is accepted and the new table is live when
    /// this returns, or nothing changes.
    pub fn register_plugin(
        &self,
        owner: &str,
        endpoints: Vec<Endpoint>,
    ) -> Result<usize, RegistryError> {
        let descriptors = endpoints
            .into_iter()
            .map(|ep| EndpointDescriptor::from_declaration(owner, ep))
            .collect::<Result<Vec<_>, _>>()?;
        let count = descriptors.len();

        self.mutate(owner, |staged| {
            staged.unregister(owner);
            descriptors
                .into_iter()
                .try_for_each(|descriptor| staged.register(descriptor))
        })?;

        info!(plugin = %owner, routes = count, "registered plugin routes");
        Ok(count)
    }

    /// Remove every descriptor owned by `owner`. A no-op for unknown owners.
    pub fn unregister(&self, owner: &str) -> Vec<Arc<EndpointDescriptor>> {
        let mut table = self.table.lock();
        let mut staged = table.clone();
        let removed = staged.unregister(owner);
        if removed.is_empty() {
            return removed;
        }

        // Removing routes cannot introduce a collision.
        match self.publish(&staged) {
            Ok(()) => {
                *table = staged;
                info!(plugin = %owner, routes = removed.len(), "unregistered plugin routes");
                removed
            }
            Err(e) => {
                error!(plugin = %owner, error = %e, "recomposition after removal failed");
                Vec::new()
            }
        }
    }

    /// Currently registered descriptors.
    pub fn all(&self) -> Vec<Arc<EndpointDescriptor>> {
        self.table.lock().all()
    }

    pub fn owned_by(&self, owner: &str) -> Vec<Arc<EndpointDescriptor>> {
        self.table.lock().owned_by(owner)
    }

    pub fn core_routes(&self) -> &[CoreRoute] {
        &self.core_routes
    }

    fn mutate<T>(
        &self,
        owner: &str,
        f: impl FnOnce(&mut DescriptorTable) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut table = self.table.lock();
        let mut staged = table.clone();

        let result = f(&mut staged).inspect_err(|e| {
            debug!(plugin = %owner, error = %e, "registration rejected");
        })?;
        self.publish(&staged)?;
        *table = staged;
        Ok(result)
    }

    /// Compose and swap in a new dispatch table. Caller holds the writer lock.
    fn publish(&self, staged: &DescriptorTable) -> Result<(), RegistryError> {
        let generation = self.live.read().generation() + 1;
        let composed = compose(&self.core_routes, &staged.all(), generation)?;
        debug!(generation, routes = composed.len(), "dispatch table published");
        *self.live.write() = Arc::new(composed);
        Ok(())
    }
}
