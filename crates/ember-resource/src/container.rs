//! Per-kind resource container.
//!
//! A [`ResourceContainer`] ties a [`Registry`], a [`ResourcePool`] and a label
//! stack together into the create-or-lookup / release API clients use.
//!
//! Destroying a resource happens through the registry's discard callback: the
//! callback only records the id in a shared queue, and the container drains
//! that queue after every registry call, unassigning the pool slot of each
//! recorded id.

use std::sync::Arc;

use ember_core::profiling::profile_function;
use parking_lot::Mutex;

use crate::config::ContainerConfig;
use crate::error::{ResourceError, ResourceResult};
use crate::event::{ResourceEvent, ResourceEventBuffer};
use crate::factory::{LoaderFactory, ResourceFactory};
use crate::id::Id;
use crate::io::Stream;
use crate::label::{LabelStack, ResourceLabel};
use crate::locator::Locator;
use crate::pool::ResourcePool;
use crate::registry::{DiscardFn, Registry};
use crate::resource::{Resource, ResourceKind, ResourceSetup};
use crate::state::{PoolInfo, ResourceInfo, ResourceState};

/// Registry, pool and label stack for one resource kind.
///
/// # Example
///
/// ```ignore
/// let mut meshes = ResourceContainer::new(factory);
/// meshes.setup(&ContainerConfig::new(PoolConfig::new(MESH_TYPE, 64)));
///
/// let level = meshes.push_new_label();
/// let quad = meshes.create(MeshSetup::from_file("mesh:quad.bin"))?;
/// meshes.pop_label();
///
/// // later: drop everything created for the level
/// meshes.destroy(level);
/// ```
pub struct ResourceContainer<K: ResourceKind, F: ResourceFactory<K> = LoaderFactory<K>> {
    registry: Registry,
    pool: ResourcePool<K, F>,
    labels: LabelStack,
    events: ResourceEventBuffer,
    discarded: Arc<Mutex<Vec<Id>>>,
}

impl<K: ResourceKind, F: ResourceFactory<K>> ResourceContainer<K, F> {
    pub fn new(factory: F) -> Self {
        Self {
            registry: Registry::new(),
            pool: ResourcePool::new(factory),
            labels: LabelStack::new(),
            events: ResourceEventBuffer::new(),
            discarded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set up the registry and the pool.
    pub fn setup(&mut self, config: &ContainerConfig) {
        self.registry.setup(config.registry_capacity());
        self.pool.setup(&config.pool);
    }

    /// Destroy every remaining resource and release all storage.
    pub fn discard(&mut self) {
        let remaining = self.destroy(ResourceLabel::ALL);
        if remaining > 0 {
            tracing::debug!("Destroyed {} {} resources on discard", remaining, K::NAME);
        }
        self.registry.discard();
        self.pool.discard();
        self.events.clear();
    }

    pub fn is_valid(&self) -> bool {
        self.registry.is_valid() && self.pool.is_valid()
    }

    /// Create a resource, or share an existing one with the same locator.
    ///
    /// A shared hit bumps the use count and returns the existing id. A miss
    /// allocates a slot, registers the locator with a use count of 1 under the
    /// current label and hands the resource to the factory. Load failures do
    /// not make this return an error: the resource ends up `Failed` and a
    /// [`ResourceEvent::LoadFailed`] is queued.
    ///
    /// # Errors
    ///
    /// [`ResourceError::PoolExhausted`] when no slot is free.
    pub fn create(&mut self, setup: K::Setup) -> ResourceResult<Id> {
        self.create_with_data(setup, None)
    }

    /// Like [`create`](ResourceContainer::create), with the resource data
    /// supplied in memory.
    pub fn create_with_data(&mut self, setup: K::Setup, data: Option<Stream>) -> ResourceResult<Id> {
        profile_function!();
        let locator = setup.locator().clone();
        let existing = self.registry.lookup(&locator);
        if existing.is_valid() {
            self.registry.add_ref(existing);
            return Ok(existing);
        }

        let Some(id) = self.pool.alloc_id() else {
            tracing::warn!("{} pool exhausted while creating '{}'", K::NAME, locator);
            return Err(ResourceError::PoolExhausted {
                resource_type: self.pool.resource_type(),
                capacity: self.pool.num_slots(),
            });
        };

        let discard = self.discard_fn();
        self.registry
            .add_labeled(locator, id, self.labels.current(), Some(discard));
        let state = self.pool.assign(id, setup, data);
        self.emit_settled(id, state);
        Ok(id)
    }

    /// Id of the shared resource registered under `locator`.
    ///
    /// A hit counts as a new use and must be balanced by
    /// [`release`](ResourceContainer::release). Misses return the invalid id.
    pub fn lookup(&mut self, locator: &Locator) -> Id {
        let id = self.registry.lookup(locator);
        if id.is_valid() {
            self.registry.add_ref(id);
        }
        id
    }

    /// Add a use to `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not registered.
    pub fn add_ref(&mut self, id: Id) {
        self.registry.add_ref(id);
    }

    /// Drop a use of `id`, destroying the resource on the last one.
    ///
    /// Returns `true` if the resource was destroyed.
    pub fn release(&mut self, id: Id) -> bool {
        let destroyed = self.registry.release(id);
        self.flush_discarded();
        destroyed
    }

    /// Destroy every resource created under `label`, regardless of its use
    /// count. Returns how many were destroyed.
    pub fn destroy(&mut self, label: ResourceLabel) -> usize {
        let removed = self.registry.remove_by_label(label);
        self.flush_discarded();
        removed.len()
    }

    /// Make `label` the label of newly created resources.
    pub fn push_label(&mut self, label: ResourceLabel) {
        self.labels.push(label);
    }

    /// Generate, push and return a fresh label.
    pub fn push_new_label(&mut self) -> ResourceLabel {
        self.labels.push_new()
    }

    pub fn pop_label(&mut self) -> ResourceLabel {
        self.labels.pop()
    }

    pub fn current_label(&self) -> ResourceLabel {
        self.labels.current()
    }

    /// Settle pending resources and queue their events.
    pub fn update(&mut self) {
        profile_function!();
        for id in self.pool.update() {
            if let Some(state) = self.pool.query_state(id) {
                self.emit_settled(id, state);
            }
        }
    }

    /// The resource behind `id` if it is valid, otherwise its placeholder.
    pub fn resource(&self, id: Id) -> Option<&Resource<K>> {
        self.pool.lookup(id)
    }

    /// The resource behind `id` in whatever state it is in.
    pub fn get(&self, id: Id) -> Option<&Resource<K>> {
        self.pool.get(id)
    }

    pub fn query_state(&self, id: Id) -> Option<ResourceState> {
        self.pool.query_state(id)
    }

    pub fn query_resource_info(&self, id: Id) -> ResourceInfo {
        self.pool.query_resource_info(id)
    }

    pub fn query_pool_info(&self) -> PoolInfo {
        self.pool.query_pool_info()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.registry.contains(id)
    }

    /// Use count of `id`, 0 when it is not registered.
    pub fn use_count(&self, id: Id) -> u32 {
        if self.registry.contains(id) {
            self.registry.use_count(id)
        } else {
            0
        }
    }

    pub fn locator(&self, id: Id) -> Option<&Locator> {
        self.registry.locator(id)
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// See [`ResourcePool::register_placeholder`].
    pub fn register_placeholder(&mut self, key: u32, id: Id) {
        self.pool.register_placeholder(key, id);
    }

    /// Take all queued events.
    pub fn drain_events(&mut self) -> Vec<ResourceEvent> {
        self.events.drain().collect()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn pool(&self) -> &ResourcePool<K, F> {
        &self.pool
    }

    pub fn factory_mut(&mut self) -> &mut F {
        self.pool.factory_mut()
    }

    fn discard_fn(&self) -> DiscardFn {
        let queue = Arc::clone(&self.discarded);
        Box::new(move |id| queue.lock().push(id))
    }

    fn flush_discarded(&mut self) {
        let discarded = std::mem::take(&mut *self.discarded.lock());
        for id in discarded {
            self.pool.unassign(id);
            tracing::debug!("Destroyed {} {}", K::NAME, id);
            self.events.push(ResourceEvent::Removed { id });
        }
    }

    fn emit_settled(&mut self, id: Id, state: ResourceState) {
        let Some(locator) = self.registry.locator(id).cloned() else {
            return;
        };
        match state {
            ResourceState::Valid => {
                self.events.push(ResourceEvent::Created { id, locator });
            }
            ResourceState::Failed => {
                let error = self
                    .pool
                    .get(id)
                    .and_then(|res| res.failure())
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                tracing::warn!("{} '{}' failed to load: {}", K::NAME, locator, error);
                self.events.push(ResourceEvent::LoadFailed { id, locator, error });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::slot::tests::{Blob, BlobLoader, BlobSetup};
    use std::sync::atomic::Ordering;

    const BLOB_TYPE: u16 = 5;

    fn container(size: usize) -> (ResourceContainer<Blob>, Arc<std::sync::atomic::AtomicBool>) {
        let loader = BlobLoader::new();
        let ready = Arc::clone(&loader.ready);
        let mut container = ResourceContainer::new(LoaderFactory::new().with_loader(loader));
        container.setup(&ContainerConfig::new(PoolConfig::new(BLOB_TYPE, size)));
        (container, ready)
    }

    #[test]
    fn test_shared_create_returns_same_id() {
        let (mut c, _) = container(4);
        let a = c.create(BlobSetup::new("sync:a")).unwrap();
        let b = c.create(BlobSetup::new("sync:a")).unwrap();
        assert_eq!(a, b);
        assert_eq!(c.use_count(a), 2);
        assert_eq!(c.query_pool_info().num_used_slots, 1);

        assert!(!c.release(a));
        assert!(c.release(b));
        assert!(!c.contains(a));
        assert_eq!(c.query_state(a), None);

        let events = c.drain_events();
        assert!(events[0].is_created());
        assert_eq!(events.last(), Some(&ResourceEvent::Removed { id: a }));
        c.discard();
    }

    #[test]
    fn test_non_shared_create_allocates() {
        let (mut c, _) = container(4);
        let setup = BlobSetup {
            locator: Locator::non_shared_at("sync:a"),
            placeholder: None,
        };
        let a = c.create(setup.clone()).unwrap();
        let b = c.create(setup).unwrap();
        assert_ne!(a, b);
        assert_eq!(c.len(), 2);
        c.discard();
    }

    #[test]
    fn test_pool_exhausted() {
        let (mut c, _) = container(1);
        c.create(BlobSetup::new("sync:a")).unwrap();
        let err = c.create(BlobSetup::new("sync:b")).unwrap_err();
        assert!(matches!(err, ResourceError::PoolExhausted { capacity: 1, .. }));
        // sharing still works on a full pool
        assert!(c.create(BlobSetup::new("sync:a")).is_ok());
        c.discard();
    }

    #[test]
    fn test_lookup_counts_as_use() {
        let (mut c, _) = container(2);
        let id = c.create(BlobSetup::new("sync:a")).unwrap();
        assert_eq!(c.lookup(&Locator::new("sync:a")), id);
        assert_eq!(c.use_count(id), 2);
        assert!(!c.lookup(&Locator::new("sync:zzz")).is_valid());
        c.discard();
    }

    #[test]
    fn test_async_create_event_on_update() {
        let (mut c, ready) = container(2);
        let id = c.create(BlobSetup::new("async:a")).unwrap();
        assert_eq!(c.query_state(id), Some(ResourceState::Pending));
        assert!(c.resource(id).is_none());
        assert!(c.drain_events().is_empty());

        ready.store(true, Ordering::Relaxed);
        c.update();
        assert_eq!(c.query_state(id), Some(ResourceState::Valid));
        assert!(c.resource(id).is_some());
        assert!(c.drain_events().iter().any(|e| e.is_created() && e.id() == id));
        c.discard();
    }

    #[test]
    fn test_failed_create_reports_event() {
        let (mut c, _) = container(2);
        let id = c.create(BlobSetup::new("bad:a")).unwrap();
        assert_eq!(c.query_state(id), Some(ResourceState::Failed));
        let events = c.drain_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_failed());
        assert!(c.release(id));
        c.discard();
    }

    #[test]
    fn test_destroy_by_label() {
        let (mut c, _) = container(8);
        let keep = c.create(BlobSetup::new("sync:keep")).unwrap();
        let level = c.push_new_label();
        let a = c.create(BlobSetup::new("sync:a")).unwrap();
        let b = c.create(BlobSetup::new("async:b")).unwrap();
        c.add_ref(a);
        assert_eq!(c.pop_label(), level);

        assert_eq!(c.destroy(level), 2);
        assert!(!c.contains(a));
        assert!(!c.contains(b));
        assert!(c.contains(keep));
        assert_eq!(c.pool().num_pending_slots(), 0);
        assert_eq!(c.query_pool_info().num_used_slots, 1);
        c.discard();
        assert!(!c.is_valid());
    }
}
