//! Fixed-capacity resource pools.
//!
//! A pool owns a fixed array of [`ResourceSlot`]s plus a queue of free slot
//! indices. Ids are minted from the free queue, so a slot index is reused only
//! after its previous resource was unassigned, and the unique stamp tells the
//! old and new occupant apart.

use std::collections::VecDeque;

use ember_core::alloc::HashMap;
use ember_core::profiling::{profile_function, profile_scope};

use crate::config::PoolConfig;
use crate::factory::{LoaderFactory, ResourceFactory};
use crate::id::Id;
use crate::io::Stream;
use crate::resource::{Resource, ResourceKind, ResourceSetup};
use crate::slot::ResourceSlot;
use crate::state::{PoolInfo, ResourceInfo, ResourceState};

/// Pool of resources of kind `K`, created by factory `F`.
pub struct ResourcePool<K: ResourceKind, F: ResourceFactory<K> = LoaderFactory<K>> {
    valid: bool,
    resource_type: u16,
    slots: Vec<ResourceSlot<K>>,
    free_slots: VecDeque<u16>,
    pending_slots: Vec<u16>,
    unique_counter: u32,
    frame_counter: u32,
    max_creates_per_frame: usize,
    placeholders: HashMap<u32, Id>,
    generic_placeholder: Option<u32>,
    factory: F,
}

impl<K: ResourceKind, F: ResourceFactory<K>> ResourcePool<K, F> {
    pub fn new(factory: F) -> Self {
        Self {
            valid: false,
            resource_type: Id::INVALID_TYPE,
            slots: Vec::new(),
            free_slots: VecDeque::new(),
            pending_slots: Vec::new(),
            unique_counter: 0,
            frame_counter: 0,
            max_creates_per_frame: PoolConfig::DEFAULT_MAX_CREATES_PER_FRAME,
            placeholders: HashMap::new(),
            generic_placeholder: None,
            factory,
        }
    }

    /// Allocate all slots.
    ///
    /// # Panics
    ///
    /// Panics if the pool is already set up or `config` is out of range.
    pub fn setup(&mut self, config: &PoolConfig) {
        assert!(!self.valid, "ResourcePool::setup called twice");
        config.validate();

        self.resource_type = config.resource_type;
        self.max_creates_per_frame = config.max_creates_per_frame;
        self.generic_placeholder = config.generic_placeholder;
        self.slots = (0..config.pool_size).map(|_| ResourceSlot::new()).collect();
        self.free_slots = (0..config.pool_size).map(|i| i as u16).collect();
        self.pending_slots = Vec::with_capacity(config.pool_size);
        self.valid = true;

        tracing::debug!(
            "Set up {} pool (type {}, {} slots)",
            K::NAME,
            self.resource_type,
            config.pool_size
        );
    }

    /// Release all slots.
    ///
    /// # Panics
    ///
    /// Panics if the pool is not set up or any slot is still assigned.
    pub fn discard(&mut self) {
        assert!(self.valid, "ResourcePool::discard called on a pool that is not set up");
        assert_eq!(
            self.free_slots.len(),
            self.slots.len(),
            "ResourcePool::discard: {} {} slots still in use",
            self.slots.len() - self.free_slots.len(),
            K::NAME
        );
        self.slots = Vec::new();
        self.free_slots = VecDeque::new();
        self.pending_slots = Vec::new();
        self.placeholders.clear();
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Advance the frame counter and settle pending resources.
    ///
    /// Pending slots are walked from the most recently queued one. At most
    /// `max_creates_per_frame` of them are validated. Returns the ids that
    /// became `Valid` or `Failed`.
    pub fn update(&mut self) -> Vec<Id> {
        profile_function!();
        assert!(self.valid, "ResourcePool::update called on a pool that is not set up");
        self.frame_counter = self.frame_counter.wrapping_add(1);

        let mut settled = Vec::new();
        let mut index = self.pending_slots.len();
        while index > 0 && settled.len() < self.max_creates_per_frame {
            index -= 1;
            let slot_index = self.pending_slots[index] as usize;
            let slot = &mut self.slots[slot_index];
            if !slot.is_pending() {
                self.pending_slots.swap_remove(index);
                continue;
            }
            if slot.ready_for_validate(&self.factory) {
                profile_scope!("validate");
                slot.validate(&mut self.factory);
                slot.observe_state(self.frame_counter);
                settled.push(slot.id());
                self.pending_slots.swap_remove(index);
            }
        }
        if !settled.is_empty() {
            tracing::trace!("{} pool settled {} resources", K::NAME, settled.len());
        }
        settled
    }

    /// Mint an id for the next free slot, or `None` when the pool is full.
    pub fn alloc_id(&mut self) -> Option<Id> {
        assert!(self.valid, "ResourcePool::alloc_id called on a pool that is not set up");
        let slot_index = self.free_slots.pop_front()?;
        debug_assert!(self.slots[slot_index as usize].is_unassigned());

        let id = Id::new(self.unique_counter, slot_index, self.resource_type);
        self.unique_counter = match self.unique_counter.wrapping_add(1) {
            Id::INVALID_UNIQUE_STAMP => 0,
            n => n,
        };
        Some(id)
    }

    /// Put a freshly allocated, never assigned id back.
    pub fn free_id(&mut self, id: Id) {
        let slot_index = self.slot_index_of(id);
        assert!(
            self.slots[slot_index].is_unassigned(),
            "ResourcePool::free_id: {} is still assigned",
            id
        );
        self.free_slots.push_back(id.slot_index());
    }

    /// Assign `setup` to the slot of a freshly allocated `id` and run the
    /// factory on it. Returns the state the resource ended up in.
    pub fn assign(&mut self, id: Id, setup: K::Setup, data: Option<Stream>) -> ResourceState {
        profile_function!();
        let slot_index = self.slot_index_of(id);
        let slot = &mut self.slots[slot_index];
        slot.assign(&mut self.factory, id, setup, data);
        slot.observe_state(self.frame_counter);

        let state = slot.state();
        if state == ResourceState::Pending {
            self.pending_slots.push(id.slot_index());
        }
        tracing::trace!("Assigned {} {} -> {}", K::NAME, id, state);
        state
    }

    /// Destroy the resource behind `id` and free its slot.
    ///
    /// Stale ids are ignored with a warning.
    pub fn unassign(&mut self, id: Id) {
        let slot_index = self.slot_index_of(id);
        let slot = &mut self.slots[slot_index];
        if slot.id() != id {
            tracing::warn!(
                "ResourcePool::unassign: {} not in {} pool (slot holds {})",
                id,
                K::NAME,
                slot.id()
            );
            return;
        }
        let was_pending = slot.is_pending();
        slot.unassign(&mut self.factory);
        slot.observe_state(self.frame_counter);
        if was_pending {
            self.pending_slots.retain(|&s| s != id.slot_index());
        }
        self.free_slots.push_back(id.slot_index());
    }

    /// The resource behind `id` if it is `Valid`, otherwise the matching
    /// placeholder.
    ///
    /// A resource that is still pending (or failed) resolves to the
    /// placeholder named by its setup; ids that do not resolve at all fall
    /// back to the generic placeholder.
    pub fn lookup(&self, id: Id) -> Option<&Resource<K>> {
        assert!(self.valid, "ResourcePool::lookup called on a pool that is not set up");
        let key = match self.get(id) {
            Some(res) if res.is_valid() => return Some(res),
            Some(res) => res.setup().placeholder(),
            None => self.generic_placeholder,
        };
        let placeholder = self.placeholders.get(&key?)?;
        self.get(*placeholder).filter(|res| res.is_valid())
    }

    /// The resource behind `id` regardless of its state.
    pub fn get(&self, id: Id) -> Option<&Resource<K>> {
        if !self.owns(id) {
            return None;
        }
        let slot = &self.slots[id.slot_index() as usize];
        (slot.id() == id).then(|| slot.resource())
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut Resource<K>> {
        if !self.owns(id) {
            return None;
        }
        let slot = &mut self.slots[id.slot_index() as usize];
        if slot.id() == id {
            Some(slot.resource_mut())
        } else {
            None
        }
    }

    /// True if `id` names the current occupant of its slot.
    pub fn contains(&self, id: Id) -> bool {
        self.get(id).is_some()
    }

    /// State of `id`, `None` when it does not resolve.
    pub fn query_state(&self, id: Id) -> Option<ResourceState> {
        self.get(id).map(|res| res.state())
    }

    /// State of `id` and the number of updates it has been in that state.
    pub fn query_resource_info(&self, id: Id) -> ResourceInfo {
        match self.get(id) {
            Some(res) => {
                let slot = &self.slots[id.slot_index() as usize];
                ResourceInfo {
                    state: res.state(),
                    state_age: self.frame_counter.wrapping_sub(slot.state_frame()),
                }
            }
            None => ResourceInfo::default(),
        }
    }

    pub fn query_pool_info(&self) -> PoolInfo {
        let mut info = PoolInfo {
            resource_type: self.resource_type,
            num_slots: self.num_slots(),
            num_used_slots: self.num_used_slots(),
            num_free_slots: self.num_free_slots(),
            ..PoolInfo::default()
        };
        for slot in &self.slots {
            info.num_slots_by_state[slot.state().index()] += 1;
        }
        info
    }

    /// Make `id` the placeholder for resources whose setup names `key`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this pool.
    pub fn register_placeholder(&mut self, key: u32, id: Id) {
        assert!(
            self.contains(id),
            "ResourcePool::register_placeholder: {} is not in the {} pool",
            id,
            K::NAME
        );
        if let Some(old) = self.placeholders.insert(key, id) {
            tracing::debug!("Replaced {} placeholder {:#x} ({} -> {})", K::NAME, key, old, id);
        }
    }

    pub fn unregister_placeholder(&mut self, key: u32) -> Option<Id> {
        self.placeholders.remove(&key)
    }

    pub fn placeholder(&self, key: u32) -> Option<Id> {
        self.placeholders.get(&key).copied()
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_used_slots(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    pub fn num_free_slots(&self) -> usize {
        self.free_slots.len()
    }

    pub fn num_pending_slots(&self) -> usize {
        self.pending_slots.len()
    }

    pub fn resource_type(&self) -> u16 {
        self.resource_type
    }

    /// Number of updates since setup.
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    /// Ids of all assigned slots.
    pub fn assigned_ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.slots.iter().filter(|s| s.is_assigned()).map(|s| s.id())
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    fn owns(&self, id: Id) -> bool {
        id.is_valid()
            && id.res_type() == self.resource_type
            && (id.slot_index() as usize) < self.slots.len()
    }

    fn slot_index_of(&self, id: Id) -> usize {
        assert!(self.valid, "ResourcePool: pool is not set up");
        assert!(id.is_valid(), "ResourcePool: invalid id");
        assert_eq!(
            id.res_type(),
            self.resource_type,
            "ResourcePool: {} does not belong to the {} pool",
            id,
            K::NAME
        );
        id.slot_index() as usize
    }
}

impl<K: ResourceKind, F: ResourceFactory<K>> Drop for ResourcePool<K, F> {
    fn drop(&mut self) {
        if self.valid && self.num_used_slots() > 0 && !std::thread::panicking() {
            tracing::warn!(
                "{} pool dropped with {} slots still in use",
                K::NAME,
                self.num_used_slots()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::fourcc;
    use crate::slot::tests::{Blob, BlobLoader, BlobSetup};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    const BLOB_TYPE: u16 = 3;

    fn pool(size: usize) -> ResourcePool<Blob> {
        let mut pool = ResourcePool::new(LoaderFactory::new().with_loader(BlobLoader::new()));
        pool.setup(&PoolConfig::new(BLOB_TYPE, size).with_max_creates_per_frame(2));
        pool
    }

    fn create(pool: &mut ResourcePool<Blob>, location: &str) -> Id {
        let id = pool.alloc_id().unwrap();
        pool.assign(id, BlobSetup::new(location), None);
        id
    }

    #[test]
    fn test_alloc_until_exhausted() {
        let mut pool = pool(2);
        let a = pool.alloc_id().unwrap();
        let b = pool.alloc_id().unwrap();
        assert_ne!(a.slot_index(), b.slot_index());
        assert_eq!(a.res_type(), BLOB_TYPE);
        assert!(pool.alloc_id().is_none());
        pool.free_id(a);
        pool.free_id(b);
        pool.discard();
    }

    #[test]
    fn test_slot_reuse_changes_stamp() {
        let mut pool = pool(1);
        let first = create(&mut pool, "sync:a");
        pool.unassign(first);
        let second = create(&mut pool, "sync:b");
        assert_eq!(first.slot_index(), second.slot_index());
        assert_ne!(first, second);
        assert!(!pool.contains(first));
        assert!(pool.lookup(first).is_none());
        pool.unassign(second);
        pool.discard();
    }

    #[test]
    fn test_stale_unassign_is_ignored() {
        let mut pool = pool(1);
        let first = create(&mut pool, "sync:a");
        pool.unassign(first);
        let second = create(&mut pool, "sync:b");
        pool.unassign(first);
        assert!(pool.contains(second));
        pool.unassign(second);
        pool.discard();
    }

    #[test]
    fn test_update_throttles_validation() {
        let loader = BlobLoader::new();
        let ready = Arc::clone(&loader.ready);
        let mut pool = ResourcePool::new(LoaderFactory::new().with_loader(loader));
        pool.setup(&PoolConfig::new(BLOB_TYPE, 8).with_max_creates_per_frame(2));

        let ids: Vec<Id> = (0..5).map(|i| create(&mut pool, &format!("async:{}", i))).collect();
        assert_eq!(pool.num_pending_slots(), 5);

        // nothing is ready yet
        assert!(pool.update().is_empty());
        assert_eq!(pool.num_pending_slots(), 5);

        ready.store(true, Ordering::Relaxed);
        // newest first
        assert_eq!(pool.update(), vec![ids[4], ids[3]]);
        assert_eq!(pool.update().len(), 2);
        assert_eq!(pool.update(), vec![ids[0]]);
        assert_eq!(pool.num_pending_slots(), 0);

        for id in &ids {
            assert_eq!(pool.query_state(*id), Some(ResourceState::Valid));
            pool.unassign(*id);
        }
        pool.discard();
    }

    #[test]
    fn test_pool_info_and_state_age() {
        let mut pool = pool(4);
        let valid = create(&mut pool, "sync:a");
        let failed = create(&mut pool, "bad:b");
        let pending = create(&mut pool, "async:c");

        pool.update();
        pool.update();
        let info = pool.query_pool_info();
        assert_eq!(info.num_slots, 4);
        assert_eq!(info.num_used_slots, 3);
        assert_eq!(info.num_free_slots, 1);
        assert_eq!(info.count(ResourceState::Valid), 1);
        assert_eq!(info.count(ResourceState::Failed), 1);
        assert_eq!(info.count(ResourceState::Pending), 1);
        assert_eq!(info.count(ResourceState::Initial), 1);

        assert_eq!(pool.query_resource_info(valid).state_age, 2);
        assert_eq!(pool.query_resource_info(pending).state, ResourceState::Pending);

        for id in [valid, failed, pending] {
            pool.unassign(id);
        }
        assert_eq!(pool.num_pending_slots(), 0);
        pool.discard();
    }

    #[test]
    fn test_placeholders() {
        const BLOB_PLACEHOLDER: u32 = fourcc(b"BLOB");
        let mut pool = ResourcePool::new(LoaderFactory::new().with_loader(BlobLoader::new()));
        pool.setup(&PoolConfig::new(BLOB_TYPE, 4).with_generic_placeholder(BLOB_PLACEHOLDER));

        let fallback = create(&mut pool, "sync:fallback");
        pool.register_placeholder(BLOB_PLACEHOLDER, fallback);

        let id = pool.alloc_id().unwrap();
        let mut setup = BlobSetup::new("async:x");
        setup.placeholder = Some(BLOB_PLACEHOLDER);
        pool.assign(id, setup, None);

        assert_eq!(pool.lookup(id).map(|r| r.id()), Some(fallback));
        assert_eq!(pool.lookup(Id::new(99, 3, BLOB_TYPE)).map(|r| r.id()), Some(fallback));
        assert_eq!(pool.get(id).map(|r| r.state()), Some(ResourceState::Pending));

        pool.unassign(id);
        pool.unregister_placeholder(BLOB_PLACEHOLDER);
        pool.unassign(fallback);
        pool.discard();
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn test_foreign_type_panics() {
        let mut pool = pool(2);
        pool.assign(Id::new(0, 0, BLOB_TYPE + 1), BlobSetup::new("sync:a"), None);
    }

    #[test]
    #[should_panic(expected = "still in use")]
    fn test_discard_with_used_slots_panics() {
        let mut pool = pool(2);
        create(&mut pool, "sync:a");
        pool.discard();
    }
}
