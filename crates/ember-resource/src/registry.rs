//! Use-counted resource registry.
//!
//! The registry maps [`Locator`]s and [`Id`]s to entries stored in a dense
//! vector. It owns the use count of every registered resource but never the
//! resource itself: when a count reaches zero the entry's discard callback
//! runs, and it is up to the callback's owner to destroy the backing object.
//!
//! Removal swap-erases from the dense vector. The entry moved into the hole
//! carries its own id and locator, which are the keys of both index maps, so
//! fixing up the indices is a constant-time re-insert.

use ember_core::alloc::HashMap;
use ember_core::profiling::profile_function;

use crate::id::Id;
use crate::label::ResourceLabel;
use crate::locator::Locator;

/// Callback invoked with the id of an entry that is being removed.
///
/// Runs exactly once per entry, before the entry leaves the lookup tables.
pub type DiscardFn = Box<dyn FnMut(Id) + Send>;

struct Entry {
    locator: Locator,
    id: Id,
    use_count: u32,
    label: ResourceLabel,
    dependencies: Vec<Id>,
    discard: Option<DiscardFn>,
}

/// Locator/Id bookkeeping with use counts.
///
/// # Example
///
/// ```
/// use ember_resource::{Id, Locator, Registry};
///
/// let mut registry = Registry::new();
/// registry.setup(16);
///
/// let loc = Locator::new("tex:foo.png");
/// let id = Id::new(0, 0, 1);
/// registry.add(loc.clone(), id, None);
///
/// assert_eq!(registry.lookup(&loc), id);
/// registry.add_ref(id);
/// assert!(!registry.release(id));
/// assert!(registry.release(id));
/// assert!(!registry.contains(id));
///
/// registry.discard();
/// ```
pub struct Registry {
    valid: bool,
    entries: Vec<Entry>,
    locator_index: HashMap<Locator, usize>,
    id_index: HashMap<Id, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            valid: false,
            entries: Vec::new(),
            locator_index: HashMap::new(),
            id_index: HashMap::new(),
        }
    }

    /// Allocate storage for roughly `reserve` entries.
    ///
    /// # Panics
    ///
    /// Panics if the registry is already set up.
    pub fn setup(&mut self, reserve: usize) {
        assert!(!self.valid, "Registry::setup called twice");
        self.valid = true;
        self.entries.reserve(reserve);
        self.locator_index.reserve(reserve);
        self.id_index.reserve(reserve);
    }

    /// Release all storage.
    ///
    /// # Panics
    ///
    /// Panics if the registry is not set up or still holds entries.
    pub fn discard(&mut self) {
        assert!(self.valid, "Registry::discard called on a registry that is not set up");
        assert!(
            self.entries.is_empty(),
            "Registry::discard: {} entries still registered",
            self.entries.len()
        );
        self.entries = Vec::new();
        self.locator_index = HashMap::new();
        self.id_index = HashMap::new();
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Register `id` under `locator` with a use count of 1.
    ///
    /// # Panics
    ///
    /// Panics if `id` is invalid or already registered, or if `locator` is
    /// shared and already registered.
    pub fn add(&mut self, locator: Locator, id: Id, discard: Option<DiscardFn>) {
        self.add_with_dependencies(locator, id, ResourceLabel::DEFAULT, Vec::new(), discard);
    }

    /// Like [`Registry::add`], stamping the entry with `label`.
    pub fn add_labeled(
        &mut self,
        locator: Locator,
        id: Id,
        label: ResourceLabel,
        discard: Option<DiscardFn>,
    ) {
        self.add_with_dependencies(locator, id, label, Vec::new(), discard);
    }

    /// Register `id` as depending on `dependencies`.
    ///
    /// The new entry holds one use on each dependency, and every later
    /// [`add_ref`](Registry::add_ref) / [`release`](Registry::release) of the
    /// entry is applied to its dependencies as well. Releasing the last user
    /// of the entry therefore also releases what it depends on.
    ///
    /// # Panics
    ///
    /// Same conditions as [`Registry::add`], plus any dependency not being
    /// registered.
    pub fn add_with_dependencies(
        &mut self,
        locator: Locator,
        id: Id,
        label: ResourceLabel,
        dependencies: Vec<Id>,
        discard: Option<DiscardFn>,
    ) {
        profile_function!();
        assert!(self.valid, "Registry::add called on a registry that is not set up");
        assert!(id.is_valid(), "Registry::add called with an invalid id");
        assert!(label != ResourceLabel::ALL, "ResourceLabel::ALL cannot be assigned to an entry");
        assert!(
            !self.id_index.contains_key(&id),
            "Registry::add: id {} already registered",
            id
        );
        for dep in &dependencies {
            assert!(
                self.id_index.contains_key(dep),
                "Registry::add: dependency {} of {} is not registered",
                dep,
                id
            );
        }

        let index = self.entries.len();
        if locator.is_shared() {
            assert!(
                !self.locator_index.contains_key(&locator),
                "Registry::add: locator '{}' already registered",
                locator
            );
            self.locator_index.insert(locator.clone(), index);
        }
        self.id_index.insert(id, index);

        for dep in &dependencies {
            self.add_ref(*dep);
        }

        tracing::trace!("Registered {} as '{}' ({:?})", id, locator, label);
        self.entries.push(Entry {
            locator,
            id,
            use_count: 1,
            label,
            dependencies,
            discard,
        });
        debug_assert!(self.check_integrity());
    }

    /// Id of the shared entry registered under `locator`.
    ///
    /// Returns the invalid id for non-shared or unknown locators. Use counts
    /// are left alone.
    pub fn lookup(&self, locator: &Locator) -> Id {
        assert!(self.valid, "Registry::lookup called on a registry that is not set up");
        if !locator.is_shared() {
            return Id::invalid();
        }
        self.locator_index
            .get(locator)
            .map(|&index| self.entries[index].id)
            .unwrap_or_default()
    }

    /// Increment the use count of `id` and of everything it depends on.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not registered.
    pub fn add_ref(&mut self, id: Id) {
        let index = self.index_of(id);
        let entry = &mut self.entries[index];
        entry.use_count += 1;
        if entry.dependencies.is_empty() {
            return;
        }
        let deps = entry.dependencies.clone();
        for dep in deps {
            // a labeled dependency can be removed before its dependent
            if self.id_index.contains_key(&dep) {
                self.add_ref(dep);
            } else {
                tracing::warn!("Registry: dependency {} of {} already removed", dep, id);
            }
        }
    }

    /// Decrement the use count of `id` and of everything it depends on.
    ///
    /// When the count of `id` reaches zero its discard callback runs and the
    /// entry is removed; `true` is returned in that case. Releasing an unknown
    /// id is a no-op returning `false`.
    pub fn release(&mut self, id: Id) -> bool {
        profile_function!();
        assert!(self.valid, "Registry::release called on a registry that is not set up");
        if !self.id_index.contains_key(&id) {
            tracing::debug!("Registry::release: {} is not registered", id);
            return false;
        }
        let mut removed = Vec::new();
        self.release_uses(id, 1, &mut removed);
        removed.first() == Some(&id)
    }

    /// Remove every entry matching `label` and return the removed ids.
    ///
    /// [`ResourceLabel::ALL`] removes everything. Discard callbacks run for
    /// each removed entry. Dependencies outside the label lose the uses the
    /// removed entries held on them, and are removed too if that was the last.
    pub fn remove_by_label(&mut self, label: ResourceLabel) -> Vec<Id> {
        profile_function!();
        assert!(self.valid, "Registry::remove_by_label called on a registry that is not set up");

        let mut removed = Vec::new();
        let mut index = self.entries.len();
        while index > 0 {
            index -= 1;
            // cascading releases may have shrunk the vector
            if index >= self.entries.len() || !label.matches(self.entries[index].label) {
                continue;
            }
            let use_count = self.entries[index].use_count;
            let entry = self.remove_at(index);
            removed.push(entry.id);
            for dep in entry.dependencies {
                if self.id_index.contains_key(&dep) {
                    self.release_uses(dep, use_count, &mut removed);
                }
            }
        }
        if !removed.is_empty() {
            tracing::debug!("Removed {} entries with label {:?}", removed.len(), label);
        }
        removed
    }

    /// True if `id` is registered.
    pub fn contains(&self, id: Id) -> bool {
        self.id_index.contains_key(&id)
    }

    /// Current use count of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not registered.
    pub fn use_count(&self, id: Id) -> u32 {
        self.entries[self.index_of(id)].use_count
    }

    /// Locator `id` was registered under.
    pub fn locator(&self, id: Id) -> Option<&Locator> {
        self.id_index.get(&id).map(|&index| &self.entries[index].locator)
    }

    /// Label `id` was registered with.
    pub fn label(&self, id: Id) -> Option<ResourceLabel> {
        self.id_index.get(&id).map(|&index| self.entries[index].label)
    }

    /// Dependencies `id` was registered with.
    pub fn dependencies(&self, id: Id) -> Option<&[Id]> {
        self.id_index
            .get(&id)
            .map(|&index| self.entries[index].dependencies.as_slice())
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of the entry at dense position `index`.
    ///
    /// Positions are not stable across removals.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn id_by_index(&self, index: usize) -> Id {
        self.entries[index].id
    }

    /// Iterate over all registered ids in dense order.
    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// Verify that both index maps point at matching entries.
    ///
    /// Mismatches are logged with `tracing::error!`.
    pub fn check_integrity(&self) -> bool {
        for (locator, &index) in &self.locator_index {
            match self.entries.get(index) {
                Some(entry) if entry.locator == *locator => {}
                Some(entry) => {
                    tracing::error!(
                        "Registry: locator mismatch at index {} ('{}' != '{}')",
                        index,
                        entry.locator,
                        locator
                    );
                    return false;
                }
                None => {
                    tracing::error!("Registry: locator '{}' points past the end ({})", locator, index);
                    return false;
                }
            }
        }
        for (id, &index) in &self.id_index {
            match self.entries.get(index) {
                Some(entry) if entry.id == *id => {}
                Some(entry) => {
                    tracing::error!("Registry: id mismatch at index {} ({} != {})", index, entry.id, id);
                    return false;
                }
                None => {
                    tracing::error!("Registry: id {} points past the end ({})", id, index);
                    return false;
                }
            }
        }
        if self.id_index.len() != self.entries.len() {
            tracing::error!(
                "Registry: {} ids indexed for {} entries",
                self.id_index.len(),
                self.entries.len()
            );
            return false;
        }
        true
    }

    fn index_of(&self, id: Id) -> usize {
        match self.id_index.get(&id) {
            Some(&index) => index,
            None => panic!("Registry: id {} is not registered", id),
        }
    }

    /// Drop `count` uses from `id` and its dependencies, collecting removed ids.
    fn release_uses(&mut self, id: Id, count: u32, removed: &mut Vec<Id>) {
        let index = self.index_of(id);
        let entry = &mut self.entries[index];
        assert!(
            entry.use_count >= count,
            "Registry: releasing {} uses of {} which only has {}",
            count,
            id,
            entry.use_count
        );
        entry.use_count -= count;

        let deps = if entry.use_count == 0 {
            let entry = self.remove_at(index);
            removed.push(id);
            entry.dependencies
        } else if entry.dependencies.is_empty() {
            return;
        } else {
            entry.dependencies.clone()
        };

        for dep in deps {
            if self.id_index.contains_key(&dep) {
                self.release_uses(dep, count, removed);
            } else {
                tracing::warn!("Registry: dependency {} of {} already removed", dep, id);
            }
        }
    }

    fn remove_at(&mut self, index: usize) -> Entry {
        let id = self.entries[index].id;
        if let Some(discard) = self.entries[index].discard.as_mut() {
            discard(id);
        }

        let entry = self.entries.swap_remove(index);
        self.id_index.remove(&entry.id);
        if entry.locator.is_shared() {
            self.locator_index.remove(&entry.locator);
        }

        if let Some(moved) = self.entries.get(index) {
            self.id_index.insert(moved.id, index);
            if moved.locator.is_shared() {
                self.locator_index.insert(moved.locator.clone(), index);
            }
        }

        tracing::trace!("Removed {} ('{}')", entry.id, entry.locator);
        debug_assert!(self.check_integrity());
        entry
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if self.valid && !self.entries.is_empty() && !std::thread::panicking() {
            tracing::warn!("Registry dropped with {} entries still registered", self.entries.len());
        }
    }
}
