//! Resource kinds and the per-slot resource object.

use std::fmt;

use crate::error::ResourceError;
use crate::id::Id;
use crate::locator::Locator;
use crate::state::ResourceState;

/// Build a four-character code, used as placeholder key.
///
/// ```
/// use ember_resource::resource::fourcc;
///
/// assert_eq!(fourcc(b"TEXT"), 0x5445_5854);
/// ```
pub const fn fourcc(tag: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*tag)
}

/// Creation parameters of a resource.
pub trait ResourceSetup: Clone + Send + 'static {
    /// Sharing key of the resource described by this setup.
    fn locator(&self) -> &Locator;

    /// Placeholder shown while the resource is not ready.
    fn placeholder(&self) -> Option<u32> {
        None
    }
}

/// A category of resources served by one pool.
///
/// # Example
///
/// ```ignore
/// struct TextureKind;
///
/// impl ResourceKind for TextureKind {
///     type Setup = TextureSetup;
///     type Payload = TextureObject;
///     const NAME: &'static str = "Texture";
/// }
/// ```
pub trait ResourceKind: 'static {
    type Setup: ResourceSetup;
    /// Backend object produced by a successful load.
    type Payload: Send + 'static;
    /// Human readable name, used in logs.
    const NAME: &'static str;
}

/// Resource object living in a pool slot.
///
/// Factories and loaders drive its state; everyone else reads it.
pub struct Resource<K: ResourceKind> {
    id: Id,
    state: ResourceState,
    setup: Option<K::Setup>,
    loader_index: Option<usize>,
    payload: Option<K::Payload>,
    failure: Option<ResourceError>,
}

impl<K: ResourceKind> Resource<K> {
    pub(crate) fn new() -> Self {
        Self {
            id: Id::invalid(),
            state: ResourceState::Initial,
            setup: None,
            loader_index: None,
            payload: None,
            failure: None,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Setup the resource was assigned with.
    ///
    /// # Panics
    ///
    /// Panics on an unassigned resource.
    pub fn setup(&self) -> &K::Setup {
        match &self.setup {
            Some(setup) => setup,
            None => panic!("{} resource {} has no setup", K::NAME, self.id),
        }
    }

    /// Location string of the setup, empty when unassigned.
    pub fn location(&self) -> &str {
        self.setup.as_ref().map(|s| s.locator().location()).unwrap_or("")
    }

    /// Index of the loader handling this resource.
    pub fn loader_index(&self) -> Option<usize> {
        self.loader_index
    }

    pub fn payload(&self) -> Option<&K::Payload> {
        self.payload.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut K::Payload> {
        self.payload.as_mut()
    }

    /// Why the resource is in the `Failed` state.
    pub fn failure(&self) -> Option<&ResourceError> {
        self.failure.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.state == ResourceState::Valid
    }

    pub fn is_pending(&self) -> bool {
        self.state == ResourceState::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.state == ResourceState::Failed
    }

    pub fn set_loader_index(&mut self, index: Option<usize>) {
        self.loader_index = index;
    }

    pub fn set_pending(&mut self) {
        self.state = ResourceState::Pending;
    }

    pub fn set_valid(&mut self, payload: K::Payload) {
        self.payload = Some(payload);
        self.failure = None;
        self.state = ResourceState::Valid;
    }

    pub fn set_failed(&mut self, error: ResourceError) {
        self.failure = Some(error);
        self.state = ResourceState::Failed;
    }

    /// Drop loader state and return to `Setup`, handing back the payload.
    pub fn reset_to_setup(&mut self) -> Option<K::Payload> {
        self.loader_index = None;
        self.failure = None;
        self.state = ResourceState::Setup;
        self.payload.take()
    }

    pub(crate) fn assign(&mut self, id: Id, setup: K::Setup) {
        self.id = id;
        self.setup = Some(setup);
        self.state = ResourceState::Setup;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::new();
    }
}

impl<K: ResourceKind> fmt::Debug for Resource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &K::NAME)
            .field("id", &self.id)
            .field("state", &self.state)
            .field("location", &self.location())
            .field("loader_index", &self.loader_index)
            .field("failure", &self.failure)
            .finish()
    }
}
