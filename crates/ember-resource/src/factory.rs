//! Resource factories and loaders.
//!
//! A pool never creates backend objects itself. It hands each resource to a
//! [`ResourceFactory`], which moves the resource out of the `Setup` state.
//! [`LoaderFactory`] is the standard factory: it delegates to the first
//! attached [`Loader`] that accepts the resource, so attachment order is
//! priority order.

use ember_core::profiling::profile_function;

use crate::error::{ResourceError, ResourceResult};
use crate::io::Stream;
use crate::resource::{Resource, ResourceKind};
use crate::state::ResourceState;

/// Outcome of a successful [`Loader::load`] call.
#[derive(Debug)]
pub enum LoadStatus<P> {
    /// Work is still in flight; the loader will be called again once
    /// [`Loader::is_ready`] returns `true`.
    Pending,
    /// The backend object is ready.
    Ready(P),
}

impl<P> LoadStatus<P> {
    pub fn is_pending(&self) -> bool {
        matches!(self, LoadStatus::Pending)
    }
}

/// Populates resources of kind `K`.
///
/// `load` is first called with the resource in the `Setup` state. Returning
/// [`LoadStatus::Pending`] parks the resource; the pool then polls
/// [`is_ready`](Loader::is_ready) on every update and calls `load` again
/// (with the resource `Pending`) once it returns `true`. The second call must
/// settle the resource.
pub trait Loader<K: ResourceKind>: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this loader can handle `res`. Must not have side effects.
    fn accepts(&self, res: &Resource<K>, data: Option<&Stream>) -> bool;

    /// Start or finish loading `res`.
    fn load(&mut self, res: &Resource<K>, data: Option<&Stream>) -> ResourceResult<LoadStatus<K::Payload>>;

    /// Whether a pending load can be finished.
    fn is_ready(&self, res: &Resource<K>) -> bool {
        let _ = res;
        true
    }

    /// Release the backend object of `res`, or drop its in-flight request
    /// when `payload` is `None`.
    fn unload(&mut self, res: &Resource<K>, payload: Option<K::Payload>) {
        let _ = (res, payload);
    }
}

/// Contract between a pool and whatever creates its resources.
pub trait ResourceFactory<K: ResourceKind> {
    /// True when a pending resource is ready to be set up again.
    fn needs_setup_resource(&self, res: &Resource<K>) -> bool;

    /// Move `res` out of `Setup` (first call) or out of `Pending` (follow-up
    /// call). Afterwards the resource is `Pending`, `Valid` or `Failed`.
    fn setup_resource(&mut self, res: &mut Resource<K>, data: Option<&Stream>);

    /// Release everything the factory created for `res` and leave it in
    /// `Setup`.
    fn destroy_resource(&mut self, res: &mut Resource<K>);
}

/// Factory delegating to an ordered list of loaders.
///
/// # Example
///
/// ```ignore
/// let mut factory = LoaderFactory::new();
/// factory.attach_loader(RenderTargetLoader::new(backend.clone()));
/// factory.attach_loader(FileLoader::new(io.clone(), TextureDecoder));
/// ```
pub struct LoaderFactory<K: ResourceKind> {
    loaders: Vec<Box<dyn Loader<K>>>,
}

impl<K: ResourceKind> LoaderFactory<K> {
    pub fn new() -> Self {
        Self { loaders: Vec::new() }
    }

    /// Append a loader. Earlier loaders take precedence.
    pub fn attach_loader(&mut self, loader: impl Loader<K> + 'static) {
        tracing::debug!(
            "Attached {} loader '{}' at priority {}",
            K::NAME,
            loader.name(),
            self.loaders.len()
        );
        self.loaders.push(Box::new(loader));
    }

    /// Builder-style [`LoaderFactory::attach_loader`].
    pub fn with_loader(mut self, loader: impl Loader<K> + 'static) -> Self {
        self.attach_loader(loader);
        self
    }

    pub fn num_loaders(&self) -> usize {
        self.loaders.len()
    }

    /// Loader names in priority order.
    pub fn loader_names(&self) -> impl Iterator<Item = &str> {
        self.loaders.iter().map(|l| l.name())
    }

    fn apply(res: &mut Resource<K>, loader: &str, result: ResourceResult<LoadStatus<K::Payload>>) {
        match result {
            Ok(LoadStatus::Pending) => res.set_pending(),
            Ok(LoadStatus::Ready(payload)) => res.set_valid(payload),
            Err(e) => {
                tracing::warn!(
                    "{} loader '{}' failed on '{}': {}",
                    K::NAME,
                    loader,
                    res.location(),
                    e
                );
                res.set_failed(e);
            }
        }
    }
}

impl<K: ResourceKind> Default for LoaderFactory<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ResourceKind> ResourceFactory<K> for LoaderFactory<K> {
    fn needs_setup_resource(&self, res: &Resource<K>) -> bool {
        match res.loader_index() {
            Some(index) => self.loaders[index].is_ready(res),
            None => false,
        }
    }

    fn setup_resource(&mut self, res: &mut Resource<K>, data: Option<&Stream>) {
        profile_function!();
        if let Some(index) = res.loader_index() {
            assert_eq!(
                res.state(),
                ResourceState::Pending,
                "LoaderFactory: follow-up setup of {} needs a pending resource",
                res.id()
            );
            let loader = &mut self.loaders[index];
            let result = loader.load(res, data);
            Self::apply(res, loader.name(), result);
            return;
        }

        assert_eq!(
            res.state(),
            ResourceState::Setup,
            "LoaderFactory: {} must be in the Setup state",
            res.id()
        );
        let accepting = self.loaders.iter().position(|l| l.accepts(res, data));
        match accepting {
            Some(index) => {
                res.set_loader_index(Some(index));
                let loader = &mut self.loaders[index];
                let result = loader.load(res, data);
                Self::apply(res, loader.name(), result);
            }
            None => {
                tracing::warn!("No suitable {} loader for '{}'", K::NAME, res.location());
                let error = ResourceError::NoLoader {
                    location: res.location().to_string(),
                    kind: K::NAME,
                };
                res.set_failed(error);
            }
        }
    }

    fn destroy_resource(&mut self, res: &mut Resource<K>) {
        let index = res.loader_index();
        let payload = res.reset_to_setup();
        if let Some(index) = index {
            self.loaders[index].unload(res, payload);
        }
    }
}
