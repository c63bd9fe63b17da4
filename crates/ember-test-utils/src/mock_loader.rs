//! Scripted loaders for testing.
//!
//! Loaders record what the factory asked of them into a shared [`CallLog`]
//! instead of touching any backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ember_resource::{
    LoadStatus, Loader, Locator, Resource, ResourceError, ResourceKind, ResourceResult,
    ResourceSetup, ResourceState, Stream,
};
use parking_lot::Mutex;

/// Setup of a [`TestKind`] resource.
#[derive(Debug, Clone)]
pub struct TestSetup {
    pub locator: Locator,
    pub placeholder: Option<u32>,
}

impl TestSetup {
    pub fn new(location: &str) -> Self {
        Self {
            locator: Locator::new(location),
            placeholder: None,
        }
    }

    pub fn from_locator(locator: Locator) -> Self {
        Self {
            locator,
            placeholder: None,
        }
    }

    pub fn with_placeholder(mut self, key: u32) -> Self {
        self.placeholder = Some(key);
        self
    }
}

impl ResourceSetup for TestSetup {
    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn placeholder(&self) -> Option<u32> {
        self.placeholder
    }
}

/// Payload produced by a [`ScriptedLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPayload {
    /// Name of the loader that produced it.
    pub loader: String,
    /// Location of the resource.
    pub location: String,
    /// Length of the data stream, if one was supplied.
    pub data_len: Option<usize>,
}

/// Resource kind used by tests.
pub struct TestKind;

impl ResourceKind for TestKind {
    type Setup = TestSetup;
    type Payload = TestPayload;
    const NAME: &'static str = "Test";
}

/// Records a loader call for verification in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderCall {
    Accepts {
        loader: String,
        location: String,
    },
    Load {
        loader: String,
        location: String,
        state: ResourceState,
    },
    Unload {
        loader: String,
        location: String,
        had_payload: bool,
    },
}

impl LoaderCall {
    pub fn loader(&self) -> &str {
        match self {
            LoaderCall::Accepts { loader, .. } => loader,
            LoaderCall::Load { loader, .. } => loader,
            LoaderCall::Unload { loader, .. } => loader,
        }
    }
}

/// Call log shared between loaders and the test.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<LoaderCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: LoaderCall) {
        self.calls.lock().push(call);
    }

    /// Snapshot of all recorded calls.
    pub fn calls(&self) -> Vec<LoaderCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Number of `load` calls made on `loader`.
    pub fn loads_by(&self, loader: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, LoaderCall::Load { .. }) && c.loader() == loader)
            .count()
    }

    /// Number of `unload` calls made on `loader`.
    pub fn unloads_by(&self, loader: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, LoaderCall::Unload { .. }) && c.loader() == loader)
            .count()
    }

    /// Number of `accepts` calls made on `loader`.
    pub fn accepts_by(&self, loader: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, LoaderCall::Accepts { .. }) && c.loader() == loader)
            .count()
    }
}

/// Switch controlling when asynchronous loads may finish.
#[derive(Debug, Clone, Default)]
pub struct Gate(Arc<AtomicBool>);

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Sync,
    Async(Gate),
    Fail(String),
    /// Claims to be ready but never settles.
    Stuck,
}

/// Loader following a fixed script.
///
/// Accepts everything, or only locations starting with the prefix given to
/// [`accepting`](ScriptedLoader::accepting). Loads synchronously,
/// asynchronously behind a [`Gate`], or fails.
pub struct ScriptedLoader {
    name: String,
    prefix: Option<String>,
    behavior: Behavior,
    log: CallLog,
}

impl ScriptedLoader {
    fn new(name: &str, behavior: Behavior, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            prefix: None,
            behavior,
            log: log.clone(),
        }
    }

    /// Loader finishing every load immediately.
    pub fn sync(name: &str, log: &CallLog) -> Self {
        Self::new(name, Behavior::Sync, log)
    }

    /// Loader parking every load until `gate` opens.
    pub fn gated(name: &str, gate: &Gate, log: &CallLog) -> Self {
        Self::new(name, Behavior::Async(gate.clone()), log)
    }

    /// Loader failing every load with `message`.
    pub fn failing(name: &str, message: &str, log: &CallLog) -> Self {
        Self::new(name, Behavior::Fail(message.to_string()), log)
    }

    /// Loader that reports ready but keeps returning pending.
    pub fn stuck(name: &str, log: &CallLog) -> Self {
        Self::new(name, Behavior::Stuck, log)
    }

    /// Only accept locations starting with `prefix`.
    pub fn accepting(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    fn payload(&self, res: &Resource<TestKind>, data: Option<&Stream>) -> TestPayload {
        TestPayload {
            loader: self.name.clone(),
            location: res.location().to_string(),
            data_len: data.map(|d| d.len()),
        }
    }
}

impl Loader<TestKind> for ScriptedLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, res: &Resource<TestKind>, _data: Option<&Stream>) -> bool {
        self.log.record(LoaderCall::Accepts {
            loader: self.name.clone(),
            location: res.location().to_string(),
        });
        match &self.prefix {
            Some(prefix) => res.location().starts_with(prefix.as_str()),
            None => true,
        }
    }

    fn load(
        &mut self,
        res: &Resource<TestKind>,
        data: Option<&Stream>,
    ) -> ResourceResult<LoadStatus<TestPayload>> {
        self.log.record(LoaderCall::Load {
            loader: self.name.clone(),
            location: res.location().to_string(),
            state: res.state(),
        });
        match &self.behavior {
            Behavior::Sync => Ok(LoadStatus::Ready(self.payload(res, data))),
            Behavior::Async(_) if res.state() == ResourceState::Setup => Ok(LoadStatus::Pending),
            Behavior::Async(_) => Ok(LoadStatus::Ready(self.payload(res, data))),
            Behavior::Fail(message) => Err(ResourceError::loader(res.location(), message.clone())),
            Behavior::Stuck => Ok(LoadStatus::Pending),
        }
    }

    fn is_ready(&self, _res: &Resource<TestKind>) -> bool {
        match &self.behavior {
            Behavior::Async(gate) => gate.is_open(),
            _ => true,
        }
    }

    fn unload(&mut self, res: &Resource<TestKind>, payload: Option<TestPayload>) {
        self.log.record(LoaderCall::Unload {
            loader: self.name.clone(),
            location: res.location().to_string(),
            had_payload: payload.is_some(),
        });
    }
}
