//! Test utilities for Ember.
//!
//! This crate provides a throwaway resource kind and scripted loaders that
//! record every call made to them, so integration tests can drive a
//! [`ResourcePool`](ember_resource::ResourcePool) or
//! [`ResourceContainer`](ember_resource::ResourceContainer) without any real
//! backend.
//!
//! # Example
//!
//! ```rust
//! use ember_resource::{ContainerConfig, LoaderFactory, PoolConfig, ResourceContainer};
//! use ember_test_utils::{CallLog, ScriptedLoader, TestKind, TestSetup};
//!
//! let log = CallLog::new();
//! let factory = LoaderFactory::new().with_loader(ScriptedLoader::sync("any", &log));
//!
//! let mut container: ResourceContainer<TestKind> = ResourceContainer::new(factory);
//! container.setup(&ContainerConfig::new(PoolConfig::new(1, 8)));
//!
//! let id = container.create(TestSetup::new("test:a")).unwrap();
//! assert_eq!(log.loads_by("any"), 1);
//!
//! container.release(id);
//! container.discard();
//! ```

pub mod mock_loader;

pub use mock_loader::{CallLog, Gate, LoaderCall, ScriptedLoader, TestKind, TestPayload, TestSetup};
