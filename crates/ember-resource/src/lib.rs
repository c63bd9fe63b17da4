//! Ember resource lifecycle.
//!
//! This crate provides the machinery every resource category in Ember is built
//! on:
//!
//! - [`Id`] - compact typed handle (unique stamp, slot index, resource type)
//! - [`Locator`] - sharing key deciding whether two requests resolve to the
//!   same resource
//! - [`Registry`] - use-counted Locator/Id bookkeeping with discard callbacks
//! - [`ResourceSlot`] / [`ResourcePool`] - fixed-capacity slots, each driven
//!   through the `Initial -> Setup -> Pending -> Valid/Failed` state machine
//! - [`LoaderFactory`] - delegates population of a resource to the first
//!   attached [`Loader`] that accepts it
//! - [`ResourceContainer`] - ties the pieces together into a
//!   create-or-lookup / release API
//!
//! Everything runs on the caller's thread. Asynchronous loads are polled from
//! [`ResourceContainer::update`] once per tick.
//!
//! # Example
//!
//! ```ignore
//! let mut textures: ResourceContainer<TextureKind> = ResourceContainer::new(factory);
//! textures.setup(&ContainerConfig::new(PoolConfig::new(TEXTURE_TYPE, 128)));
//!
//! let a = textures.create(TextureSetup::from_file("tex:foo.png"))?;
//! let b = textures.create(TextureSetup::from_file("tex:foo.png"))?;
//! assert_eq!(a, b);
//!
//! // once per frame
//! textures.update();
//! for event in textures.drain_events() { /* ... */ }
//!
//! textures.release(a);
//! textures.release(b); // last user, slot is destroyed
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod event;
pub mod factory;
pub mod id;
pub mod io;
pub mod label;
pub mod loaders;
pub mod locator;
pub mod pool;
pub mod registry;
pub mod resource;
pub mod slot;
pub mod state;

pub use config::{ContainerConfig, PoolConfig};
pub use container::ResourceContainer;
pub use error::{ResourceError, ResourceResult};
pub use event::{ResourceEvent, ResourceEventBuffer};
pub use factory::{LoadStatus, Loader, LoaderFactory, ResourceFactory};
pub use id::Id;
pub use io::{BytesReader, FileReader, IoQueue, IoTicket, MemoryReader, SharedIoQueue, Stream};
pub use label::{LabelStack, ResourceLabel};
pub use loaders::{DataLoader, FileLoader, StreamDecoder};
pub use locator::Locator;
pub use pool::ResourcePool;
pub use registry::{DiscardFn, Registry};
pub use resource::{Resource, ResourceKind, ResourceSetup};
pub use slot::ResourceSlot;
pub use state::{PoolInfo, ResourceInfo, ResourceState};
