//! Ember Core
//!
//! Shared building blocks for the Ember crates: hash collections, logging
//! setup and profiling hooks.

pub mod alloc;
pub mod logging;
pub mod profiling;
