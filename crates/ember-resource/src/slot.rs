//! Pool slots and the resource state machine.
//!
//! ```text
//! Initial --assign--> Setup --(sync ok)---> Valid
//!                       |  \--(sync fail)--> Failed
//!                       \--(async)--> Pending --validate ok---> Valid
//!                                           \--validate fail--> Failed
//! Valid | Failed | Pending --unassign--> Initial
//! ```

use crate::error::ResourceError;
use crate::factory::ResourceFactory;
use crate::id::Id;
use crate::io::Stream;
use crate::resource::{Resource, ResourceKind};
use crate::state::ResourceState;

/// A slot of a [`ResourcePool`](crate::ResourcePool).
pub struct ResourceSlot<K: ResourceKind> {
    resource: Resource<K>,
    stream: Option<Stream>,
    state_frame: u32,
    observed_state: ResourceState,
}

impl<K: ResourceKind> ResourceSlot<K> {
    pub fn new() -> Self {
        Self {
            resource: Resource::new(),
            stream: None,
            state_frame: 0,
            observed_state: ResourceState::Initial,
        }
    }

    /// Bind `id` and `setup` to this slot and let `factory` set it up.
    ///
    /// When the factory leaves the resource `Pending`, `data` is retained for
    /// [`validate`](ResourceSlot::validate).
    ///
    /// # Panics
    ///
    /// Panics if the slot is not `Initial`.
    pub fn assign<F: ResourceFactory<K> + ?Sized>(
        &mut self,
        factory: &mut F,
        id: Id,
        setup: K::Setup,
        data: Option<Stream>,
    ) {
        assert!(
            self.is_unassigned(),
            "ResourceSlot::assign: slot of {} is {}",
            self.resource.id(),
            self.resource.state()
        );
        debug_assert!(self.stream.is_none());

        self.resource.assign(id, setup);
        factory.setup_resource(&mut self.resource, data.as_ref());

        let state = self.resource.state();
        assert!(
            matches!(
                state,
                ResourceState::Pending | ResourceState::Valid | ResourceState::Failed
            ),
            "ResourceSlot::assign: factory left {} in state {}",
            id,
            state
        );
        if state == ResourceState::Pending {
            self.stream = data;
        }
    }

    /// True when a pending resource can be validated.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not `Pending`.
    pub fn ready_for_validate<F: ResourceFactory<K> + ?Sized>(&self, factory: &F) -> bool {
        assert!(self.is_pending(), "ResourceSlot::ready_for_validate: slot is not pending");
        factory.needs_setup_resource(&self.resource)
    }

    /// Finish a pending resource. Leaves it `Valid` or `Failed`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not `Pending`.
    pub fn validate<F: ResourceFactory<K> + ?Sized>(&mut self, factory: &mut F) {
        assert!(self.is_pending(), "ResourceSlot::validate: slot is not pending");

        let stream = self.stream.take();
        factory.setup_resource(&mut self.resource, stream.as_ref());

        match self.resource.state() {
            ResourceState::Valid | ResourceState::Failed => {}
            ResourceState::Pending => {
                tracing::error!(
                    "{} '{}' still pending after validation",
                    K::NAME,
                    self.resource.location()
                );
                let error = ResourceError::loader(
                    self.resource.location(),
                    "loader reported pending after it was ready",
                );
                self.resource.set_failed(error);
            }
            state => panic!(
                "ResourceSlot::validate: factory left {} in state {}",
                self.resource.id(),
                state
            ),
        }
    }

    /// Destroy the resource and return the slot to `Initial`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already `Initial`, or if the factory does not
    /// leave the resource in `Setup`.
    pub fn unassign<F: ResourceFactory<K> + ?Sized>(&mut self, factory: &mut F) {
        assert!(self.is_assigned(), "ResourceSlot::unassign: slot is not assigned");

        factory.destroy_resource(&mut self.resource);
        assert_eq!(
            self.resource.state(),
            ResourceState::Setup,
            "ResourceSlot::unassign: factory must leave {} in the Setup state",
            self.resource.id()
        );
        self.resource.clear();
        self.stream = None;
    }

    pub fn resource(&self) -> &Resource<K> {
        &self.resource
    }

    pub fn resource_mut(&mut self) -> &mut Resource<K> {
        &mut self.resource
    }

    pub fn id(&self) -> Id {
        self.resource.id()
    }

    pub fn state(&self) -> ResourceState {
        self.resource.state()
    }

    pub fn is_assigned(&self) -> bool {
        self.state() != ResourceState::Initial
    }

    pub fn is_unassigned(&self) -> bool {
        self.state() == ResourceState::Initial
    }

    pub fn is_pending(&self) -> bool {
        self.state() == ResourceState::Pending
    }

    pub fn is_valid(&self) -> bool {
        self.state() == ResourceState::Valid
    }

    /// True while a stream is held for validation.
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Frame the current state was entered in.
    pub fn state_frame(&self) -> u32 {
        self.state_frame
    }

    /// Record `frame` as the start of the current state if it changed since
    /// the last call.
    pub(crate) fn observe_state(&mut self, frame: u32) {
        let state = self.state();
        if state != self.observed_state {
            self.observed_state = state;
            self.state_frame = frame;
        }
    }
}

impl<K: ResourceKind> Default for ResourceSlot<K> {
    fn default() -> Self {
        Self::new()
    }
}
