//! Resource lifecycle events.

use crate::id::Id;
use crate::locator::Locator;

/// Events emitted by a [`ResourceContainer`](crate::ResourceContainer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    /// A resource finished loading and is ready for use.
    Created {
        /// The created resource.
        id: Id,
        /// Locator it was created under.
        locator: Locator,
    },

    /// A resource failed to load.
    LoadFailed {
        /// The failed resource.
        id: Id,
        /// Locator it was created under.
        locator: Locator,
        /// Error message.
        error: String,
    },

    /// A resource was destroyed and its slot freed.
    Removed {
        /// Id of the destroyed resource.
        id: Id,
    },
}

impl ResourceEvent {
    /// Id this event relates to.
    pub fn id(&self) -> Id {
        match self {
            ResourceEvent::Created { id, .. } => *id,
            ResourceEvent::LoadFailed { id, .. } => *id,
            ResourceEvent::Removed { id } => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ResourceEvent::Created { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ResourceEvent::LoadFailed { .. })
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, ResourceEvent::Removed { .. })
    }
}

/// A buffer of resource events that can be drained each frame.
#[derive(Debug, Default)]
pub struct ResourceEventBuffer {
    events: Vec<ResourceEvent>,
}

impl ResourceEventBuffer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: ResourceEvent) {
        self.events.push(event);
    }

    /// Drain all events from the buffer.
    pub fn drain(&mut self) -> impl Iterator<Item = ResourceEvent> + '_ {
        self.events.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceEvent> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_drain() {
        let mut buffer = ResourceEventBuffer::new();
        let id = Id::new(1, 2, 3);
        buffer.push(ResourceEvent::Created {
            id,
            locator: Locator::new("a"),
        });
        buffer.push(ResourceEvent::Removed { id });
        assert_eq!(buffer.len(), 2);

        let events: Vec<_> = buffer.drain().collect();
        assert!(events[0].is_created());
        assert!(events[1].is_removed());
        assert!(events.iter().all(|e| e.id() == id));
        assert!(buffer.is_empty());
    }
}
