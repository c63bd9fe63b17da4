//! Resource lifecycle states and pool diagnostics.

use std::fmt;

/// State of a resource in its slot.
///
/// ```text
/// Initial --assign--> Setup --(sync)--> Valid | Failed
///                       \--(async)--> Pending --validate--> Valid | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// Slot is free.
    #[default]
    Initial,
    /// Setup parameters stored, backend object not created yet.
    Setup,
    /// Asynchronous creation in flight.
    Pending,
    /// Ready for use.
    Valid,
    /// Creation failed.
    Failed,
}

impl ResourceState {
    /// Number of distinct states.
    pub const COUNT: usize = 5;

    pub const ALL: [ResourceState; Self::COUNT] = [
        ResourceState::Initial,
        ResourceState::Setup,
        ResourceState::Pending,
        ResourceState::Valid,
        ResourceState::Failed,
    ];

    /// Dense index, usable for per-state tables.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// True for `Valid` and `Failed`.
    pub fn is_done(self) -> bool {
        matches!(self, ResourceState::Valid | ResourceState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceState::Initial => "Initial",
            ResourceState::Setup => "Setup",
            ResourceState::Pending => "Pending",
            ResourceState::Valid => "Valid",
            ResourceState::Failed => "Failed",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceInfo {
    pub state: ResourceState,
    /// Number of pool updates since the resource entered `state`.
    pub state_age: u32,
}

/// Snapshot of a whole pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolInfo {
    pub resource_type: u16,
    pub num_slots: usize,
    pub num_used_slots: usize,
    pub num_free_slots: usize,
    /// Slot count per state, indexed by [`ResourceState::index`].
    pub num_slots_by_state: [usize; ResourceState::COUNT],
}

impl PoolInfo {
    /// Number of slots currently in `state`.
    pub fn count(&self, state: ResourceState) -> usize {
        self.num_slots_by_state[state.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_indices_are_dense() {
        for (i, state) in ResourceState::ALL.iter().enumerate() {
            assert_eq!(state.index(), i);
        }
    }

    #[test]
    fn test_is_done() {
        assert!(ResourceState::Valid.is_done());
        assert!(ResourceState::Failed.is_done());
        assert!(!ResourceState::Pending.is_done());
        assert!(!ResourceState::Setup.is_done());
    }

    #[test]
    fn test_pool_info_count() {
        let mut info = PoolInfo::default();
        info.num_slots_by_state[ResourceState::Pending.index()] = 3;
        assert_eq!(info.count(ResourceState::Pending), 3);
        assert_eq!(info.count(ResourceState::Valid), 0);
    }
}
