//! Pool and container configuration.

use crate::id::Id;

/// Configuration of a [`ResourcePool`](crate::ResourcePool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Type stamped into every id the pool mints.
    pub resource_type: u16,
    /// Number of slots, at most [`PoolConfig::MAX_POOL_SIZE`].
    pub pool_size: usize,
    /// Upper bound of pending resources validated per update.
    pub max_creates_per_frame: usize,
    /// Placeholder key used for ids that do not resolve to a live resource.
    pub generic_placeholder: Option<u32>,
}

impl PoolConfig {
    /// Slot indices are 16 bits wide.
    pub const MAX_POOL_SIZE: usize = 1 << 16;

    pub const DEFAULT_POOL_SIZE: usize = 128;
    pub const DEFAULT_MAX_CREATES_PER_FRAME: usize = 64;

    pub fn new(resource_type: u16, pool_size: usize) -> Self {
        Self {
            resource_type,
            pool_size,
            ..Self::default()
        }
    }

    pub fn with_max_creates_per_frame(mut self, max: usize) -> Self {
        self.max_creates_per_frame = max;
        self
    }

    pub fn with_generic_placeholder(mut self, key: u32) -> Self {
        self.generic_placeholder = Some(key);
        self
    }

    /// Panics when the configuration cannot be used to set up a pool.
    pub(crate) fn validate(&self) {
        assert!(
            self.resource_type != Id::INVALID_TYPE && self.resource_type != Id::ALL_TYPES,
            "PoolConfig: resource type {:#x} is reserved",
            self.resource_type
        );
        assert!(
            self.pool_size > 0 && self.pool_size <= Self::MAX_POOL_SIZE,
            "PoolConfig: pool size {} out of range 1..={}",
            self.pool_size,
            Self::MAX_POOL_SIZE
        );
        assert!(self.max_creates_per_frame > 0, "PoolConfig: max_creates_per_frame must be positive");
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            resource_type: 0,
            pool_size: Self::DEFAULT_POOL_SIZE,
            max_creates_per_frame: Self::DEFAULT_MAX_CREATES_PER_FRAME,
            generic_placeholder: None,
        }
    }
}

/// Configuration of a [`ResourceContainer`](crate::ResourceContainer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    pub pool: PoolConfig,
    /// Registry capacity reserved up front. `None` reserves one entry per slot.
    pub registry_reserve: Option<usize>,
}

impl ContainerConfig {
    pub fn new(pool: PoolConfig) -> Self {
        Self {
            pool,
            registry_reserve: None,
        }
    }

    pub fn with_registry_reserve(mut self, reserve: usize) -> Self {
        self.registry_reserve = Some(reserve);
        self
    }

    pub(crate) fn registry_capacity(&self) -> usize {
        self.registry_reserve.unwrap_or(self.pool.pool_size)
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = PoolConfig::new(3, 16)
            .with_max_creates_per_frame(2)
            .with_generic_placeholder(7);
        assert_eq!(config.resource_type, 3);
        assert_eq!(config.pool_size, 16);
        assert_eq!(config.max_creates_per_frame, 2);
        assert_eq!(config.generic_placeholder, Some(7));
        config.validate();
    }

    #[test]
    fn test_registry_capacity_defaults_to_pool_size() {
        let config = ContainerConfig::new(PoolConfig::new(1, 32));
        assert_eq!(config.registry_capacity(), 32);
        assert_eq!(config.with_registry_reserve(4).registry_capacity(), 4);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_oversized_pool_panics() {
        PoolConfig::new(1, PoolConfig::MAX_POOL_SIZE + 1).validate();
    }

    #[test]
    #[should_panic(expected = "reserved")]
    fn test_reserved_type_panics() {
        PoolConfig::new(Id::INVALID_TYPE, 4).validate();
    }
}
