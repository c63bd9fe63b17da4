//! Graphics resource configuration.

use ember_resource::{ContainerConfig, PoolConfig};

use crate::mesh::MESH_PLACEHOLDER;
use crate::texture::TEXTURE_PLACEHOLDER;

/// Resource type stamped into texture ids.
pub const TEXTURE_TYPE: u16 = 1;
/// Resource type stamped into mesh ids.
pub const MESH_TYPE: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxConfig {
    pub texture_pool: PoolConfig,
    pub mesh_pool: PoolConfig,
    /// File reads serviced per update.
    pub io_reads_per_frame: usize,
}

impl GfxConfig {
    pub const DEFAULT_IO_READS_PER_FRAME: usize = 8;

    pub fn with_texture_pool_size(mut self, size: usize) -> Self {
        self.texture_pool.pool_size = size;
        self
    }

    pub fn with_mesh_pool_size(mut self, size: usize) -> Self {
        self.mesh_pool.pool_size = size;
        self
    }

    pub fn with_max_creates_per_frame(mut self, max: usize) -> Self {
        self.texture_pool.max_creates_per_frame = max;
        self.mesh_pool.max_creates_per_frame = max;
        self
    }

    pub fn with_io_reads_per_frame(mut self, reads: usize) -> Self {
        self.io_reads_per_frame = reads;
        self
    }

    pub(crate) fn texture_container(&self) -> ContainerConfig {
        ContainerConfig::new(self.texture_pool.clone())
    }

    pub(crate) fn mesh_container(&self) -> ContainerConfig {
        ContainerConfig::new(self.mesh_pool.clone())
    }
}

impl Default for GfxConfig {
    fn default() -> Self {
        Self {
            texture_pool: PoolConfig::new(TEXTURE_TYPE, PoolConfig::DEFAULT_POOL_SIZE)
                .with_generic_placeholder(TEXTURE_PLACEHOLDER),
            mesh_pool: PoolConfig::new(MESH_TYPE, PoolConfig::DEFAULT_POOL_SIZE)
                .with_generic_placeholder(MESH_PLACEHOLDER),
            io_reads_per_frame: Self::DEFAULT_IO_READS_PER_FRAME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_types_differ() {
        let config = GfxConfig::default();
        assert_eq!(config.texture_pool.resource_type, TEXTURE_TYPE);
        assert_eq!(config.mesh_pool.resource_type, MESH_TYPE);
        assert_ne!(TEXTURE_TYPE, MESH_TYPE);
    }

    #[test]
    fn test_builders() {
        let config = GfxConfig::default()
            .with_texture_pool_size(16)
            .with_mesh_pool_size(8)
            .with_max_creates_per_frame(2)
            .with_io_reads_per_frame(1);
        assert_eq!(config.texture_container().pool.pool_size, 16);
        assert_eq!(config.mesh_container().pool.pool_size, 8);
        assert_eq!(config.mesh_pool.max_creates_per_frame, 2);
        assert_eq!(config.io_reads_per_frame, 1);
    }
}
