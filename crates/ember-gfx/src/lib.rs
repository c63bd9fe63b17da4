//! Ember graphics resources.
//!
//! Textures and meshes built on `ember-resource`. GPU objects are created
//! through the [`GfxBackend`] trait; [`HeadlessBackend`] runs without a GPU.
//!
//! - [`texture`] - texture kind, file decoder, render target loader
//! - [`mesh`] - mesh kind and decoder
//! - [`GfxResources`] - both containers plus the IO queue, routed by
//!   resource type

pub mod backend;
pub mod config;
pub mod error;
pub mod mesh;
pub mod resources;
pub mod texture;

pub use backend::{BackendCall, BufferHandle, BufferKind, GfxBackend, HeadlessBackend, SharedBackend, TextureDesc, TextureHandle};
pub use config::{GfxConfig, MESH_TYPE, TEXTURE_TYPE};
pub use error::{GfxError, GfxResult};
pub use mesh::{IndexType, Indices, Mesh, MeshDecoder, MeshKind, MeshSetup, Vertex, encode_mesh};
pub use resources::GfxResources;
pub use texture::{
    PixelFormat, RenderTargetLoader, Texture, TextureDecoder, TextureKind, TextureSetup, TextureUsage,
    encode_texture,
};
