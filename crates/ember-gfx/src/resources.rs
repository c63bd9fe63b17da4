//! Texture and mesh containers behind one facade.

use ember_core::profiling::profile_function;
use ember_resource::{
    BytesReader, DataLoader, FileLoader, Id, IoQueue, LabelStack, LoaderFactory, ResourceContainer,
    ResourceEvent, ResourceLabel, ResourceResult, ResourceState, SharedIoQueue, Stream,
};

use crate::backend::SharedBackend;
use crate::config::{GfxConfig, MESH_TYPE, TEXTURE_TYPE};
use crate::mesh::{Mesh, MeshDecoder, MeshKind, MeshSetup};
use crate::texture::{RenderTargetLoader, Texture, TextureDecoder, TextureKind, TextureSetup};

/// Owns the texture and mesh containers, the IO queue feeding their file
/// loaders and the backend they create objects on.
///
/// Calls taking a bare [`Id`] are routed by [`Id::res_type`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ember_gfx::{GfxConfig, GfxResources, HeadlessBackend, MeshSetup};
/// use ember_resource::MemoryReader;
///
/// let mut gfx = GfxResources::new(Arc::new(HeadlessBackend::new()), MemoryReader::new());
/// gfx.setup(&GfxConfig::default());
///
/// let quad = gfx.create_mesh(MeshSetup::from_file("mesh:quad.bin")).unwrap();
/// gfx.update();
///
/// gfx.release(quad);
/// gfx.discard();
/// ```
pub struct GfxResources {
    backend: SharedBackend,
    io: SharedIoQueue,
    textures: ResourceContainer<TextureKind>,
    meshes: ResourceContainer<MeshKind>,
    labels: LabelStack,
    io_reads_per_frame: usize,
    valid: bool,
}

impl GfxResources {
    pub fn new(backend: SharedBackend, reader: impl BytesReader + 'static) -> Self {
        let io = IoQueue::shared(reader);

        let textures = LoaderFactory::new()
            .with_loader(RenderTargetLoader::new(backend.clone()))
            .with_loader(DataLoader::new(TextureDecoder::new(backend.clone())))
            .with_loader(FileLoader::new(io.clone(), TextureDecoder::new(backend.clone())));
        let meshes = LoaderFactory::new()
            .with_loader(DataLoader::new(MeshDecoder::new(backend.clone())))
            .with_loader(FileLoader::new(io.clone(), MeshDecoder::new(backend.clone())));

        Self {
            backend,
            io,
            textures: ResourceContainer::new(textures),
            meshes: ResourceContainer::new(meshes),
            labels: LabelStack::new(),
            io_reads_per_frame: GfxConfig::DEFAULT_IO_READS_PER_FRAME,
            valid: false,
        }
    }

    pub fn setup(&mut self, config: &GfxConfig) {
        assert!(!self.valid, "GfxResources::setup called twice");
        self.textures.setup(&config.texture_container());
        self.meshes.setup(&config.mesh_container());
        self.io_reads_per_frame = config.io_reads_per_frame;
        self.valid = true;
        tracing::info!("Graphics resources set up on {} backend", self.backend.name());
    }

    /// Destroy all resources and release the pools.
    pub fn discard(&mut self) {
        assert!(self.valid, "GfxResources::discard called before setup");
        self.meshes.discard();
        self.textures.discard();
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Service file reads, then settle pending textures and meshes.
    pub fn update(&mut self) {
        profile_function!();
        let reads = self.io.lock().pump(self.io_reads_per_frame);
        if reads > 0 {
            tracing::trace!("Serviced {} file reads", reads);
        }
        self.textures.update();
        self.meshes.update();
    }

    pub fn create_texture(&mut self, setup: TextureSetup) -> ResourceResult<Id> {
        self.textures.create(setup)
    }

    pub fn create_texture_with_data(&mut self, setup: TextureSetup, data: impl Into<Stream>) -> ResourceResult<Id> {
        self.textures.create_with_data(setup, Some(data.into()))
    }

    pub fn create_mesh(&mut self, setup: MeshSetup) -> ResourceResult<Id> {
        self.meshes.create(setup)
    }

    pub fn create_mesh_with_data(&mut self, setup: MeshSetup, data: impl Into<Stream>) -> ResourceResult<Id> {
        self.meshes.create_with_data(setup, Some(data.into()))
    }

    /// The texture behind `id`, or its placeholder while it is not valid.
    pub fn texture(&self, id: Id) -> Option<&Texture> {
        self.textures.resource(id).and_then(|res| res.payload())
    }

    /// The mesh behind `id`, or its placeholder while it is not valid.
    pub fn mesh(&self, id: Id) -> Option<&Mesh> {
        self.meshes.resource(id).and_then(|res| res.payload())
    }

    /// Make `id` the texture shown for textures whose setup names `key`.
    pub fn set_texture_placeholder(&mut self, key: u32, id: Id) {
        self.textures.register_placeholder(key, id);
    }

    pub fn set_mesh_placeholder(&mut self, key: u32, id: Id) {
        self.meshes.register_placeholder(key, id);
    }

    /// Add a use to `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a live texture or mesh.
    pub fn add_ref(&mut self, id: Id) {
        match id.res_type() {
            TEXTURE_TYPE => self.textures.add_ref(id),
            MESH_TYPE => self.meshes.add_ref(id),
            other => panic!("GfxResources::add_ref: unknown resource type {}", other),
        }
    }

    /// Drop a use of `id`. Returns `true` if the resource was destroyed.
    pub fn release(&mut self, id: Id) -> bool {
        match id.res_type() {
            TEXTURE_TYPE => self.textures.release(id),
            MESH_TYPE => self.meshes.release(id),
            other => {
                tracing::warn!("GfxResources::release: unknown resource type {} ({})", other, id);
                false
            }
        }
    }

    pub fn query_state(&self, id: Id) -> Option<ResourceState> {
        match id.res_type() {
            TEXTURE_TYPE => self.textures.query_state(id),
            MESH_TYPE => self.meshes.query_state(id),
            _ => None,
        }
    }

    /// Generate a label, make it current for textures and meshes, and return
    /// it.
    pub fn push_new_label(&mut self) -> ResourceLabel {
        let label = self.labels.push_new();
        self.textures.push_label(label);
        self.meshes.push_label(label);
        label
    }

    pub fn push_label(&mut self, label: ResourceLabel) {
        self.labels.push(label);
        self.textures.push_label(label);
        self.meshes.push_label(label);
    }

    pub fn pop_label(&mut self) -> ResourceLabel {
        self.textures.pop_label();
        self.meshes.pop_label();
        self.labels.pop()
    }

    /// Destroy textures and meshes created under `label`.
    pub fn destroy(&mut self, label: ResourceLabel) -> usize {
        let meshes = self.meshes.destroy(label);
        let textures = self.textures.destroy(label);
        tracing::debug!("Destroyed {} textures and {} meshes under {:?}", textures, meshes, label);
        meshes + textures
    }

    /// Take the events of both containers, textures first.
    pub fn drain_events(&mut self) -> Vec<ResourceEvent> {
        let mut events = self.textures.drain_events();
        events.extend(self.meshes.drain_events());
        events
    }

    pub fn textures(&self) -> &ResourceContainer<TextureKind> {
        &self.textures
    }

    pub fn meshes(&self) -> &ResourceContainer<MeshKind> {
        &self.meshes
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn io(&self) -> &SharedIoQueue {
        &self.io
    }
}
