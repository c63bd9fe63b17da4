//! Mesh resources.
//!
//! Mesh files are a 16 byte little-endian header followed by the vertex array
//! and the index array:
//!
//! | offset | field                           |
//! |--------|---------------------------------|
//! | 0      | magic `EMSH`                    |
//! | 4      | vertex count (u32)              |
//! | 8      | index count (u32)               |
//! | 12     | [`IndexType`] (u32)             |
//! | 16     | `vertex count` x [`Vertex`]     |
//! | ...    | `index count` x u16 or u32      |

use bytemuck::{Pod, Zeroable};
use ember_resource::{Locator, Resource, ResourceKind, ResourceResult, ResourceSetup, Stream, StreamDecoder};

use crate::backend::{BufferHandle, BufferKind, SharedBackend};
use crate::error::{GfxError, GfxResult};

pub const MESH_MAGIC: [u8; 4] = *b"EMSH";

/// Placeholder key for meshes.
pub const MESH_PLACEHOLDER: u32 = ember_resource::resource::fourcc(b"MSHP");

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size(self) -> usize {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }

    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(IndexType::U16),
            1 => Some(IndexType::U32),
            _ => None,
        }
    }

    fn to_raw(self) -> u32 {
        match self {
            IndexType::U16 => 0,
            IndexType::U32 => 1,
        }
    }
}

/// Index data of a mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    pub fn len(&self) -> usize {
        match self {
            Indices::U16(v) => v.len(),
            Indices::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index_type(&self) -> IndexType {
        match self {
            Indices::U16(_) => IndexType::U16,
            Indices::U32(_) => IndexType::U32,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Indices::U16(v) => bytemuck::cast_slice(v),
            Indices::U32(v) => bytemuck::cast_slice(v),
        }
    }

    fn max(&self) -> Option<u32> {
        match self {
            Indices::U16(v) => v.iter().max().map(|&i| i as u32),
            Indices::U32(v) => v.iter().max().copied(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeshSetup {
    pub locator: Locator,
    pub placeholder: Option<u32>,
}

impl MeshSetup {
    /// Mesh decoded from the file at `location`, shared by location.
    pub fn from_file(location: impl Into<Locator>) -> Self {
        Self {
            locator: location.into(),
            placeholder: None,
        }
    }

    /// Mesh built from in-memory data. Not shared.
    pub fn from_data(name: &str) -> Self {
        Self {
            locator: Locator::non_shared_at(name),
            placeholder: None,
        }
    }

    pub fn with_placeholder(mut self, key: u32) -> Self {
        self.placeholder = Some(key);
        self
    }
}

impl ResourceSetup for MeshSetup {
    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn placeholder(&self) -> Option<u32> {
        self.placeholder
    }
}

/// A created mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mesh {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: Option<BufferHandle>,
    pub num_vertices: u32,
    pub num_indices: u32,
    pub index_type: IndexType,
}

pub struct MeshKind;

impl ResourceKind for MeshKind {
    type Setup = MeshSetup;
    type Payload = Mesh;
    const NAME: &'static str = "Mesh";
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MeshHeader {
    magic: [u8; 4],
    num_vertices: u32,
    num_indices: u32,
    index_type: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<MeshHeader>();
const VERTEX_SIZE: usize = std::mem::size_of::<Vertex>();

/// Encode a mesh into the mesh file format.
pub fn encode_mesh(vertices: &[Vertex], indices: &Indices) -> Vec<u8> {
    let header = MeshHeader {
        magic: MESH_MAGIC,
        num_vertices: (vertices.len() as u32).to_le(),
        num_indices: (indices.len() as u32).to_le(),
        index_type: indices.index_type().to_raw().to_le(),
    };
    let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
    let mut bytes = Vec::with_capacity(HEADER_SIZE + vertex_bytes.len() + indices.bytes().len());
    bytes.extend_from_slice(bytemuck::bytes_of(&header));
    bytes.extend_from_slice(vertex_bytes);
    bytes.extend_from_slice(indices.bytes());
    bytes
}

/// Parse a mesh file, checking that every index is in range.
pub fn decode_mesh(bytes: &[u8]) -> GfxResult<(Vec<Vertex>, Indices)> {
    if bytes.len() < HEADER_SIZE {
        return Err(GfxError::SizeMismatch {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    let header: MeshHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
    if header.magic != MESH_MAGIC {
        return Err(GfxError::BadMagic { expected: MESH_MAGIC });
    }
    let num_vertices = u32::from_le(header.num_vertices);
    let num_indices = u32::from_le(header.num_indices) as usize;
    let raw_type = u32::from_le(header.index_type);
    let index_type = IndexType::from_raw(raw_type).ok_or(GfxError::UnknownFormat(raw_type))?;

    let vertex_end = (num_vertices as usize)
        .checked_mul(VERTEX_SIZE)
        .and_then(|size| size.checked_add(HEADER_SIZE))
        .ok_or(GfxError::SizeOverflow)?;
    let expected = num_indices
        .checked_mul(index_type.size())
        .and_then(|size| size.checked_add(vertex_end))
        .ok_or(GfxError::SizeOverflow)?;
    if bytes.len() != expected {
        return Err(GfxError::SizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    // the stream is not aligned for the element types, so copy out
    let vertices: Vec<Vertex> = bytemuck::pod_collect_to_vec(&bytes[HEADER_SIZE..vertex_end]);
    let index_bytes = &bytes[vertex_end..];
    let indices = match index_type {
        IndexType::U16 => Indices::U16(bytemuck::pod_collect_to_vec(index_bytes)),
        IndexType::U32 => Indices::U32(bytemuck::pod_collect_to_vec(index_bytes)),
    };
    if let Some(max) = indices.max()
        && max >= num_vertices
    {
        return Err(GfxError::IndexOutOfRange {
            index: max,
            num_vertices,
        });
    }
    Ok((vertices, indices))
}

/// Decodes mesh files and uploads their buffers to the backend.
pub struct MeshDecoder {
    backend: SharedBackend,
}

impl MeshDecoder {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

impl StreamDecoder<MeshKind> for MeshDecoder {
    fn name(&self) -> &str {
        "mesh"
    }

    fn accepts(&self, _setup: &MeshSetup) -> bool {
        true
    }

    fn decode(&mut self, res: &Resource<MeshKind>, stream: &Stream) -> ResourceResult<Mesh> {
        let (vertices, indices) = decode_mesh(stream.bytes()).map_err(|e| e.at(res.location()))?;
        let vertex_buffer = self
            .backend
            .create_buffer(BufferKind::Vertex, bytemuck::cast_slice(&vertices))
            .map_err(|e| e.at(res.location()))?;

        let index_buffer = if indices.is_empty() {
            None
        } else {
            match self.backend.create_buffer(BufferKind::Index, indices.bytes()) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    self.backend.destroy_buffer(vertex_buffer);
                    return Err(e.at(res.location()));
                }
            }
        };

        tracing::debug!(
            "Uploaded mesh '{}' ({} vertices, {} indices)",
            res.location(),
            vertices.len(),
            indices.len()
        );
        Ok(Mesh {
            vertex_buffer,
            index_buffer,
            num_vertices: vertices.len() as u32,
            num_indices: indices.len() as u32,
            index_type: indices.index_type(),
        })
    }

    fn release(&mut self, payload: Mesh) {
        self.backend.destroy_buffer(payload.vertex_buffer);
        if let Some(index_buffer) = payload.index_buffer {
            self.backend.destroy_buffer(index_buffer);
        }
    }
}
