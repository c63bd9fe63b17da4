//! Graphics backend abstraction.
//!
//! Resource loaders talk to the GPU only through [`GfxBackend`]. The
//! [`HeadlessBackend`] keeps descriptions in memory and records every call,
//! which is all tests and tools need.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use ember_core::alloc::HashMap;
use parking_lot::Mutex;

use crate::error::{GfxError, GfxResult};
use crate::texture::{PixelFormat, TextureUsage};

/// Opaque handle to a backend texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Opaque handle to a backend buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub usage: TextureUsage,
}

impl TextureDesc {
    /// Number of bytes of tightly packed pixel data, or `None` if it does
    /// not fit in `usize`.
    pub fn data_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.format.bytes_per_pixel())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Creates and destroys GPU objects.
pub trait GfxBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Create a texture, uploading `data` if given.
    fn create_texture(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GfxResult<TextureHandle>;

    fn destroy_texture(&self, handle: TextureHandle);

    /// Create an immutable buffer holding `data`.
    fn create_buffer(&self, kind: BufferKind, data: &[u8]) -> GfxResult<BufferHandle>;

    fn destroy_buffer(&self, handle: BufferHandle);
}

pub type SharedBackend = Arc<dyn GfxBackend>;

/// Records a backend call for verification in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateTexture { handle: TextureHandle, desc: TextureDesc, uploaded: bool },
    DestroyTexture { handle: TextureHandle },
    CreateBuffer { handle: BufferHandle, kind: BufferKind, size: usize },
    DestroyBuffer { handle: BufferHandle },
}

/// Backend without a GPU.
///
/// # Example
///
/// ```rust
/// use ember_gfx::backend::{GfxBackend, HeadlessBackend, TextureDesc};
/// use ember_gfx::texture::{PixelFormat, TextureUsage};
///
/// let backend = HeadlessBackend::new();
/// let desc = TextureDesc {
///     width: 4,
///     height: 4,
///     format: PixelFormat::Rgba8,
///     usage: TextureUsage::SAMPLED,
/// };
/// let handle = backend.create_texture(&desc, None).unwrap();
/// assert_eq!(backend.num_live_textures(), 1);
///
/// backend.destroy_texture(handle);
/// assert_eq!(backend.num_live_textures(), 0);
/// ```
pub struct HeadlessBackend {
    max_texture_size: u32,
    next_handle: AtomicU32,
    calls: Mutex<Vec<BackendCall>>,
    textures: Mutex<HashMap<TextureHandle, TextureDesc>>,
    buffers: Mutex<HashMap<BufferHandle, usize>>,
}

impl HeadlessBackend {
    pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 8192;

    pub fn new() -> Self {
        Self::with_max_texture_size(Self::DEFAULT_MAX_TEXTURE_SIZE)
    }

    pub fn with_max_texture_size(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            next_handle: AtomicU32::new(1),
            calls: Mutex::new(Vec::new()),
            textures: Mutex::new(HashMap::new()),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of all recorded calls.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn count_texture_creates(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::CreateTexture { .. }))
            .count()
    }

    pub fn count_buffer_creates(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::CreateBuffer { .. }))
            .count()
    }

    pub fn num_live_textures(&self) -> usize {
        self.textures.lock().len()
    }

    pub fn num_live_buffers(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn texture_desc(&self, handle: TextureHandle) -> Option<TextureDesc> {
        self.textures.lock().get(&handle).copied()
    }

    /// Total bytes held by live buffers.
    pub fn buffer_bytes(&self) -> usize {
        self.buffers.lock().values().sum()
    }

    fn next(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GfxBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_texture(&self, desc: &TextureDesc, data: Option<&[u8]>) -> GfxResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GfxError::EmptyTexture);
        }
        if desc.width > self.max_texture_size || desc.height > self.max_texture_size {
            return Err(GfxError::TextureTooLarge {
                width: desc.width,
                height: desc.height,
                max: self.max_texture_size,
            });
        }
        if let Some(data) = data {
            let expected = desc.data_size().ok_or(GfxError::SizeOverflow)?;
            if data.len() != expected {
                return Err(GfxError::SizeMismatch {
                    expected,
                    actual: data.len(),
                });
            }
        }

        let handle = TextureHandle(self.next());
        self.textures.lock().insert(handle, *desc);
        self.calls.lock().push(BackendCall::CreateTexture {
            handle,
            desc: *desc,
            uploaded: data.is_some(),
        });
        Ok(handle)
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        if self.textures.lock().remove(&handle).is_none() {
            tracing::warn!("HeadlessBackend: destroying unknown texture {:?}", handle);
            return;
        }
        self.calls.lock().push(BackendCall::DestroyTexture { handle });
    }

    fn create_buffer(&self, kind: BufferKind, data: &[u8]) -> GfxResult<BufferHandle> {
        if data.is_empty() {
            return Err(GfxError::EmptyBuffer);
        }
        let handle = BufferHandle(self.next());
        self.buffers.lock().insert(handle, data.len());
        self.calls.lock().push(BackendCall::CreateBuffer {
            handle,
            kind,
            size: data.len(),
        });
        Ok(handle)
    }

    fn destroy_buffer(&self, handle: BufferHandle) {
        if self.buffers.lock().remove(&handle).is_none() {
            tracing::warn!("HeadlessBackend: destroying unknown buffer {:?}", handle);
            return;
        }
        self.calls.lock().push(BackendCall::DestroyBuffer { handle });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(width: u32, height: u32) -> TextureDesc {
        TextureDesc {
            width,
            height,
            format: PixelFormat::Rgba8,
            usage: TextureUsage::SAMPLED,
        }
    }

    #[test]
    fn test_texture_lifecycle() {
        let backend = HeadlessBackend::new();
        let handle = backend.create_texture(&desc(2, 2), Some(&[0u8; 16])).unwrap();
        assert_eq!(backend.texture_desc(handle), Some(desc(2, 2)));
        backend.destroy_texture(handle);
        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::CreateTexture {
                    handle,
                    desc: desc(2, 2),
                    uploaded: true
                },
                BackendCall::DestroyTexture { handle },
            ]
        );
    }

    #[test]
    fn test_texture_validation() {
        let backend = HeadlessBackend::with_max_texture_size(64);
        assert_eq!(backend.create_texture(&desc(0, 4), None), Err(GfxError::EmptyTexture));
        assert!(matches!(
            backend.create_texture(&desc(128, 4), None),
            Err(GfxError::TextureTooLarge { max: 64, .. })
        ));
        assert_eq!(
            backend.create_texture(&desc(2, 2), Some(&[0u8; 3])),
            Err(GfxError::SizeMismatch { expected: 16, actual: 3 })
        );
        assert_eq!(backend.count_texture_creates(), 0);
    }

    #[test]
    fn test_buffers() {
        let backend = HeadlessBackend::new();
        assert_eq!(backend.create_buffer(BufferKind::Index, &[]), Err(GfxError::EmptyBuffer));
        let a = backend.create_buffer(BufferKind::Vertex, &[0u8; 64]).unwrap();
        let b = backend.create_buffer(BufferKind::Index, &[0u8; 12]).unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.buffer_bytes(), 76);
        backend.destroy_buffer(a);
        backend.destroy_buffer(a);
        assert_eq!(backend.num_live_buffers(), 1);
        assert_eq!(backend.count_buffer_creates(), 2);
        backend.destroy_buffer(b);
    }
}
