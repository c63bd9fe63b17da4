//! Texture resources.
//!
//! Textures come from three places:
//!
//! - files, read through the IO queue and decoded by [`TextureDecoder`]
//! - in-memory data handed to `create_texture_with_data`, same decoder
//! - render targets, created empty by [`RenderTargetLoader`]
//!
//! # File format
//!
//! A 16 byte little-endian header followed by tightly packed pixel rows:
//!
//! | offset | field                    |
//! |--------|--------------------------|
//! | 0      | magic `ETEX`             |
//! | 4      | width (u32)              |
//! | 8      | height (u32)             |
//! | 12     | [`PixelFormat`] (u32)    |

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use ember_resource::{
    LoadStatus, Loader, Locator, Resource, ResourceKind, ResourceResult, ResourceSetup, Stream,
    StreamDecoder,
};

use crate::backend::{SharedBackend, TextureDesc, TextureHandle};
use crate::error::GfxError;

pub const TEXTURE_MAGIC: [u8; 4] = *b"ETEX";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    R8,
    Rgba16F,
    Depth32F,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 | PixelFormat::Depth32F => 4,
            PixelFormat::Rgba16F => 8,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, PixelFormat::Depth32F)
    }

    pub fn to_raw(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => 0,
            PixelFormat::Bgra8 => 1,
            PixelFormat::R8 => 2,
            PixelFormat::Rgba16F => 3,
            PixelFormat::Depth32F => 4,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => PixelFormat::Rgba8,
            1 => PixelFormat::Bgra8,
            2 => PixelFormat::R8,
            3 => PixelFormat::Rgba16F,
            4 => PixelFormat::Depth32F,
            _ => return None,
        })
    }
}

bitflags! {
    /// How a texture is going to be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Sampled from shaders.
        const SAMPLED = 1 << 0;
        /// Rendered into.
        const RENDER_TARGET = 1 << 1;
        /// Written by copies after creation.
        const COPY_DST = 1 << 2;
    }
}

/// Placeholder key for textures.
pub const TEXTURE_PLACEHOLDER: u32 = ember_resource::resource::fourcc(b"TEXP");

/// Describes a texture to create.
#[derive(Debug, Clone)]
pub struct TextureSetup {
    pub locator: Locator,
    pub usage: TextureUsage,
    /// Size and format of render targets. Ignored for decoded textures.
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub placeholder: Option<u32>,
}

impl TextureSetup {
    /// Texture decoded from the file at `location`, shared by location.
    pub fn from_file(location: impl Into<Locator>) -> Self {
        Self {
            locator: location.into(),
            usage: TextureUsage::SAMPLED,
            width: 0,
            height: 0,
            format: PixelFormat::Rgba8,
            placeholder: None,
        }
    }

    /// Empty render target. Render targets are never shared.
    pub fn render_target(name: &str, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            locator: Locator::non_shared_at(name),
            usage: TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            width,
            height,
            format,
            placeholder: None,
        }
    }

    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage |= usage;
        self
    }

    pub fn with_placeholder(mut self, key: u32) -> Self {
        self.placeholder = Some(key);
        self
    }

    pub fn is_render_target(&self) -> bool {
        self.usage.contains(TextureUsage::RENDER_TARGET)
    }
}

impl ResourceSetup for TextureSetup {
    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn placeholder(&self) -> Option<u32> {
        self.placeholder
    }
}

/// A created texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub usage: TextureUsage,
}

pub struct TextureKind;

impl ResourceKind for TextureKind {
    type Setup = TextureSetup;
    type Payload = Texture;
    const NAME: &'static str = "Texture";
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TextureHeader {
    magic: [u8; 4],
    width: u32,
    height: u32,
    format: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<TextureHeader>();

/// Encode pixel data into the texture file format.
pub fn encode_texture(width: u32, height: u32, format: PixelFormat, pixels: &[u8]) -> Vec<u8> {
    let header = TextureHeader {
        magic: TEXTURE_MAGIC,
        width: width.to_le(),
        height: height.to_le(),
        format: format.to_raw().to_le(),
    };
    let mut bytes = Vec::with_capacity(HEADER_SIZE + pixels.len());
    bytes.extend_from_slice(bytemuck::bytes_of(&header));
    bytes.extend_from_slice(pixels);
    bytes
}

/// Parse a texture file into its description and pixel data.
pub fn decode_texture(bytes: &[u8], usage: TextureUsage) -> Result<(TextureDesc, &[u8]), GfxError> {
    if bytes.len() < HEADER_SIZE {
        return Err(GfxError::SizeMismatch {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    let header: TextureHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
    if header.magic != TEXTURE_MAGIC {
        return Err(GfxError::BadMagic { expected: TEXTURE_MAGIC });
    }
    let raw_format = u32::from_le(header.format);
    let format = PixelFormat::from_raw(raw_format).ok_or(GfxError::UnknownFormat(raw_format))?;
    let desc = TextureDesc {
        width: u32::from_le(header.width),
        height: u32::from_le(header.height),
        format,
        usage,
    };

    let pixels = &bytes[HEADER_SIZE..];
    let expected = desc.data_size().ok_or(GfxError::SizeOverflow)?;
    if pixels.len() != expected {
        return Err(GfxError::SizeMismatch {
            expected,
            actual: pixels.len(),
        });
    }
    Ok((desc, pixels))
}

/// Decodes texture files and uploads them to the backend.
pub struct TextureDecoder {
    backend: SharedBackend,
}

impl TextureDecoder {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

impl StreamDecoder<TextureKind> for TextureDecoder {
    fn name(&self) -> &str {
        "texture"
    }

    fn accepts(&self, setup: &TextureSetup) -> bool {
        !setup.is_render_target()
    }

    fn decode(&mut self, res: &Resource<TextureKind>, stream: &Stream) -> ResourceResult<Texture> {
        let usage = res.setup().usage;
        let (desc, pixels) = decode_texture(stream.bytes(), usage).map_err(|e| e.at(res.location()))?;
        let handle = self
            .backend
            .create_texture(&desc, Some(pixels))
            .map_err(|e| e.at(res.location()))?;
        tracing::debug!(
            "Uploaded texture '{}' ({}x{} {:?}) on {}",
            res.location(),
            desc.width,
            desc.height,
            desc.format,
            self.backend.name()
        );
        Ok(Texture {
            handle,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage,
        })
    }

    fn release(&mut self, payload: Texture) {
        self.backend.destroy_texture(payload.handle);
    }
}

/// Creates render targets from their setup alone.
pub struct RenderTargetLoader {
    backend: SharedBackend,
}

impl RenderTargetLoader {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }
}

impl Loader<TextureKind> for RenderTargetLoader {
    fn name(&self) -> &str {
        "render-target"
    }

    fn accepts(&self, res: &Resource<TextureKind>, data: Option<&Stream>) -> bool {
        data.is_none() && res.setup().is_render_target()
    }

    fn load(
        &mut self,
        res: &Resource<TextureKind>,
        _data: Option<&Stream>,
    ) -> ResourceResult<LoadStatus<Texture>> {
        let setup = res.setup();
        let desc = TextureDesc {
            width: setup.width,
            height: setup.height,
            format: setup.format,
            usage: setup.usage,
        };
        let handle = self
            .backend
            .create_texture(&desc, None)
            .map_err(|e| e.at(res.location()))?;
        Ok(LoadStatus::Ready(Texture {
            handle,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
        }))
    }

    fn unload(&mut self, _res: &Resource<TextureKind>, payload: Option<Texture>) {
        if let Some(texture) = payload {
            self.backend.destroy_texture(texture.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(HEADER_SIZE, 16);
        let bytes = encode_texture(2, 1, PixelFormat::R8, &[7, 9]);
        assert_eq!(&bytes[..4], b"ETEX");
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(bytes.len(), 18);
    }

    #[test]
    fn test_decode() {
        let bytes = encode_texture(2, 2, PixelFormat::Rgba8, &[1u8; 16]);
        let (desc, pixels) = decode_texture(&bytes, TextureUsage::SAMPLED).unwrap();
        assert_eq!((desc.width, desc.height, desc.format), (2, 2, PixelFormat::Rgba8));
        assert_eq!(pixels.len(), 16);
    }

    #[test]
    fn test_decode_rejects_bad_data() {
        assert!(matches!(
            decode_texture(b"ETEX", TextureUsage::SAMPLED),
            Err(GfxError::SizeMismatch { expected: 16, .. })
        ));

        let mut bytes = encode_texture(1, 1, PixelFormat::R8, &[0]);
        bytes[0] = b'X';
        assert!(matches!(
            decode_texture(&bytes, TextureUsage::SAMPLED),
            Err(GfxError::BadMagic { .. })
        ));

        let mut bytes = encode_texture(1, 1, PixelFormat::R8, &[0]);
        bytes[12] = 42;
        assert_eq!(
            decode_texture(&bytes, TextureUsage::SAMPLED).err(),
            Some(GfxError::UnknownFormat(42))
        );

        let bytes = encode_texture(4, 4, PixelFormat::Rgba8, &[0u8; 10]);
        assert_eq!(
            decode_texture(&bytes, TextureUsage::SAMPLED).err(),
            Some(GfxError::SizeMismatch { expected: 64, actual: 10 })
        );
    }

    #[test]
    fn test_decode_huge_header() {
        let bytes = encode_texture(u32::MAX, u32::MAX, PixelFormat::Rgba16F, &[]);
        let err = decode_texture(&bytes, TextureUsage::empty()).err();
        assert!(matches!(err, Some(GfxError::SizeOverflow | GfxError::SizeMismatch { .. })));

        // 2^31 x 2^31 x 4 wraps to zero in 64-bit arithmetic
        let bytes = encode_texture(1 << 31, 1 << 31, PixelFormat::Rgba8, &[]);
        assert_eq!(
            decode_texture(&bytes, TextureUsage::empty()).err(),
            Some(GfxError::SizeOverflow)
        );
    }

    #[test]
    fn test_pixel_format_raw_values() {
        for format in [
            PixelFormat::Rgba8,
            PixelFormat::Bgra8,
            PixelFormat::R8,
            PixelFormat::Rgba16F,
            PixelFormat::Depth32F,
        ] {
            assert_eq!(PixelFormat::from_raw(format.to_raw()), Some(format));
        }
        assert!(PixelFormat::Depth32F.is_depth());
        assert_eq!(PixelFormat::Rgba16F.bytes_per_pixel(), 8);
    }

    #[test]
    fn test_setups() {
        let file = TextureSetup::from_file("tex:wall.png");
        assert!(file.locator.is_shared());
        assert!(!file.is_render_target());

        let target = TextureSetup::render_target("shadow", 1024, 1024, PixelFormat::Depth32F);
        assert!(!target.locator.is_shared());
        assert!(target.is_render_target());
        assert_eq!(target.locator.location(), "shadow");
    }
}
