//! Errors reported by graphics backends and decoders.

use std::fmt;

use ember_resource::ResourceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GfxError {
    /// Texture dimensions exceed what the backend supports.
    TextureTooLarge { width: u32, height: u32, max: u32 },
    /// Texture with a zero dimension.
    EmptyTexture,
    /// Data length does not match the description.
    SizeMismatch { expected: usize, actual: usize },
    /// Header sizes whose byte count does not fit in `usize`.
    SizeOverflow,
    /// Buffer creation with no data.
    EmptyBuffer,
    /// Data does not start with the expected magic bytes.
    BadMagic { expected: [u8; 4] },
    /// Unknown enum value in a header.
    UnknownFormat(u32),
    /// Index pointing past the vertex data.
    IndexOutOfRange { index: u32, num_vertices: u32 },
}

impl GfxError {
    /// Convert into a loader error for the resource at `location`.
    pub fn at(self, location: &str) -> ResourceError {
        ResourceError::loader(location, self.to_string())
    }
}

impl fmt::Display for GfxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GfxError::TextureTooLarge { width, height, max } => {
                write!(f, "Texture {}x{} exceeds maximum size {}", width, height, max)
            }
            GfxError::EmptyTexture => write!(f, "Texture has a zero dimension"),
            GfxError::SizeMismatch { expected, actual } => {
                write!(f, "Expected {} bytes, got {}", expected, actual)
            }
            GfxError::SizeOverflow => write!(f, "Header sizes overflow"),
            GfxError::EmptyBuffer => write!(f, "Buffer data is empty"),
            GfxError::BadMagic { expected } => {
                write!(f, "Missing '{}' header", String::from_utf8_lossy(expected))
            }
            GfxError::UnknownFormat(value) => write!(f, "Unknown format value {}", value),
            GfxError::IndexOutOfRange { index, num_vertices } => {
                write!(f, "Index {} out of range for {} vertices", index, num_vertices)
            }
        }
    }
}

impl std::error::Error for GfxError {}

pub type GfxResult<T> = Result<T, GfxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = GfxError::TextureTooLarge {
            width: 9000,
            height: 10,
            max: 8192,
        };
        assert_eq!(err.to_string(), "Texture 9000x10 exceeds maximum size 8192");
        assert_eq!(
            GfxError::BadMagic { expected: *b"ETEX" }.to_string(),
            "Missing 'ETEX' header"
        );
    }

    #[test]
    fn test_into_resource_error() {
        let err = GfxError::EmptyBuffer.at("mesh:empty.bin");
        assert!(matches!(err, ResourceError::Loader { ref location, .. } if location == "mesh:empty.bin"));
        assert!(err.to_string().contains("Buffer data is empty"));
    }
}
