//! Pixel formats a shared texture can be created with.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Shared texture pixel format.
///
/// Discriminants are the `DXGI_FORMAT` values, which is also how the format is
/// stored in the cross-process registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum TextureFormat {
    Rgba32Float = 2,
    Rgba16Float = 10,
    Rgb10A2Unorm = 24,
    Rgba8Unorm = 28,
    #[default]
    Bgra8Unorm = 87,
}

impl TextureFormat {
    /// Decode a format read back from shared memory.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::from_u32(raw)
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba32Float => 16,
            Self::Rgba16Float => 8,
            Self::Rgb10A2Unorm | Self::Rgba8Unorm | Self::Bgra8Unorm => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_dxgi_values() {
        assert_eq!(TextureFormat::from_raw(87), Some(TextureFormat::Bgra8Unorm));
        assert_eq!(TextureFormat::from_raw(28), Some(TextureFormat::Rgba8Unorm));
        assert_eq!(TextureFormat::from_raw(10), Some(TextureFormat::Rgba16Float));
    }

    #[test]
    fn rejects_unknown_values() {
        assert_eq!(TextureFormat::from_raw(0), None);
        assert_eq!(TextureFormat::from_raw(9999), None);
    }

    #[test]
    fn raw_round_trips_through_registry_encoding() {
        let format = TextureFormat::Rgb10A2Unorm;
        assert_eq!(TextureFormat::from_raw(format.raw()), Some(format));
        assert_eq!(format.bytes_per_pixel(), 4);
    }
}
