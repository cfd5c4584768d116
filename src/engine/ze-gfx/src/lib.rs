use num_derive::FromPrimitive;
use serde_derive::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub mod backend;
pub mod cache;
pub mod pipeline;
pub mod resource;

/// Pixel formats understood by the graphics layer.
/// Discriminants match the DXGI format values so conversion is a cast.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, FromPrimitive, Default,
)]
#[repr(u32)]
pub enum PixelFormat {
    #[default]
    Unknown = 0,
    R32G32B32A32Float = 2,
    R32G32B32Float = 6,
    R16G16B16A16Float = 10,
    R32G32Float = 16,
    R32G8X24Typeless = 19,
    D32FloatS8X24Uint = 20,
    R32FloatX8X24Typeless = 21,
    R10G10B10A2Unorm = 24,
    R11G11B10Float = 26,
    R8G8B8A8Unorm = 28,
    R8G8B8A8UnormSrgb = 29,
    R16G16Float = 34,
    R32Typeless = 39,
    D32Float = 40,
    R32Float = 41,
    R32Uint = 42,
    R24G8Typeless = 44,
    D24UnormS8Uint = 45,
    R24UnormX8Typeless = 46,
    R16Typeless = 53,
    R16Float = 54,
    D16Unorm = 55,
    R16Unorm = 56,
    R16Uint = 57,
    R8Unorm = 61,
    BC1Unorm = 71,
    BC1UnormSrgb = 72,
    BC3Unorm = 77,
    BC3UnormSrgb = 78,
    B8G8R8A8Unorm = 87,
    B8G8R8A8UnormSrgb = 91,
    NV12 = 103,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 33] = [
        PixelFormat::Unknown,
        PixelFormat::R32G32B32A32Float,
        PixelFormat::R32G32B32Float,
        PixelFormat::R16G16B16A16Float,
        PixelFormat::R32G32Float,
        PixelFormat::R32G8X24Typeless,
        PixelFormat::D32FloatS8X24Uint,
        PixelFormat::R32FloatX8X24Typeless,
        PixelFormat::R10G10B10A2Unorm,
        PixelFormat::R11G11B10Float,
        PixelFormat::R8G8B8A8Unorm,
        PixelFormat::R8G8B8A8UnormSrgb,
        PixelFormat::R16G16Float,
        PixelFormat::R32Typeless,
        PixelFormat::D32Float,
        PixelFormat::R32Float,
        PixelFormat::R32Uint,
        PixelFormat::R24G8Typeless,
        PixelFormat::D24UnormS8Uint,
        PixelFormat::R24UnormX8Typeless,
        PixelFormat::R16Typeless,
        PixelFormat::R16Float,
        PixelFormat::D16Unorm,
        PixelFormat::R16Unorm,
        PixelFormat::R16Uint,
        PixelFormat::R8Unorm,
        PixelFormat::BC1Unorm,
        PixelFormat::BC1UnormSrgb,
        PixelFormat::BC3Unorm,
        PixelFormat::BC3UnormSrgb,
        PixelFormat::B8G8R8A8Unorm,
        PixelFormat::B8G8R8A8UnormSrgb,
        PixelFormat::NV12,
    ];

    pub fn size_in_bits(&self) -> u32 {
        match self {
            PixelFormat::Unknown => 0,
            PixelFormat::R32G32B32A32Float => 128,
            PixelFormat::R32G32B32Float => 96,
            PixelFormat::R16G16B16A16Float
            | PixelFormat::R32G32Float
            | PixelFormat::R32G8X24Typeless
            | PixelFormat::D32FloatS8X24Uint
            | PixelFormat::R32FloatX8X24Typeless => 64,
            PixelFormat::R10G10B10A2Unorm
            | PixelFormat::R11G11B10Float
            | PixelFormat::R8G8B8A8Unorm
            | PixelFormat::R8G8B8A8UnormSrgb
            | PixelFormat::R16G16Float
            | PixelFormat::R32Typeless
            | PixelFormat::D32Float
            | PixelFormat::R32Float
            | PixelFormat::R32Uint
            | PixelFormat::R24G8Typeless
            | PixelFormat::D24UnormS8Uint
            | PixelFormat::R24UnormX8Typeless
            | PixelFormat::B8G8R8A8Unorm
            | PixelFormat::B8G8R8A8UnormSrgb => 32,
            PixelFormat::R16Typeless
            | PixelFormat::R16Float
            | PixelFormat::D16Unorm
            | PixelFormat::R16Unorm
            | PixelFormat::R16Uint => 16,
            PixelFormat::NV12 => 12,
            PixelFormat::R8Unorm | PixelFormat::BC3Unorm | PixelFormat::BC3UnormSrgb => 8,
            PixelFormat::BC1Unorm | PixelFormat::BC1UnormSrgb => 4,
        }
    }

    pub fn bytes_size(&self) -> u32 {
        self.size_in_bits() / 8
    }

    pub fn texture_size_in_bytes(&self, width: u32, height: u32) -> u64 {
        (width as u64) * (height as u64) * (self.size_in_bits() as u64) / 8
    }

    pub fn is_srgb(&self) -> bool {
        matches!(
            self,
            PixelFormat::R8G8B8A8UnormSrgb
                | PixelFormat::B8G8R8A8UnormSrgb
                | PixelFormat::BC1UnormSrgb
                | PixelFormat::BC3UnormSrgb
        )
    }

    /// sRGB variant of the format, or the format itself when none exists
    pub fn to_srgb(&self) -> PixelFormat {
        match self {
            PixelFormat::R8G8B8A8Unorm => PixelFormat::R8G8B8A8UnormSrgb,
            PixelFormat::B8G8R8A8Unorm => PixelFormat::B8G8R8A8UnormSrgb,
            PixelFormat::BC1Unorm => PixelFormat::BC1UnormSrgb,
            PixelFormat::BC3Unorm => PixelFormat::BC3UnormSrgb,
            other => *other,
        }
    }

    pub fn to_non_srgb(&self) -> PixelFormat {
        match self {
            PixelFormat::R8G8B8A8UnormSrgb => PixelFormat::R8G8B8A8Unorm,
            PixelFormat::B8G8R8A8UnormSrgb => PixelFormat::B8G8R8A8Unorm,
            PixelFormat::BC1UnormSrgb => PixelFormat::BC1Unorm,
            PixelFormat::BC3UnormSrgb => PixelFormat::BC3Unorm,
            other => *other,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(
            self,
            PixelFormat::BC1Unorm
                | PixelFormat::BC1UnormSrgb
                | PixelFormat::BC3Unorm
                | PixelFormat::BC3UnormSrgb
        )
    }

    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            PixelFormat::D16Unorm
                | PixelFormat::D32Float
                | PixelFormat::D24UnormS8Uint
                | PixelFormat::D32FloatS8X24Uint
        )
    }

    /// True for formats (typeless or not) that carry a stencil component
    pub fn has_stencil(&self) -> bool {
        matches!(
            self,
            PixelFormat::R24G8Typeless
                | PixelFormat::D24UnormS8Uint
                | PixelFormat::R32G8X24Typeless
                | PixelFormat::D32FloatS8X24Uint
        )
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::B8G8R8A8UnormSrgb => write!(f, "BGRA 8-bit (unorm, sRGB)"),
            PixelFormat::B8G8R8A8Unorm => write!(f, "BGRA 8-bit (unorm)"),
            PixelFormat::R8G8B8A8Unorm => write!(f, "RGBA 8-bit (unorm)"),
            PixelFormat::R8G8B8A8UnormSrgb => write!(f, "RGBA 8-bit (unorm, sRGB)"),
            PixelFormat::D24UnormS8Uint => write!(f, "Depth 24-bit / stencil 8-bit"),
            _ => write!(f, "{:?}", self),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SampleDesc {
    pub count: u32,
    pub quality: u32,
}

impl Default for SampleDesc {
    fn default() -> Self {
        Self {
            count: 1,
            quality: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::PixelFormat;
    use num_traits::FromPrimitive;

    #[test]
    fn discriminant_round_trips_through_from_primitive() {
        for format in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_u32(format as u32), Some(format));
        }
        assert_eq!(PixelFormat::from_u32(1), None);
    }

    #[test]
    fn srgb_conversions_are_symmetric() {
        for format in PixelFormat::ALL {
            let srgb = format.to_srgb();
            if srgb != format {
                assert!(srgb.is_srgb());
                assert_eq!(srgb.to_non_srgb(), format);
            }
        }
        assert_eq!(PixelFormat::R16Float.to_srgb(), PixelFormat::R16Float);
    }

    #[test]
    fn sizes() {
        assert_eq!(PixelFormat::R32G32B32A32Float.bytes_size(), 16);
        assert_eq!(PixelFormat::R16Uint.bytes_size(), 2);
        assert_eq!(PixelFormat::BC1Unorm.texture_size_in_bytes(4, 4), 8);
        assert_eq!(PixelFormat::R8G8B8A8Unorm.texture_size_in_bytes(2, 2), 16);
    }
}
