use crate::PixelFormat;
use enumflags2::{bitflags, make_bitflags, BitFlags};
use serde_derive::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GraphicsResourceUsage {
    #[default]
    Default,
    Immutable,
    Dynamic,
    Staging,
}

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferFlags {
    ConstantBuffer = 1 << 0,
    IndexBuffer = 1 << 1,
    VertexBuffer = 1 << 2,
    RenderTarget = 1 << 3,
    ShaderResource = 1 << 4,
    UnorderedAccess = 1 << 5,
    StructuredBuffer = 1 << 6,
    Append = 1 << 7,
    Counter = 1 << 8,
    RawBuffer = 1 << 9,
    ArgumentBuffer = 1 << 10,
    StreamOutput = 1 << 11,
}

pub const STRUCTURED_APPEND_BUFFER: BitFlags<BufferFlags> =
    make_bitflags!(BufferFlags::{UnorderedAccess | StructuredBuffer | Append});
pub const STRUCTURED_COUNTER_BUFFER: BitFlags<BufferFlags> =
    make_bitflags!(BufferFlags::{UnorderedAccess | StructuredBuffer | Counter});

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size_in_bytes: u32,
    /// Non-zero for structured buffers
    pub structure_byte_stride: u32,
    pub flags: BitFlags<BufferFlags>,
    pub usage: GraphicsResourceUsage,
    /// Format of typed shader resource / render target views
    pub view_format: PixelFormat,
}

impl BufferDesc {
    pub fn new(size_in_bytes: u32, flags: BitFlags<BufferFlags>, usage: GraphicsResourceUsage) -> Self {
        Self {
            size_in_bytes,
            structure_byte_stride: 0,
            flags,
            usage,
            view_format: PixelFormat::Unknown,
        }
    }
}

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureFlags {
    ShaderResource = 1 << 0,
    RenderTarget = 1 << 1,
    UnorderedAccess = 1 << 2,
    DepthStencil = 1 << 3,
    /// Depth stencil bound read-only, usable as depth test and SRV at once
    ReadOnly = 1 << 4,
}

pub const DEPTH_STENCIL_READ_ONLY: BitFlags<TextureFlags> =
    make_bitflags!(TextureFlags::{DepthStencil | ReadOnly});

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureOptions {
    Shared = 1 << 0,
    SharedKeyedMutex = 1 << 1,
    SharedNtHandle = 1 << 2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    Texture1D,
    #[default]
    Texture2D,
    Texture3D,
    TextureCube,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum MultisampleCount {
    #[default]
    None = 1,
    X2 = 2,
    X4 = 4,
    X8 = 8,
}

impl MultisampleCount {
    pub const ALL: [MultisampleCount; 4] = [
        MultisampleCount::None,
        MultisampleCount::X2,
        MultisampleCount::X4,
        MultisampleCount::X8,
    ];

    pub fn count(&self) -> u32 {
        *self as u32
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub dimension: TextureDimension,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_size: u32,
    pub mip_levels: u32,
    pub format: PixelFormat,
    pub multisample_count: MultisampleCount,
    pub usage: GraphicsResourceUsage,
    pub flags: BitFlags<TextureFlags>,
    pub options: BitFlags<TextureOptions>,
}

impl TextureDesc {
    pub fn new_2d(
        width: u32,
        height: u32,
        format: PixelFormat,
        flags: BitFlags<TextureFlags>,
    ) -> Self {
        Self {
            dimension: TextureDimension::Texture2D,
            width,
            height,
            depth: 1,
            array_size: 1,
            mip_levels: 1,
            format,
            multisample_count: MultisampleCount::None,
            usage: GraphicsResourceUsage::Default,
            flags,
            options: BitFlags::empty(),
        }
    }

    pub fn is_multisampled(&self) -> bool {
        self.multisample_count > MultisampleCount::None
    }

    pub fn is_render_target(&self) -> bool {
        self.flags.contains(TextureFlags::RenderTarget)
    }

    pub fn is_depth_stencil(&self) -> bool {
        self.flags.contains(TextureFlags::DepthStencil)
    }

    pub fn is_shader_resource(&self) -> bool {
        self.flags.contains(TextureFlags::ShaderResource)
    }

    pub fn is_unordered_access(&self) -> bool {
        self.flags.contains(TextureFlags::UnorderedAccess)
    }

    pub fn is_depth_stencil_read_only(&self) -> bool {
        self.flags.contains(DEPTH_STENCIL_READ_ONLY)
    }
}

/// Which part of a texture a view covers
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ViewType {
    /// Every array slice and mip level
    #[default]
    Full,
    /// One array slice at one mip level
    Single,
    /// One array slice, from a mip level to the last one
    ArrayBand,
    /// One mip level, from an array slice to the last one
    MipBand,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureViewDesc {
    pub format: PixelFormat,
    pub view_type: ViewType,
    pub array_slice: u32,
    pub mip_level: u32,
    pub flags: BitFlags<TextureFlags>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct ResourceRegion {
    pub left: u32,
    pub top: u32,
    pub front: u32,
    pub right: u32,
    pub bottom: u32,
    pub back: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapMode {
    Read = 1,
    Write = 2,
    ReadWrite = 3,
    WriteDiscard = 4,
    WriteNoOverwrite = 5,
}

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DepthStencilClearOptions {
    DepthBuffer = 1 << 0,
    Stencil = 1 << 1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryType {
    Timestamp,
    Occlusion,
    PipelineStatistics,
}

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::resource::{
        BufferFlags, MultisampleCount, TextureDesc, TextureFlags, DEPTH_STENCIL_READ_ONLY,
        STRUCTURED_APPEND_BUFFER,
    };
    use crate::PixelFormat;

    #[test]
    fn composite_buffer_flags() {
        assert!(STRUCTURED_APPEND_BUFFER.contains(BufferFlags::UnorderedAccess));
        assert!(STRUCTURED_APPEND_BUFFER.contains(BufferFlags::StructuredBuffer));
        assert!(!STRUCTURED_APPEND_BUFFER.contains(BufferFlags::Counter));
    }

    #[test]
    fn read_only_depth_requires_both_bits() {
        let mut desc = TextureDesc::new_2d(
            64,
            64,
            PixelFormat::D24UnormS8Uint,
            TextureFlags::DepthStencil.into(),
        );
        assert!(desc.is_depth_stencil());
        assert!(!desc.is_depth_stencil_read_only());

        desc.flags = DEPTH_STENCIL_READ_ONLY;
        assert!(desc.is_depth_stencil_read_only());
    }

    #[test]
    fn multisample_ordering() {
        assert!(MultisampleCount::X4 > MultisampleCount::None);
        assert_eq!(MultisampleCount::X8.count(), 8);
    }
}
