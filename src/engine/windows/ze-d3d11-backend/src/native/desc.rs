//! Plain descriptions handed to the native layer.
//! They mirror the native descriptor structs closely, without any ABI concern.

use enumflags2::{bitflags, BitFlags};
use ze_core::maths::RectI32;
use ze_gfx::backend::Rational;
use ze_gfx::pipeline::StreamOutputElement;
use ze_gfx::resource::GraphicsResourceUsage;
use ze_gfx::{PixelFormat, SampleDesc};

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindFlags {
    VertexBuffer = 0x1,
    IndexBuffer = 0x2,
    ConstantBuffer = 0x4,
    ShaderResource = 0x8,
    StreamOutput = 0x10,
    RenderTarget = 0x20,
    DepthStencil = 0x40,
    UnorderedAccess = 0x80,
    Decoder = 0x200,
}

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CpuAccessFlags {
    Write = 0x10000,
    Read = 0x20000,
}

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceMiscFlags {
    GenerateMips = 0x1,
    Shared = 0x2,
    TextureCube = 0x4,
    DrawIndirectArgs = 0x10,
    BufferAllowRawViews = 0x20,
    BufferStructured = 0x40,
    SharedKeyedMutex = 0x100,
    SharedNtHandle = 0x800,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NativeBufferDesc {
    pub byte_width: u32,
    pub usage: GraphicsResourceUsage,
    pub bind_flags: BitFlags<BindFlags>,
    pub cpu_access_flags: BitFlags<CpuAccessFlags>,
    pub misc_flags: BitFlags<ResourceMiscFlags>,
    pub structure_byte_stride: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NativeTextureDimension {
    Texture1D,
    Texture2D,
    Texture3D,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NativeTextureDesc {
    pub dimension: NativeTextureDimension,
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, array size otherwise
    pub depth_or_array_size: u32,
    pub mip_levels: u32,
    pub format: PixelFormat,
    pub sample_desc: SampleDesc,
    pub usage: GraphicsResourceUsage,
    pub bind_flags: BitFlags<BindFlags>,
    pub cpu_access_flags: BitFlags<CpuAccessFlags>,
    pub misc_flags: BitFlags<ResourceMiscFlags>,
}

/// Initial content of one subresource
#[derive(Copy, Clone, Debug)]
pub struct SubresourceData<'a> {
    pub data: &'a [u8],
    pub row_pitch: u32,
    pub slice_pitch: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SrvDimension {
    /// Extended buffer view, `raw` reads it as a byte address buffer
    Buffer {
        first_element: u32,
        num_elements: u32,
        raw: bool,
    },
    Texture1D {
        most_detailed_mip: u32,
        mip_levels: u32,
    },
    Texture1DArray {
        most_detailed_mip: u32,
        mip_levels: u32,
        first_array_slice: u32,
        array_size: u32,
    },
    Texture2D {
        most_detailed_mip: u32,
        mip_levels: u32,
    },
    Texture2DArray {
        most_detailed_mip: u32,
        mip_levels: u32,
        first_array_slice: u32,
        array_size: u32,
    },
    Texture2DMs,
    Texture2DMsArray {
        first_array_slice: u32,
        array_size: u32,
    },
    Texture3D {
        most_detailed_mip: u32,
        mip_levels: u32,
    },
    TextureCube {
        most_detailed_mip: u32,
        mip_levels: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShaderResourceViewDesc {
    pub format: PixelFormat,
    pub dimension: SrvDimension,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RtvDimension {
    Buffer {
        first_element: u32,
        num_elements: u32,
    },
    Texture1D {
        mip_slice: u32,
    },
    Texture1DArray {
        mip_slice: u32,
        first_array_slice: u32,
        array_size: u32,
    },
    Texture2D {
        mip_slice: u32,
    },
    Texture2DArray {
        mip_slice: u32,
        first_array_slice: u32,
        array_size: u32,
    },
    Texture2DMs,
    Texture2DMsArray {
        first_array_slice: u32,
        array_size: u32,
    },
    Texture3D {
        mip_slice: u32,
        first_w_slice: u32,
        w_size: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderTargetViewDesc {
    pub format: PixelFormat,
    pub dimension: RtvDimension,
}

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferUavFlags {
    Raw = 0x1,
    Append = 0x2,
    Counter = 0x4,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UavDimension {
    Buffer {
        first_element: u32,
        num_elements: u32,
        flags: BitFlags<BufferUavFlags>,
    },
    Texture1D {
        mip_slice: u32,
    },
    Texture1DArray {
        mip_slice: u32,
        first_array_slice: u32,
        array_size: u32,
    },
    Texture2D {
        mip_slice: u32,
    },
    Texture2DArray {
        mip_slice: u32,
        first_array_slice: u32,
        array_size: u32,
    },
    Texture3D {
        mip_slice: u32,
        first_w_slice: u32,
        w_size: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnorderedAccessViewDesc {
    pub format: PixelFormat,
    pub dimension: UavDimension,
}

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DsvFlags {
    ReadOnlyDepth = 0x1,
    ReadOnlyStencil = 0x2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DsvDimension {
    Texture2D {
        mip_slice: u32,
    },
    Texture2DArray {
        mip_slice: u32,
        first_array_slice: u32,
        array_size: u32,
    },
    Texture2DMs,
    Texture2DMsArray {
        first_array_slice: u32,
        array_size: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DepthStencilViewDesc {
    pub format: PixelFormat,
    pub flags: BitFlags<DsvFlags>,
    pub dimension: DsvDimension,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamOutputDesc {
    pub elements: Vec<StreamOutputElement>,
    pub strides: Vec<u32>,
    pub rasterized_stream: i32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NativeQueryKind {
    Timestamp,
    TimestampDisjoint,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimestampDisjoint {
    pub frequency: u64,
    pub disjoint: bool,
}

/// CPU view of a mapped subresource
#[derive(Copy, Clone, Debug)]
pub struct MappedSubresource {
    pub data: *mut u8,
    pub row_pitch: u32,
    pub depth_pitch: u32,
}

impl MappedSubresource {
    pub fn empty() -> Self {
        Self {
            data: std::ptr::null_mut(),
            row_pitch: 0,
            depth_pitch: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterDesc {
    pub description: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub dedicated_video_memory: u64,
    /// Locally unique identifier (high part, low part)
    pub luid: (i32, u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputDesc {
    pub device_name: String,
    pub desktop_coordinates: RectI32,
    pub attached_to_desktop: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ScanlineOrdering {
    #[default]
    Unspecified,
    Progressive,
    UpperFieldFirst,
    LowerFieldFirst,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ModeScaling {
    #[default]
    Unspecified,
    Centered,
    Stretched,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct NativeModeDesc {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: Rational,
    pub format: PixelFormat,
    pub scanline_ordering: ScanlineOrdering,
    pub scaling: ModeScaling,
}

/// Why a device stopped working
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceRemovedReason {
    Removed,
    Reset,
    Hung,
    DriverInternalError,
    InvalidCall,
    Other,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct ThreadingSupport {
    pub concurrent_creates: bool,
    pub command_lists: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwapEffect {
    Discard,
    Sequential,
    FlipSequential,
    FlipDiscard,
}

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SwapChainFlags {
    AllowModeSwitch = 0x2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub mode: NativeModeDesc,
    pub sample_desc: SampleDesc,
    pub buffer_count: u32,
    pub windowed: bool,
    pub swap_effect: SwapEffect,
    pub flags: BitFlags<SwapChainFlags>,
}

/// Window association flags
#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WindowAssociationFlags {
    NoWindowChanges = 0x1,
    NoAltEnter = 0x2,
    NoPrintScreen = 0x4,
}
