use crate::native::desc::*;
use enumflags2::BitFlags;
use num_traits::FromPrimitive;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use ze_core::maths::RectI32;
use ze_gfx::backend::{GraphicsProfile, Rational};
use ze_gfx::pipeline::*;
use ze_gfx::resource::{GraphicsResourceUsage, MapMode, ResourceRegion, Viewport};
use ze_gfx::{PixelFormat, SampleDesc};

pub fn format(format: PixelFormat) -> DXGI_FORMAT {
    DXGI_FORMAT(format as i32)
}

pub fn pixel_format(format: DXGI_FORMAT) -> PixelFormat {
    PixelFormat::from_i32(format.0).unwrap_or(PixelFormat::Unknown)
}

pub fn feature_level(profile: GraphicsProfile) -> D3D_FEATURE_LEVEL {
    D3D_FEATURE_LEVEL(profile as i32)
}

pub fn profile(level: D3D_FEATURE_LEVEL) -> GraphicsProfile {
    GraphicsProfile::from_raw(level.0 as u32).unwrap_or(GraphicsProfile::Level9_1)
}

pub fn sample_desc(desc: SampleDesc) -> DXGI_SAMPLE_DESC {
    DXGI_SAMPLE_DESC {
        Count: desc.count,
        Quality: desc.quality,
    }
}

pub fn usage(usage: GraphicsResourceUsage) -> D3D11_USAGE {
    match usage {
        GraphicsResourceUsage::Default => D3D11_USAGE_DEFAULT,
        GraphicsResourceUsage::Immutable => D3D11_USAGE_IMMUTABLE,
        GraphicsResourceUsage::Dynamic => D3D11_USAGE_DYNAMIC,
        GraphicsResourceUsage::Staging => D3D11_USAGE_STAGING,
    }
}

pub fn graphics_usage(usage: D3D11_USAGE) -> GraphicsResourceUsage {
    match usage {
        D3D11_USAGE_IMMUTABLE => GraphicsResourceUsage::Immutable,
        D3D11_USAGE_DYNAMIC => GraphicsResourceUsage::Dynamic,
        D3D11_USAGE_STAGING => GraphicsResourceUsage::Staging,
        _ => GraphicsResourceUsage::Default,
    }
}

pub fn map_type(mode: MapMode) -> D3D11_MAP {
    D3D11_MAP(mode as i32)
}

pub fn rational(rational: Rational) -> DXGI_RATIONAL {
    DXGI_RATIONAL {
        Numerator: rational.numerator,
        Denominator: rational.denominator,
    }
}

pub fn mode_desc(mode: &NativeModeDesc) -> DXGI_MODE_DESC {
    DXGI_MODE_DESC {
        Width: mode.width,
        Height: mode.height,
        RefreshRate: rational(mode.refresh_rate),
        Format: format(mode.format),
        ScanlineOrdering: match mode.scanline_ordering {
            ScanlineOrdering::Unspecified => DXGI_MODE_SCANLINE_ORDER_UNSPECIFIED,
            ScanlineOrdering::Progressive => DXGI_MODE_SCANLINE_ORDER_PROGRESSIVE,
            ScanlineOrdering::UpperFieldFirst => DXGI_MODE_SCANLINE_ORDER_UPPER_FIELD_FIRST,
            ScanlineOrdering::LowerFieldFirst => DXGI_MODE_SCANLINE_ORDER_LOWER_FIELD_FIRST,
        },
        Scaling: match mode.scaling {
            ModeScaling::Unspecified => DXGI_MODE_SCALING_UNSPECIFIED,
            ModeScaling::Centered => DXGI_MODE_SCALING_CENTERED,
            ModeScaling::Stretched => DXGI_MODE_SCALING_STRETCHED,
        },
    }
}

pub fn native_mode_desc(mode: &DXGI_MODE_DESC) -> NativeModeDesc {
    NativeModeDesc {
        width: mode.Width,
        height: mode.Height,
        refresh_rate: Rational::new(mode.RefreshRate.Numerator, mode.RefreshRate.Denominator),
        format: pixel_format(mode.Format),
        scanline_ordering: match mode.ScanlineOrdering {
            DXGI_MODE_SCANLINE_ORDER_PROGRESSIVE => ScanlineOrdering::Progressive,
            DXGI_MODE_SCANLINE_ORDER_UPPER_FIELD_FIRST => ScanlineOrdering::UpperFieldFirst,
            DXGI_MODE_SCANLINE_ORDER_LOWER_FIELD_FIRST => ScanlineOrdering::LowerFieldFirst,
            _ => ScanlineOrdering::Unspecified,
        },
        scaling: match mode.Scaling {
            DXGI_MODE_SCALING_CENTERED => ModeScaling::Centered,
            DXGI_MODE_SCALING_STRETCHED => ModeScaling::Stretched,
            _ => ModeScaling::Unspecified,
        },
    }
}

pub fn rect(rect: &RectI32) -> RECT {
    RECT {
        left: rect.x,
        top: rect.y,
        right: rect.x + rect.width,
        bottom: rect.y + rect.height,
    }
}

pub fn viewport(viewport: &Viewport) -> D3D11_VIEWPORT {
    D3D11_VIEWPORT {
        TopLeftX: viewport.x,
        TopLeftY: viewport.y,
        Width: viewport.width,
        Height: viewport.height,
        MinDepth: viewport.min_depth,
        MaxDepth: viewport.max_depth,
    }
}

pub fn resource_box(region: &ResourceRegion) -> D3D11_BOX {
    D3D11_BOX {
        left: region.left,
        top: region.top,
        front: region.front,
        right: region.right,
        bottom: region.bottom,
        back: region.back,
    }
}

pub fn primitive_topology(primitive_type: PrimitiveType) -> D3D_PRIMITIVE_TOPOLOGY {
    match primitive_type {
        PrimitiveType::Undefined => D3D_PRIMITIVE_TOPOLOGY_UNDEFINED,
        PrimitiveType::PointList => D3D_PRIMITIVE_TOPOLOGY_POINTLIST,
        PrimitiveType::LineList => D3D_PRIMITIVE_TOPOLOGY_LINELIST,
        PrimitiveType::LineStrip => D3D_PRIMITIVE_TOPOLOGY_LINESTRIP,
        PrimitiveType::TriangleList => D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST,
        PrimitiveType::TriangleStrip => D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP,
        PrimitiveType::LineListWithAdjacency => D3D_PRIMITIVE_TOPOLOGY_LINELIST_ADJ,
        PrimitiveType::LineStripWithAdjacency => D3D_PRIMITIVE_TOPOLOGY_LINESTRIP_ADJ,
        PrimitiveType::TriangleListWithAdjacency => D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST_ADJ,
        PrimitiveType::TriangleStripWithAdjacency => D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP_ADJ,
        PrimitiveType::PatchList(control_points) => D3D_PRIMITIVE_TOPOLOGY(
            D3D_PRIMITIVE_TOPOLOGY_1_CONTROL_POINT_PATCHLIST.0 + control_points.clamp(1, 32) as i32 - 1,
        ),
    }
}

fn comparison(function: CompareFunction) -> D3D11_COMPARISON_FUNC {
    D3D11_COMPARISON_FUNC(function as i32)
}

fn blend(blend: Blend) -> D3D11_BLEND {
    D3D11_BLEND(blend as i32)
}

fn blend_op(function: BlendFunction) -> D3D11_BLEND_OP {
    D3D11_BLEND_OP(function as i32)
}

fn stencil_op(operation: StencilOperation) -> D3D11_STENCIL_OP {
    D3D11_STENCIL_OP(operation as i32)
}

fn stencil_op_desc(desc: &DepthStencilStencilOpDesc) -> D3D11_DEPTH_STENCILOP_DESC {
    D3D11_DEPTH_STENCILOP_DESC {
        StencilFailOp: stencil_op(desc.stencil_fail),
        StencilDepthFailOp: stencil_op(desc.stencil_depth_buffer_fail),
        StencilPassOp: stencil_op(desc.stencil_pass),
        StencilFunc: comparison(desc.stencil_function),
    }
}

pub fn blend_desc(desc: &BlendStateDesc) -> D3D11_BLEND_DESC {
    let mut native = D3D11_BLEND_DESC {
        AlphaToCoverageEnable: desc.alpha_to_coverage_enable.into(),
        IndependentBlendEnable: desc.independent_blend_enable.into(),
        ..Default::default()
    };

    for (target, render_target) in native.RenderTarget.iter_mut().zip(desc.render_targets.iter()) {
        *target = D3D11_RENDER_TARGET_BLEND_DESC {
            BlendEnable: render_target.blend_enable.into(),
            SrcBlend: blend(render_target.color_source_blend),
            DestBlend: blend(render_target.color_destination_blend),
            BlendOp: blend_op(render_target.color_blend_function),
            SrcBlendAlpha: blend(render_target.alpha_source_blend),
            DestBlendAlpha: blend(render_target.alpha_destination_blend),
            BlendOpAlpha: blend_op(render_target.alpha_blend_function),
            RenderTargetWriteMask: render_target.color_write_channels.bits(),
        };
    }
    native
}

pub fn rasterizer_desc(desc: &RasterizerStateDesc) -> D3D11_RASTERIZER_DESC {
    D3D11_RASTERIZER_DESC {
        FillMode: D3D11_FILL_MODE(desc.fill_mode as i32),
        CullMode: D3D11_CULL_MODE(desc.cull_mode as i32),
        FrontCounterClockwise: desc.front_face_counter_clockwise.into(),
        DepthBias: desc.depth_bias,
        DepthBiasClamp: desc.depth_bias_clamp,
        SlopeScaledDepthBias: desc.slope_scale_depth_bias,
        DepthClipEnable: desc.depth_clip_enable.into(),
        ScissorEnable: desc.scissor_test_enable.into(),
        MultisampleEnable: desc.is_multisample_enabled().into(),
        AntialiasedLineEnable: desc.multisample_antialias_line.into(),
    }
}

pub fn depth_stencil_desc(desc: &DepthStencilStateDesc) -> D3D11_DEPTH_STENCIL_DESC {
    D3D11_DEPTH_STENCIL_DESC {
        DepthEnable: desc.depth_buffer_enable.into(),
        DepthWriteMask: if desc.depth_buffer_write_enable {
            D3D11_DEPTH_WRITE_MASK_ALL
        } else {
            D3D11_DEPTH_WRITE_MASK_ZERO
        },
        DepthFunc: comparison(desc.depth_buffer_function),
        StencilEnable: desc.stencil_enable.into(),
        StencilReadMask: desc.stencil_mask,
        StencilWriteMask: desc.stencil_write_mask,
        FrontFace: stencil_op_desc(&desc.front_face),
        BackFace: stencil_op_desc(&desc.back_face),
    }
}

pub fn sampler_desc(desc: &SamplerStateDesc) -> D3D11_SAMPLER_DESC {
    D3D11_SAMPLER_DESC {
        Filter: D3D11_FILTER(desc.filter as i32),
        AddressU: D3D11_TEXTURE_ADDRESS_MODE(desc.address_u as i32),
        AddressV: D3D11_TEXTURE_ADDRESS_MODE(desc.address_v as i32),
        AddressW: D3D11_TEXTURE_ADDRESS_MODE(desc.address_w as i32),
        MipLODBias: desc.mip_map_level_of_detail_bias,
        MaxAnisotropy: desc.max_anisotropy,
        ComparisonFunc: comparison(desc.compare_function),
        BorderColor: desc.border_color,
        MinLOD: desc.min_mip_level,
        MaxLOD: desc.max_mip_level,
    }
}

pub fn bind_flags(flags: BitFlags<BindFlags>) -> D3D11_BIND_FLAG {
    D3D11_BIND_FLAG(flags.bits() as _)
}

pub fn cpu_access_flags(flags: BitFlags<CpuAccessFlags>) -> D3D11_CPU_ACCESS_FLAG {
    D3D11_CPU_ACCESS_FLAG(flags.bits() as _)
}

pub fn misc_flags(flags: BitFlags<ResourceMiscFlags>) -> D3D11_RESOURCE_MISC_FLAG {
    D3D11_RESOURCE_MISC_FLAG(flags.bits() as _)
}

pub fn buffer_desc(desc: &NativeBufferDesc) -> D3D11_BUFFER_DESC {
    D3D11_BUFFER_DESC {
        ByteWidth: desc.byte_width,
        Usage: usage(desc.usage),
        BindFlags: bind_flags(desc.bind_flags),
        CPUAccessFlags: cpu_access_flags(desc.cpu_access_flags),
        MiscFlags: misc_flags(desc.misc_flags),
        StructureByteStride: desc.structure_byte_stride,
    }
}

pub fn texture_1d_desc(desc: &NativeTextureDesc) -> D3D11_TEXTURE1D_DESC {
    D3D11_TEXTURE1D_DESC {
        Width: desc.width,
        MipLevels: desc.mip_levels,
        ArraySize: desc.depth_or_array_size,
        Format: format(desc.format),
        Usage: usage(desc.usage),
        BindFlags: bind_flags(desc.bind_flags),
        CPUAccessFlags: cpu_access_flags(desc.cpu_access_flags),
        MiscFlags: misc_flags(desc.misc_flags),
    }
}

pub fn texture_2d_desc(desc: &NativeTextureDesc) -> D3D11_TEXTURE2D_DESC {
    D3D11_TEXTURE2D_DESC {
        Width: desc.width,
        Height: desc.height,
        MipLevels: desc.mip_levels,
        ArraySize: desc.depth_or_array_size,
        Format: format(desc.format),
        SampleDesc: sample_desc(desc.sample_desc),
        Usage: usage(desc.usage),
        BindFlags: bind_flags(desc.bind_flags),
        CPUAccessFlags: cpu_access_flags(desc.cpu_access_flags),
        MiscFlags: misc_flags(desc.misc_flags),
    }
}

pub fn texture_3d_desc(desc: &NativeTextureDesc) -> D3D11_TEXTURE3D_DESC {
    D3D11_TEXTURE3D_DESC {
        Width: desc.width,
        Height: desc.height,
        Depth: desc.depth_or_array_size,
        MipLevels: desc.mip_levels,
        Format: format(desc.format),
        Usage: usage(desc.usage),
        BindFlags: bind_flags(desc.bind_flags),
        CPUAccessFlags: cpu_access_flags(desc.cpu_access_flags),
        MiscFlags: misc_flags(desc.misc_flags),
    }
}

/// Description of a native texture in engine terms, unknown bits are dropped
#[allow(clippy::too_many_arguments)]
pub fn native_texture_desc(
    dimension: NativeTextureDimension,
    width: u32,
    height: u32,
    depth_or_array_size: u32,
    mip_levels: u32,
    dxgi_format: DXGI_FORMAT,
    dxgi_sample_desc: DXGI_SAMPLE_DESC,
    d3d_usage: D3D11_USAGE,
    bind: u32,
    cpu_access: u32,
    misc: u32,
) -> NativeTextureDesc {
    NativeTextureDesc {
        dimension,
        width,
        height,
        depth_or_array_size,
        mip_levels,
        format: pixel_format(dxgi_format),
        sample_desc: SampleDesc {
            count: dxgi_sample_desc.Count,
            quality: dxgi_sample_desc.Quality,
        },
        usage: graphics_usage(d3d_usage),
        bind_flags: BitFlags::from_bits_truncate(bind),
        cpu_access_flags: BitFlags::from_bits_truncate(cpu_access),
        misc_flags: BitFlags::from_bits_truncate(misc),
    }
}

pub fn srv_desc(desc: &ShaderResourceViewDesc) -> D3D11_SHADER_RESOURCE_VIEW_DESC {
    let mut native = D3D11_SHADER_RESOURCE_VIEW_DESC {
        Format: format(desc.format),
        ..Default::default()
    };

    match desc.dimension {
        SrvDimension::Buffer {
            first_element,
            num_elements,
            raw,
        } => {
            native.ViewDimension = D3D_SRV_DIMENSION_BUFFEREX;
            native.Anonymous.BufferEx = D3D11_BUFFEREX_SRV {
                FirstElement: first_element,
                NumElements: num_elements,
                Flags: if raw { D3D11_BUFFEREX_SRV_FLAG_RAW.0 as u32 } else { 0 },
            };
        }
        SrvDimension::Texture1D {
            most_detailed_mip,
            mip_levels,
        } => {
            native.ViewDimension = D3D_SRV_DIMENSION_TEXTURE1D;
            native.Anonymous.Texture1D = D3D11_TEX1D_SRV {
                MostDetailedMip: most_detailed_mip,
                MipLevels: mip_levels,
            };
        }
        SrvDimension::Texture1DArray {
            most_detailed_mip,
            mip_levels,
            first_array_slice,
            array_size,
        } => {
            native.ViewDimension = D3D_SRV_DIMENSION_TEXTURE1DARRAY;
            native.Anonymous.Texture1DArray = D3D11_TEX1D_ARRAY_SRV {
                MostDetailedMip: most_detailed_mip,
                MipLevels: mip_levels,
                FirstArraySlice: first_array_slice,
                ArraySize: array_size,
            };
        }
        SrvDimension::Texture2D {
            most_detailed_mip,
            mip_levels,
        } => {
            native.ViewDimension = D3D_SRV_DIMENSION_TEXTURE2D;
            native.Anonymous.Texture2D = D3D11_TEX2D_SRV {
                MostDetailedMip: most_detailed_mip,
                MipLevels: mip_levels,
            };
        }
        SrvDimension::Texture2DArray {
            most_detailed_mip,
            mip_levels,
            first_array_slice,
            array_size,
        } => {
            native.ViewDimension = D3D_SRV_DIMENSION_TEXTURE2DARRAY;
            native.Anonymous.Texture2DArray = D3D11_TEX2D_ARRAY_SRV {
                MostDetailedMip: most_detailed_mip,
                MipLevels: mip_levels,
                FirstArraySlice: first_array_slice,
                ArraySize: array_size,
            };
        }
        SrvDimension::Texture2DMs => {
            native.ViewDimension = D3D_SRV_DIMENSION_TEXTURE2DMS;
        }
        SrvDimension::Texture2DMsArray {
            first_array_slice,
            array_size,
        } => {
            native.ViewDimension = D3D_SRV_DIMENSION_TEXTURE2DMSARRAY;
            native.Anonymous.Texture2DMSArray = D3D11_TEX2DMS_ARRAY_SRV {
                FirstArraySlice: first_array_slice,
                ArraySize: array_size,
            };
        }
        SrvDimension::Texture3D {
            most_detailed_mip,
            mip_levels,
        } => {
            native.ViewDimension = D3D_SRV_DIMENSION_TEXTURE3D;
            native.Anonymous.Texture3D = D3D11_TEX3D_SRV {
                MostDetailedMip: most_detailed_mip,
                MipLevels: mip_levels,
            };
        }
        SrvDimension::TextureCube {
            most_detailed_mip,
            mip_levels,
        } => {
            native.ViewDimension = D3D_SRV_DIMENSION_TEXTURECUBE;
            native.Anonymous.TextureCube = D3D11_TEXCUBE_SRV {
                MostDetailedMip: most_detailed_mip,
                MipLevels: mip_levels,
            };
        }
    }
    native
}

pub fn rtv_desc(desc: &RenderTargetViewDesc) -> D3D11_RENDER_TARGET_VIEW_DESC {
    let mut native = D3D11_RENDER_TARGET_VIEW_DESC {
        Format: format(desc.format),
        ..Default::default()
    };

    match desc.dimension {
        RtvDimension::Buffer {
            first_element,
            num_elements,
        } => {
            native.ViewDimension = D3D11_RTV_DIMENSION_BUFFER;
            native.Anonymous.Buffer = D3D11_BUFFER_RTV {
                Anonymous1: D3D11_BUFFER_RTV_0 {
                    FirstElement: first_element,
                },
                Anonymous2: D3D11_BUFFER_RTV_1 {
                    NumElements: num_elements,
                },
            };
        }
        RtvDimension::Texture1D { mip_slice } => {
            native.ViewDimension = D3D11_RTV_DIMENSION_TEXTURE1D;
            native.Anonymous.Texture1D = D3D11_TEX1D_RTV { MipSlice: mip_slice };
        }
        RtvDimension::Texture1DArray {
            mip_slice,
            first_array_slice,
            array_size,
        } => {
            native.ViewDimension = D3D11_RTV_DIMENSION_TEXTURE1DARRAY;
            native.Anonymous.Texture1DArray = D3D11_TEX1D_ARRAY_RTV {
                MipSlice: mip_slice,
                FirstArraySlice: first_array_slice,
                ArraySize: array_size,
            };
        }
        RtvDimension::Texture2D { mip_slice } => {
            native.ViewDimension = D3D11_RTV_DIMENSION_TEXTURE2D;
            native.Anonymous.Texture2D = D3D11_TEX2D_RTV { MipSlice: mip_slice };
        }
        RtvDimension::Texture2DArray {
            mip_slice,
            first_array_slice,
            array_size,
        } => {
            native.ViewDimension = D3D11_RTV_DIMENSION_TEXTURE2DARRAY;
            native.Anonymous.Texture2DArray = D3D11_TEX2D_ARRAY_RTV {
                MipSlice: mip_slice,
                FirstArraySlice: first_array_slice,
                ArraySize: array_size,
            };
        }
        RtvDimension::Texture2DMs => {
            native.ViewDimension = D3D11_RTV_DIMENSION_TEXTURE2DMS;
        }
        RtvDimension::Texture2DMsArray {
            first_array_slice,
            array_size,
        } => {
            native.ViewDimension = D3D11_RTV_DIMENSION_TEXTURE2DMSARRAY;
            native.Anonymous.Texture2DMSArray = D3D11_TEX2DMS_ARRAY_RTV {
                FirstArraySlice: first_array_slice,
                ArraySize: array_size,
            };
        }
        RtvDimension::Texture3D {
            mip_slice,
            first_w_slice,
            w_size,
        } => {
            native.ViewDimension = D3D11_RTV_DIMENSION_TEXTURE3D;
            native.Anonymous.Texture3D = D3D11_TEX3D_RTV {
                MipSlice: mip_slice,
                FirstWSlice: first_w_slice,
                WSize: w_size,
            };
        }
    }
    native
}

pub fn uav_desc(desc: &UnorderedAccessViewDesc) -> D3D11_UNORDERED_ACCESS_VIEW_DESC {
    let mut native = D3D11_UNORDERED_ACCESS_VIEW_DESC {
        Format: format(desc.format),
        ..Default::default()
    };

    match desc.dimension {
        UavDimension::Buffer {
            first_element,
            num_elements,
            flags,
        } => {
            native.ViewDimension = D3D11_UAV_DIMENSION_BUFFER;
            native.Anonymous.Buffer = D3D11_BUFFER_UAV {
                FirstElement: first_element,
                NumElements: num_elements,
                Flags: flags.bits(),
            };
        }
        UavDimension::Texture1D { mip_slice } => {
            native.ViewDimension = D3D11_UAV_DIMENSION_TEXTURE1D;
            native.Anonymous.Texture1D = D3D11_TEX1D_UAV { MipSlice: mip_slice };
        }
        UavDimension::Texture1DArray {
            mip_slice,
            first_array_slice,
            array_size,
        } => {
            native.ViewDimension = D3D11_UAV_DIMENSION_TEXTURE1DARRAY;
            native.Anonymous.Texture1DArray = D3D11_TEX1D_ARRAY_UAV {
                MipSlice: mip_slice,
                FirstArraySlice: first_array_slice,
                ArraySize: array_size,
            };
        }
        UavDimension::Texture2D { mip_slice } => {
            native.ViewDimension = D3D11_UAV_DIMENSION_TEXTURE2D;
            native.Anonymous.Texture2D = D3D11_TEX2D_UAV { MipSlice: mip_slice };
        }
        UavDimension::Texture2DArray {
            mip_slice,
            first_array_slice,
            array_size,
        } => {
            native.ViewDimension = D3D11_UAV_DIMENSION_TEXTURE2DARRAY;
            native.Anonymous.Texture2DArray = D3D11_TEX2D_ARRAY_UAV {
                MipSlice: mip_slice,
                FirstArraySlice: first_array_slice,
                ArraySize: array_size,
            };
        }
        UavDimension::Texture3D {
            mip_slice,
            first_w_slice,
            w_size,
        } => {
            native.ViewDimension = D3D11_UAV_DIMENSION_TEXTURE3D;
            native.Anonymous.Texture3D = D3D11_TEX3D_UAV {
                MipSlice: mip_slice,
                FirstWSlice: first_w_slice,
                WSize: w_size,
            };
        }
    }
    native
}

pub fn dsv_desc(desc: &DepthStencilViewDesc) -> D3D11_DEPTH_STENCIL_VIEW_DESC {
    let mut native = D3D11_DEPTH_STENCIL_VIEW_DESC {
        Format: format(desc.format),
        Flags: desc.flags.bits(),
        ..Default::default()
    };

    match desc.dimension {
        DsvDimension::Texture2D { mip_slice } => {
            native.ViewDimension = D3D11_DSV_DIMENSION_TEXTURE2D;
            native.Anonymous.Texture2D = D3D11_TEX2D_DSV { MipSlice: mip_slice };
        }
        DsvDimension::Texture2DArray {
            mip_slice,
            first_array_slice,
            array_size,
        } => {
            native.ViewDimension = D3D11_DSV_DIMENSION_TEXTURE2DARRAY;
            native.Anonymous.Texture2DArray = D3D11_TEX2D_ARRAY_DSV {
                MipSlice: mip_slice,
                FirstArraySlice: first_array_slice,
                ArraySize: array_size,
            };
        }
        DsvDimension::Texture2DMs => {
            native.ViewDimension = D3D11_DSV_DIMENSION_TEXTURE2DMS;
        }
        DsvDimension::Texture2DMsArray {
            first_array_slice,
            array_size,
        } => {
            native.ViewDimension = D3D11_DSV_DIMENSION_TEXTURE2DMSARRAY;
            native.Anonymous.Texture2DMSArray = D3D11_TEX2DMS_ARRAY_DSV {
                FirstArraySlice: first_array_slice,
                ArraySize: array_size,
            };
        }
    }
    native
}
