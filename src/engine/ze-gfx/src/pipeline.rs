use crate::resource::MultisampleCount;
use crate::PixelFormat;
use enumflags2::{bitflags, BitFlags};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use ze_core::ObjectId;

pub const MAX_RENDER_TARGET_COUNT: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never = 1,
    Less = 2,
    Equal = 3,
    LessEqual = 4,
    Greater = 5,
    NotEqual = 6,
    GreaterEqual = 7,
    Always = 8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    Keep = 1,
    Zero = 2,
    Replace = 3,
    IncrementSaturation = 4,
    DecrementSaturation = 5,
    Invert = 6,
    Increment = 7,
    Decrement = 8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FillMode {
    Wireframe = 2,
    Solid = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CullMode {
    None = 1,
    Front = 2,
    Back = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Blend {
    Zero = 1,
    One = 2,
    SourceColor = 3,
    InverseSourceColor = 4,
    SourceAlpha = 5,
    InverseSourceAlpha = 6,
    DestinationAlpha = 7,
    InverseDestinationAlpha = 8,
    DestinationColor = 9,
    InverseDestinationColor = 10,
    SourceAlphaSaturate = 11,
    BlendFactor = 14,
    InverseBlendFactor = 15,
    SecondarySourceColor = 16,
    InverseSecondarySourceColor = 17,
    SecondarySourceAlpha = 18,
    InverseSecondarySourceAlpha = 19,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlendFunction {
    Add = 1,
    Subtract = 2,
    ReverseSubtract = 3,
    Min = 4,
    Max = 5,
}

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColorWriteChannels {
    Red = 1 << 0,
    Green = 1 << 1,
    Blue = 1 << 2,
    Alpha = 1 << 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlendStateRenderTargetDesc {
    pub blend_enable: bool,
    pub color_source_blend: Blend,
    pub color_destination_blend: Blend,
    pub color_blend_function: BlendFunction,
    pub alpha_source_blend: Blend,
    pub alpha_destination_blend: Blend,
    pub alpha_blend_function: BlendFunction,
    pub color_write_channels: BitFlags<ColorWriteChannels>,
}

impl Default for BlendStateRenderTargetDesc {
    fn default() -> Self {
        Self {
            blend_enable: false,
            color_source_blend: Blend::One,
            color_destination_blend: Blend::Zero,
            color_blend_function: BlendFunction::Add,
            alpha_source_blend: Blend::One,
            alpha_destination_blend: Blend::Zero,
            alpha_blend_function: BlendFunction::Add,
            color_write_channels: BitFlags::all(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct BlendStateDesc {
    pub alpha_to_coverage_enable: bool,
    pub independent_blend_enable: bool,
    pub render_targets: [BlendStateRenderTargetDesc; MAX_RENDER_TARGET_COUNT],
}

impl BlendStateDesc {
    /// Premultiplied alpha blending on the first render target
    pub fn alpha_blend() -> Self {
        let mut desc = Self::default();
        desc.render_targets[0] = BlendStateRenderTargetDesc {
            blend_enable: true,
            color_source_blend: Blend::One,
            color_destination_blend: Blend::InverseSourceAlpha,
            alpha_source_blend: Blend::One,
            alpha_destination_blend: Blend::InverseSourceAlpha,
            ..Default::default()
        };
        desc
    }
}

/// Float fields are compared bitwise so the description can key a hash map
#[derive(Copy, Clone, Debug)]
pub struct RasterizerStateDesc {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_face_counter_clockwise: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scale_depth_bias: f32,
    pub depth_clip_enable: bool,
    pub scissor_test_enable: bool,
    pub multisample_count: MultisampleCount,
    pub multisample_antialias_line: bool,
}

impl RasterizerStateDesc {
    pub fn is_multisample_enabled(&self) -> bool {
        self.multisample_count > MultisampleCount::None
    }
}

impl Default for RasterizerStateDesc {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_face_counter_clockwise: false,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scale_depth_bias: 0.0,
            depth_clip_enable: true,
            scissor_test_enable: false,
            multisample_count: MultisampleCount::None,
            multisample_antialias_line: false,
        }
    }
}

impl PartialEq for RasterizerStateDesc {
    fn eq(&self, other: &Self) -> bool {
        self.fill_mode == other.fill_mode
            && self.cull_mode == other.cull_mode
            && self.front_face_counter_clockwise == other.front_face_counter_clockwise
            && self.depth_bias == other.depth_bias
            && self.depth_bias_clamp.to_bits() == other.depth_bias_clamp.to_bits()
            && self.slope_scale_depth_bias.to_bits() == other.slope_scale_depth_bias.to_bits()
            && self.depth_clip_enable == other.depth_clip_enable
            && self.scissor_test_enable == other.scissor_test_enable
            && self.multisample_count == other.multisample_count
            && self.multisample_antialias_line == other.multisample_antialias_line
    }
}

impl Eq for RasterizerStateDesc {}

impl Hash for RasterizerStateDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fill_mode.hash(state);
        self.cull_mode.hash(state);
        self.front_face_counter_clockwise.hash(state);
        state.write_i32(self.depth_bias);
        state.write_u32(self.depth_bias_clamp.to_bits());
        state.write_u32(self.slope_scale_depth_bias.to_bits());
        self.depth_clip_enable.hash(state);
        self.scissor_test_enable.hash(state);
        self.multisample_count.hash(state);
        self.multisample_antialias_line.hash(state);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilStencilOpDesc {
    pub stencil_fail: StencilOperation,
    pub stencil_depth_buffer_fail: StencilOperation,
    pub stencil_pass: StencilOperation,
    pub stencil_function: CompareFunction,
}

impl Default for DepthStencilStencilOpDesc {
    fn default() -> Self {
        Self {
            stencil_fail: StencilOperation::Keep,
            stencil_depth_buffer_fail: StencilOperation::Keep,
            stencil_pass: StencilOperation::Keep,
            stencil_function: CompareFunction::Always,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDesc {
    pub depth_buffer_enable: bool,
    pub depth_buffer_write_enable: bool,
    pub depth_buffer_function: CompareFunction,
    pub stencil_enable: bool,
    pub stencil_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: DepthStencilStencilOpDesc,
    pub back_face: DepthStencilStencilOpDesc,
}

impl Default for DepthStencilStateDesc {
    fn default() -> Self {
        Self {
            depth_buffer_enable: true,
            depth_buffer_write_enable: true,
            depth_buffer_function: CompareFunction::LessEqual,
            stencil_enable: false,
            stencil_mask: 0xff,
            stencil_write_mask: 0xff,
            front_face: Default::default(),
            back_face: Default::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    #[default]
    Undefined,
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    LineListWithAdjacency,
    LineStripWithAdjacency,
    TriangleListWithAdjacency,
    TriangleStripWithAdjacency,
    /// Tessellation patch with 1 to 32 control points
    PatchList(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum InputClassification {
    #[default]
    Vertex,
    Instance,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InputElementDesc {
    pub semantic_name: String,
    pub semantic_index: u32,
    pub format: PixelFormat,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
    pub input_slot_class: InputClassification,
    pub instance_data_step_rate: u32,
}

impl InputElementDesc {
    /// Offset meaning "right after the previous element"
    pub const APPEND_ALIGNED: u32 = u32::MAX;

    pub fn new(semantic_name: &str, semantic_index: u32, format: PixelFormat) -> Self {
        Self {
            semantic_name: semantic_name.to_string(),
            semantic_index,
            format,
            input_slot: 0,
            aligned_byte_offset: Self::APPEND_ALIGNED,
            input_slot_class: InputClassification::Vertex,
            instance_data_step_rate: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    None = 0,
    Vertex = 1,
    Hull = 2,
    Domain = 3,
    Geometry = 4,
    Pixel = 5,
    Compute = 6,
}

pub const SHADER_STAGE_COUNT: usize = 6;

impl ShaderStage {
    pub const ALL: [ShaderStage; SHADER_STAGE_COUNT] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
        ShaderStage::Compute,
    ];

    /// Slot of the stage in per-stage arrays, `None` has no slot
    pub fn index(&self) -> Option<usize> {
        match self {
            ShaderStage::None => None,
            stage => Some(*stage as usize - 1),
        }
    }
}

/// Compiled shader for one stage, identified by a hash of its bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderBytecode {
    pub id: ObjectId,
    pub stage: ShaderStage,
    pub data: Arc<[u8]>,
}

impl ShaderBytecode {
    pub fn new(stage: ShaderStage, data: &[u8]) -> Self {
        Self {
            id: ObjectId::from_content(data),
            stage,
            data: Arc::from(data),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamOutputElement {
    pub stream: u32,
    pub semantic_name: String,
    pub semantic_index: u32,
    pub start_component: u8,
    pub component_count: u8,
    pub output_slot: u8,
}

/// Every stage of an effect, plus its optional stream output layout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectBytecode {
    pub id: ObjectId,
    pub stages: Vec<ShaderBytecode>,
    pub stream_output_elements: Vec<StreamOutputElement>,
    pub stream_output_strides: Vec<u32>,
    pub stream_output_rasterized_stream: i32,
}

impl EffectBytecode {
    pub fn new(stages: Vec<ShaderBytecode>) -> Self {
        Self {
            id: ObjectId::combine(stages.iter().map(|stage| &stage.id)),
            stages,
            stream_output_elements: vec![],
            stream_output_strides: vec![],
            stream_output_rasterized_stream: 0,
        }
    }

    pub fn with_stream_output(
        mut self,
        elements: Vec<StreamOutputElement>,
        strides: Vec<u32>,
        rasterized_stream: i32,
    ) -> Self {
        self.stream_output_elements = elements;
        self.stream_output_strides = strides;
        self.stream_output_rasterized_stream = rasterized_stream;
        self
    }

    pub fn stage(&self, stage: ShaderStage) -> Option<&ShaderBytecode> {
        self.stages.iter().find(|bytecode| bytecode.stage == stage)
    }
}

#[derive(Clone, Debug)]
pub struct PipelineStateDesc {
    pub effect: Option<Arc<EffectBytecode>>,
    pub blend_state: BlendStateDesc,
    pub sample_mask: u32,
    pub rasterizer_state: RasterizerStateDesc,
    pub depth_stencil_state: DepthStencilStateDesc,
    pub input_elements: Option<Vec<InputElementDesc>>,
    pub primitive_type: PrimitiveType,
}

impl Default for PipelineStateDesc {
    fn default() -> Self {
        Self {
            effect: None,
            blend_state: Default::default(),
            sample_mask: 0xFFFFFFFF,
            rasterizer_state: Default::default(),
            depth_stencil_state: Default::default(),
            input_elements: None,
            primitive_type: PrimitiveType::Undefined,
        }
    }
}

/// Values match the native filter encoding
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Point = 0,
    MinMagPointMipLinear = 0x1,
    MinPointMagLinearMipPoint = 0x4,
    MinPointMagMipLinear = 0x5,
    MinLinearMagMipPoint = 0x10,
    MinLinearMagPointMipLinear = 0x11,
    MinMagLinearMipPoint = 0x14,
    Linear = 0x15,
    Anisotropic = 0x55,
    ComparisonPoint = 0x80,
    ComparisonLinear = 0x95,
    ComparisonAnisotropic = 0xd5,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureAddressMode {
    Wrap = 1,
    Mirror = 2,
    Clamp = 3,
    Border = 4,
    MirrorOnce = 5,
}

#[derive(Copy, Clone, Debug)]
pub struct SamplerStateDesc {
    pub filter: TextureFilter,
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    pub mip_map_level_of_detail_bias: f32,
    pub max_anisotropy: u32,
    pub compare_function: CompareFunction,
    pub border_color: [f32; 4],
    pub min_mip_level: f32,
    pub max_mip_level: f32,
}

impl Default for SamplerStateDesc {
    fn default() -> Self {
        Self {
            filter: TextureFilter::Linear,
            address_u: TextureAddressMode::Wrap,
            address_v: TextureAddressMode::Wrap,
            address_w: TextureAddressMode::Wrap,
            mip_map_level_of_detail_bias: 0.0,
            max_anisotropy: 16,
            compare_function: CompareFunction::Never,
            border_color: [0.0; 4],
            min_mip_level: -f32::MAX,
            max_mip_level: f32::MAX,
        }
    }
}

impl PartialEq for SamplerStateDesc {
    fn eq(&self, other: &Self) -> bool {
        self.filter == other.filter
            && self.address_u == other.address_u
            && self.address_v == other.address_v
            && self.address_w == other.address_w
            && self.mip_map_level_of_detail_bias.to_bits()
                == other.mip_map_level_of_detail_bias.to_bits()
            && self.max_anisotropy == other.max_anisotropy
            && self.compare_function == other.compare_function
            && self
                .border_color
                .iter()
                .zip(other.border_color.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
            && self.min_mip_level.to_bits() == other.min_mip_level.to_bits()
            && self.max_mip_level.to_bits() == other.max_mip_level.to_bits()
    }
}

impl Eq for SamplerStateDesc {}
