//! Seam between the backend logic and the native graphics API.
//!
//! Everything above this module speaks in engine types and calls these traits.
//! `crate::d3d11` implements them on top of DXGI/Direct3D11, `crate::null` records calls.

pub mod desc;

use crate::native::desc::*;
use crate::video::{VideoDecoderConfig, VideoDecoderDesc};
use raw_window_handle::RawWindowHandle;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;
use ze_core::maths::RectI32;
use ze_gfx::backend::{DeviceCreationFlags, DeviceError, GraphicsProfile};
use ze_gfx::pipeline::{
    BlendStateDesc, DepthStencilStateDesc, InputElementDesc, PrimitiveType, RasterizerStateDesc,
    SamplerStateDesc, ShaderStage,
};
use ze_gfx::resource::{DepthStencilClearOptions, MapMode, ResourceRegion, Viewport};
use ze_gfx::PixelFormat;
use enumflags2::BitFlags;

pub type NativeResult<T> = Result<T, DeviceError>;

/// Reference-counted handle to a native object.
/// Two handles are equal when they point to the same allocation.
#[derive(Clone)]
pub struct NativeObject(Arc<dyn Any + Send + Sync>);

impl NativeObject {
    pub fn new<T: Any + Send + Sync>(object: T) -> Self {
        Self(Arc::new(object))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for NativeObject {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for NativeObject {}

impl Hash for NativeObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.address());
    }
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeObject({:#x})", self.address())
    }
}

pub trait NativeFactory: Send + Sync {
    /// Adapters in system order, the first one is the default adapter
    fn enum_adapters(&self) -> NativeResult<Vec<Arc<dyn NativeAdapter>>>;

    /// True when a frame debugger hooked the process
    fn is_graphics_debugger_attached(&self) -> bool;

    fn create_swap_chain(
        &self,
        device: &dyn NativeDevice,
        window: RawWindowHandle,
        desc: &SwapChainDesc,
    ) -> NativeResult<Box<dyn NativeSwapChain>>;

    fn make_window_association(
        &self,
        window: RawWindowHandle,
        flags: BitFlags<WindowAssociationFlags>,
    ) -> NativeResult<()>;
}

pub struct NativeDeviceHandles {
    pub device: Arc<dyn NativeDevice>,
    pub immediate_context: Box<dyn NativeContext>,
}

pub trait NativeAdapter: Send + Sync {
    fn desc(&self) -> AdapterDesc;

    /// Outputs connected to the adapter, stops at the first missing index
    fn enum_outputs(&self) -> NativeResult<Vec<Arc<dyn NativeOutput>>>;

    /// Create a device accepting the first supported level of `levels`
    fn create_device(
        &self,
        levels: &[GraphicsProfile],
        flags: BitFlags<DeviceCreationFlags>,
    ) -> NativeResult<NativeDeviceHandles>;

    /// Test a level without keeping a device around
    fn is_feature_level_supported(&self, level: GraphicsProfile) -> bool;
}

pub trait NativeOutput: Send + Sync {
    fn desc(&self) -> NativeResult<OutputDesc>;

    fn display_mode_list(&self, format: PixelFormat) -> NativeResult<Vec<NativeModeDesc>>;

    /// `device` restricts the search to formats it supports
    fn find_closest_matching_mode(
        &self,
        mode: &NativeModeDesc,
        device: Option<&dyn NativeDevice>,
    ) -> NativeResult<NativeModeDesc>;

    /// Lets swap chains target this output when going fullscreen
    fn as_native_object(&self) -> NativeObject;
}

pub trait NativeDevice: Send + Sync {
    fn feature_level(&self) -> GraphicsProfile;
    fn threading_support(&self) -> ThreadingSupport;
    fn has_compute_shaders(&self) -> bool;
    fn has_double_precision(&self) -> bool;
    fn format_support(&self, format: PixelFormat) -> NativeResult<u32>;
    fn multisample_quality_levels(&self, format: PixelFormat, sample_count: u32) -> u32;

    fn create_buffer(
        &self,
        desc: &NativeBufferDesc,
        initial_data: Option<&[u8]>,
    ) -> NativeResult<NativeObject>;
    fn create_texture(
        &self,
        desc: &NativeTextureDesc,
        initial_data: &[SubresourceData],
    ) -> NativeResult<NativeObject>;
    fn texture_desc(&self, texture: &NativeObject) -> NativeResult<NativeTextureDesc>;
    /// Resource a shader resource view was created on
    fn view_resource(&self, view: &NativeObject) -> NativeResult<NativeObject>;

    fn create_shader_resource_view(
        &self,
        resource: &NativeObject,
        desc: &ShaderResourceViewDesc,
    ) -> NativeResult<NativeObject>;
    fn create_render_target_view(
        &self,
        resource: &NativeObject,
        desc: &RenderTargetViewDesc,
    ) -> NativeResult<NativeObject>;
    fn create_unordered_access_view(
        &self,
        resource: &NativeObject,
        desc: &UnorderedAccessViewDesc,
    ) -> NativeResult<NativeObject>;
    fn create_depth_stencil_view(
        &self,
        resource: &NativeObject,
        desc: &DepthStencilViewDesc,
    ) -> NativeResult<NativeObject>;

    fn create_shader(&self, stage: ShaderStage, bytecode: &[u8]) -> NativeResult<NativeObject>;
    fn create_geometry_shader_with_stream_output(
        &self,
        bytecode: &[u8],
        stream_output: &StreamOutputDesc,
    ) -> NativeResult<NativeObject>;
    fn create_input_layout(
        &self,
        elements: &[InputElementDesc],
        signature: &[u8],
    ) -> NativeResult<NativeObject>;

    fn create_blend_state(&self, desc: &BlendStateDesc) -> NativeResult<NativeObject>;
    fn create_rasterizer_state(&self, desc: &RasterizerStateDesc) -> NativeResult<NativeObject>;
    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilStateDesc,
    ) -> NativeResult<NativeObject>;
    fn create_sampler_state(&self, desc: &SamplerStateDesc) -> NativeResult<NativeObject>;
    fn create_query(&self, kind: NativeQueryKind) -> NativeResult<NativeObject>;

    /// `None` while the device is healthy
    fn device_removed_reason(&self) -> Option<DeviceRemovedReason>;
    fn report_live_objects(&self);
    fn set_multithread_protected(&self, enabled: bool);
    fn set_debug_name(&self, object: &NativeObject, name: &str);

    fn shared_handle(&self, texture: &NativeObject) -> NativeResult<usize>;
    fn create_shared_nt_handle(&self, texture: &NativeObject, name: &str) -> NativeResult<usize>;

    fn video_device(&self) -> NativeResult<Arc<dyn NativeVideoDevice>>;

    /// Lets factories create swap chains for this device
    fn as_native_object(&self) -> NativeObject;
}

/// Immediate context. Single threaded, hence `&mut self`.
pub trait NativeContext: Send {
    fn clear_state(&mut self);
    fn flush(&mut self);

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<&NativeObject>);
    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&NativeObject>);
    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: Option<&NativeObject>);
    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: Option<&NativeObject>);
    fn cs_set_unordered_access_view(
        &mut self,
        slot: u32,
        view: Option<&NativeObject>,
        initial_count: u32,
    );

    fn om_set_render_targets(
        &mut self,
        render_targets: &[Option<NativeObject>],
        depth_stencil: Option<&NativeObject>,
    );
    fn om_set_render_targets_and_unordered_access_views(
        &mut self,
        render_targets: &[Option<NativeObject>],
        depth_stencil: Option<&NativeObject>,
        uav_start_slot: u32,
        views: &[Option<NativeObject>],
        initial_counts: &[u32],
    );
    fn om_get_blend_state(&mut self) -> (Option<NativeObject>, [f32; 4], u32);
    fn om_set_blend_state(
        &mut self,
        state: Option<&NativeObject>,
        blend_factor: [f32; 4],
        sample_mask: u32,
    );
    fn om_get_depth_stencil_state(&mut self) -> (Option<NativeObject>, u32);
    fn om_set_depth_stencil_state(&mut self, state: Option<&NativeObject>, stencil_ref: u32);

    fn rs_set_state(&mut self, state: Option<&NativeObject>);
    fn rs_set_viewports(&mut self, viewports: &[Viewport]);
    fn rs_set_scissor_rects(&mut self, rects: &[RectI32]);

    fn ia_set_input_layout(&mut self, layout: Option<&NativeObject>);
    fn ia_set_primitive_topology(&mut self, topology: PrimitiveType);
    fn ia_set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: Option<&NativeObject>,
        stride: u32,
        offset: u32,
    );
    fn ia_set_index_buffer(
        &mut self,
        buffer: Option<&NativeObject>,
        format: PixelFormat,
        offset: u32,
    );
    fn so_set_targets(&mut self, buffers: &[Option<NativeObject>], offsets: &[u32]);

    fn draw(&mut self, vertex_count: u32, start_vertex: u32);
    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32);
    fn draw_instanced(
        &mut self,
        vertex_count_per_instance: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    );
    fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    );
    fn draw_instanced_indirect(&mut self, arguments: &NativeObject, aligned_byte_offset: u32);
    fn draw_indexed_instanced_indirect(
        &mut self,
        arguments: &NativeObject,
        aligned_byte_offset: u32,
    );
    fn draw_auto(&mut self);
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    fn dispatch_indirect(&mut self, arguments: &NativeObject, aligned_byte_offset: u32);

    fn clear_depth_stencil_view(
        &mut self,
        view: &NativeObject,
        options: BitFlags<DepthStencilClearOptions>,
        depth: f32,
        stencil: u8,
    );
    fn clear_render_target_view(&mut self, view: &NativeObject, color: [f32; 4]);
    fn clear_unordered_access_view_float(&mut self, view: &NativeObject, value: [f32; 4]);
    fn clear_unordered_access_view_uint(&mut self, view: &NativeObject, value: [u32; 4]);

    fn copy_resource(&mut self, destination: &NativeObject, source: &NativeObject);
    fn resolve_subresource(
        &mut self,
        destination: &NativeObject,
        destination_subresource: u32,
        source: &NativeObject,
        source_subresource: u32,
        format: PixelFormat,
    );
    #[allow(clippy::too_many_arguments)]
    fn copy_subresource_region(
        &mut self,
        destination: &NativeObject,
        destination_subresource: u32,
        x: u32,
        y: u32,
        z: u32,
        source: &NativeObject,
        source_subresource: u32,
        source_region: Option<&ResourceRegion>,
    );
    fn copy_structure_count(
        &mut self,
        destination: &NativeObject,
        aligned_byte_offset: u32,
        source_view: &NativeObject,
    );
    fn update_subresource(
        &mut self,
        resource: &NativeObject,
        subresource: u32,
        region: Option<&ResourceRegion>,
        data: &[u8],
        row_pitch: u32,
        depth_pitch: u32,
    );
    fn map(
        &mut self,
        resource: &NativeObject,
        subresource: u32,
        mode: MapMode,
        do_not_wait: bool,
    ) -> NativeResult<MappedSubresource>;
    fn unmap(&mut self, resource: &NativeObject, subresource: u32);

    fn begin_query(&mut self, query: &NativeObject);
    fn end_query(&mut self, query: &NativeObject);
    /// `None` until the GPU wrote the value
    fn timestamp_data(&mut self, query: &NativeObject) -> Option<u64>;
    fn timestamp_disjoint_data(&mut self, query: &NativeObject) -> Option<TimestampDisjoint>;

    fn begin_event(&mut self, name: &str);
    fn end_event(&mut self);
}

pub trait NativeSwapChain: Send {
    fn desc(&self) -> NativeResult<SwapChainDesc>;
    fn buffer(&self, index: u32) -> NativeResult<NativeObject>;
    fn present(&mut self, sync_interval: u32) -> NativeResult<()>;
    fn resize_buffers(
        &mut self,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        flags: BitFlags<SwapChainFlags>,
    ) -> NativeResult<()>;
    fn resize_target(&mut self, mode: &NativeModeDesc) -> NativeResult<()>;
    fn set_fullscreen_state(
        &mut self,
        fullscreen: bool,
        output: Option<&NativeObject>,
    ) -> NativeResult<()>;
    fn fullscreen_state(&self) -> NativeResult<bool>;

    /// Output the swap chain is fullscreen on, if any
    fn fullscreen_output(&self) -> NativeResult<Option<NativeObject>>;
}

pub trait NativeVideoDevice: Send + Sync {
    fn decoder_profile_count(&self) -> u32;
    fn decoder_profile(&self, index: u32) -> NativeResult<Uuid>;
    fn check_decoder_format(&self, profile: &Uuid, format: PixelFormat) -> NativeResult<bool>;
    fn decoder_config_count(&self, desc: &VideoDecoderDesc) -> NativeResult<u32>;
    fn decoder_config(&self, desc: &VideoDecoderDesc, index: u32)
        -> NativeResult<VideoDecoderConfig>;
    fn create_decoder(
        &self,
        desc: &VideoDecoderDesc,
        config: &VideoDecoderConfig,
    ) -> NativeResult<NativeObject>;
    fn create_decoder_output_view(
        &self,
        texture: &NativeObject,
        profile: &Uuid,
        array_slice: u32,
    ) -> NativeResult<NativeObject>;
}
