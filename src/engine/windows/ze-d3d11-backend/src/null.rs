//! Recording implementation of the native layer.
//!
//! Objects are plain descriptions, context calls are appended to a command log.
//! Used for headless runs and to check exactly which native calls the backend emits.

use crate::native::desc::*;
use crate::native::*;
use crate::video::{VideoDecoderConfig, VideoDecoderDesc};
use enumflags2::BitFlags;
use parking_lot::Mutex;
use raw_window_handle::RawWindowHandle;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;
use ze_core::maths::RectI32;
use ze_gfx::backend::{DeviceCreationFlags, DeviceError, GraphicsProfile, Rational};
use ze_gfx::pipeline::{
    BlendStateDesc, DepthStencilStateDesc, InputElementDesc, PrimitiveType, RasterizerStateDesc,
    SamplerStateDesc, ShaderStage,
};
use ze_gfx::resource::{
    DepthStencilClearOptions, GraphicsResourceUsage, MapMode, ResourceRegion, Viewport,
};
use ze_gfx::PixelFormat;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug, PartialEq)]
pub enum NullObjectKind {
    Device,
    Output,
    Buffer(NativeBufferDesc),
    Texture(NativeTextureDesc),
    ShaderResourceView(NativeObject, ShaderResourceViewDesc),
    RenderTargetView(NativeObject, RenderTargetViewDesc),
    UnorderedAccessView(NativeObject, UnorderedAccessViewDesc),
    DepthStencilView(NativeObject, DepthStencilViewDesc),
    Shader(ShaderStage),
    StreamOutputGeometryShader(StreamOutputDesc),
    InputLayout(Vec<InputElementDesc>),
    BlendState(BlendStateDesc),
    RasterizerState(RasterizerStateDesc),
    DepthStencilState(DepthStencilStateDesc),
    SamplerState(SamplerStateDesc),
    Query(NativeQueryKind),
    VideoDecoder(VideoDecoderDesc),
    VideoDecoderOutputView(NativeObject, Uuid),
}

/// Coarse category used to inject creation failures
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NullObjectClass {
    Device,
    Buffer,
    Texture,
    View,
    Shader,
    InputLayout,
    State,
    Query,
    Video,
}

impl NullObjectKind {
    fn class(&self) -> NullObjectClass {
        match self {
            NullObjectKind::Device | NullObjectKind::Output => NullObjectClass::Device,
            NullObjectKind::Buffer(_) => NullObjectClass::Buffer,
            NullObjectKind::Texture(_) => NullObjectClass::Texture,
            NullObjectKind::ShaderResourceView(..)
            | NullObjectKind::RenderTargetView(..)
            | NullObjectKind::UnorderedAccessView(..)
            | NullObjectKind::DepthStencilView(..) => NullObjectClass::View,
            NullObjectKind::Shader(_) | NullObjectKind::StreamOutputGeometryShader(_) => {
                NullObjectClass::Shader
            }
            NullObjectKind::InputLayout(_) => NullObjectClass::InputLayout,
            NullObjectKind::BlendState(_)
            | NullObjectKind::RasterizerState(_)
            | NullObjectKind::DepthStencilState(_)
            | NullObjectKind::SamplerState(_) => NullObjectClass::State,
            NullObjectKind::Query(_) => NullObjectClass::Query,
            NullObjectKind::VideoDecoder(_) | NullObjectKind::VideoDecoderOutputView(..) => {
                NullObjectClass::Video
            }
        }
    }
}

#[derive(Debug)]
pub struct NullObject {
    pub id: u64,
    pub kind: NullObjectKind,
}

impl NullObject {
    fn new_native(kind: NullObjectKind) -> NativeObject {
        NativeObject::new(NullObject {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
        })
    }
}

/// Kind of a native object created by this module
pub fn object_kind(object: &NativeObject) -> Option<&NullObjectKind> {
    object.downcast_ref::<NullObject>().map(|object| &object.kind)
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContextCommand {
    ClearState,
    Flush,
    SetShader(ShaderStage, Option<NativeObject>),
    SetConstantBuffer(ShaderStage, u32, Option<NativeObject>),
    SetSampler(ShaderStage, u32, Option<NativeObject>),
    SetShaderResource(ShaderStage, u32, Option<NativeObject>),
    CsSetUnorderedAccessView(u32, Option<NativeObject>, u32),
    OmSetRenderTargets {
        render_targets: Vec<Option<NativeObject>>,
        depth_stencil: Option<NativeObject>,
    },
    OmSetRenderTargetsAndUnorderedAccessViews {
        render_targets: Vec<Option<NativeObject>>,
        depth_stencil: Option<NativeObject>,
        uav_start_slot: u32,
        views: Vec<Option<NativeObject>>,
        initial_counts: Vec<u32>,
    },
    OmSetBlendState(Option<NativeObject>, [f32; 4], u32),
    OmSetDepthStencilState(Option<NativeObject>, u32),
    RsSetState(Option<NativeObject>),
    RsSetViewports(Vec<Viewport>),
    RsSetScissorRects(Vec<RectI32>),
    IaSetInputLayout(Option<NativeObject>),
    IaSetPrimitiveTopology(PrimitiveType),
    IaSetVertexBuffer {
        slot: u32,
        buffer: Option<NativeObject>,
        stride: u32,
        offset: u32,
    },
    IaSetIndexBuffer {
        buffer: Option<NativeObject>,
        format: PixelFormat,
        offset: u32,
    },
    SoSetTargets(Vec<Option<NativeObject>>, Vec<u32>),
    Draw {
        vertex_count: u32,
        start_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    },
    DrawInstanced {
        vertex_count_per_instance: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    },
    DrawIndexedInstanced {
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    },
    DrawInstancedIndirect(NativeObject, u32),
    DrawIndexedInstancedIndirect(NativeObject, u32),
    DrawAuto,
    Dispatch(u32, u32, u32),
    DispatchIndirect(NativeObject, u32),
    ClearDepthStencilView {
        view: NativeObject,
        options: BitFlags<DepthStencilClearOptions>,
        depth: f32,
        stencil: u8,
    },
    ClearRenderTargetView(NativeObject, [f32; 4]),
    ClearUnorderedAccessViewFloat(NativeObject, [f32; 4]),
    ClearUnorderedAccessViewUint(NativeObject, [u32; 4]),
    CopyResource {
        destination: NativeObject,
        source: NativeObject,
    },
    ResolveSubresource {
        destination: NativeObject,
        destination_subresource: u32,
        source: NativeObject,
        source_subresource: u32,
        format: PixelFormat,
    },
    CopySubresourceRegion {
        destination: NativeObject,
        destination_subresource: u32,
        x: u32,
        y: u32,
        z: u32,
        source: NativeObject,
        source_subresource: u32,
        source_region: Option<ResourceRegion>,
    },
    CopyStructureCount {
        destination: NativeObject,
        aligned_byte_offset: u32,
        source_view: NativeObject,
    },
    UpdateSubresource {
        resource: NativeObject,
        subresource: u32,
        region: Option<ResourceRegion>,
        data_size: usize,
    },
    Map {
        resource: NativeObject,
        subresource: u32,
        mode: MapMode,
        do_not_wait: bool,
    },
    Unmap(NativeObject, u32),
    BeginQuery(NativeObject),
    EndQuery(NativeObject),
    BeginEvent(String),
    EndEvent,
}

/// State shared between a null context and the test observing it
pub struct NullContextState {
    commands: Mutex<Vec<ContextCommand>>,
    ended_queries: Mutex<HashSet<NativeObject>>,
    queries_ready: AtomicBool,
    gpu_busy: AtomicBool,
    timestamp_frequency: AtomicU64,
}

impl Default for NullContextState {
    fn default() -> Self {
        Self {
            commands: Mutex::default(),
            ended_queries: Mutex::default(),
            queries_ready: AtomicBool::new(true),
            gpu_busy: AtomicBool::new(false),
            timestamp_frequency: AtomicU64::new(1_000_000_000),
        }
    }
}

impl NullContextState {
    pub fn commands(&self) -> Vec<ContextCommand> {
        self.commands.lock().clone()
    }

    pub fn take_commands(&self) -> Vec<ContextCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    /// Whether ended queries report their data
    pub fn set_queries_ready(&self, ready: bool) {
        self.queries_ready.store(ready, Ordering::SeqCst);
    }

    /// Makes `do_not_wait` maps fail as if the GPU still used the resource
    pub fn set_gpu_busy(&self, busy: bool) {
        self.gpu_busy.store(busy, Ordering::SeqCst);
    }

    pub fn set_timestamp_frequency(&self, frequency: u64) {
        self.timestamp_frequency.store(frequency, Ordering::SeqCst);
    }

    fn push(&self, command: ContextCommand) {
        self.commands.lock().push(command);
    }
}

pub struct NullContext {
    state: Arc<NullContextState>,
    blend_state: (Option<NativeObject>, [f32; 4], u32),
    depth_stencil_state: (Option<NativeObject>, u32),
}

impl NullContext {
    pub fn new(state: Arc<NullContextState>) -> Self {
        Self {
            state,
            blend_state: (None, [1.0; 4], u32::MAX),
            depth_stencil_state: (None, 0),
        }
    }

    fn push(&self, command: ContextCommand) {
        self.state.push(command);
    }
}

impl NativeContext for NullContext {
    fn clear_state(&mut self) {
        self.blend_state = (None, [1.0; 4], u32::MAX);
        self.depth_stencil_state = (None, 0);
        self.push(ContextCommand::ClearState);
    }

    fn flush(&mut self) {
        self.push(ContextCommand::Flush);
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<&NativeObject>) {
        self.push(ContextCommand::SetShader(stage, shader.cloned()));
    }

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&NativeObject>) {
        self.push(ContextCommand::SetConstantBuffer(stage, slot, buffer.cloned()));
    }

    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: Option<&NativeObject>) {
        self.push(ContextCommand::SetSampler(stage, slot, sampler.cloned()));
    }

    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: Option<&NativeObject>) {
        self.push(ContextCommand::SetShaderResource(stage, slot, view.cloned()));
    }

    fn cs_set_unordered_access_view(
        &mut self,
        slot: u32,
        view: Option<&NativeObject>,
        initial_count: u32,
    ) {
        self.push(ContextCommand::CsSetUnorderedAccessView(
            slot,
            view.cloned(),
            initial_count,
        ));
    }

    fn om_set_render_targets(
        &mut self,
        render_targets: &[Option<NativeObject>],
        depth_stencil: Option<&NativeObject>,
    ) {
        self.push(ContextCommand::OmSetRenderTargets {
            render_targets: render_targets.to_vec(),
            depth_stencil: depth_stencil.cloned(),
        });
    }

    fn om_set_render_targets_and_unordered_access_views(
        &mut self,
        render_targets: &[Option<NativeObject>],
        depth_stencil: Option<&NativeObject>,
        uav_start_slot: u32,
        views: &[Option<NativeObject>],
        initial_counts: &[u32],
    ) {
        self.push(ContextCommand::OmSetRenderTargetsAndUnorderedAccessViews {
            render_targets: render_targets.to_vec(),
            depth_stencil: depth_stencil.cloned(),
            uav_start_slot,
            views: views.to_vec(),
            initial_counts: initial_counts.to_vec(),
        });
    }

    fn om_get_blend_state(&mut self) -> (Option<NativeObject>, [f32; 4], u32) {
        self.blend_state.clone()
    }

    fn om_set_blend_state(
        &mut self,
        state: Option<&NativeObject>,
        blend_factor: [f32; 4],
        sample_mask: u32,
    ) {
        self.blend_state = (state.cloned(), blend_factor, sample_mask);
        self.push(ContextCommand::OmSetBlendState(
            state.cloned(),
            blend_factor,
            sample_mask,
        ));
    }

    fn om_get_depth_stencil_state(&mut self) -> (Option<NativeObject>, u32) {
        self.depth_stencil_state.clone()
    }

    fn om_set_depth_stencil_state(&mut self, state: Option<&NativeObject>, stencil_ref: u32) {
        self.depth_stencil_state = (state.cloned(), stencil_ref);
        self.push(ContextCommand::OmSetDepthStencilState(state.cloned(), stencil_ref));
    }

    fn rs_set_state(&mut self, state: Option<&NativeObject>) {
        self.push(ContextCommand::RsSetState(state.cloned()));
    }

    fn rs_set_viewports(&mut self, viewports: &[Viewport]) {
        self.push(ContextCommand::RsSetViewports(viewports.to_vec()));
    }

    fn rs_set_scissor_rects(&mut self, rects: &[RectI32]) {
        self.push(ContextCommand::RsSetScissorRects(rects.to_vec()));
    }

    fn ia_set_input_layout(&mut self, layout: Option<&NativeObject>) {
        self.push(ContextCommand::IaSetInputLayout(layout.cloned()));
    }

    fn ia_set_primitive_topology(&mut self, topology: PrimitiveType) {
        self.push(ContextCommand::IaSetPrimitiveTopology(topology));
    }

    fn ia_set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: Option<&NativeObject>,
        stride: u32,
        offset: u32,
    ) {
        self.push(ContextCommand::IaSetVertexBuffer {
            slot,
            buffer: buffer.cloned(),
            stride,
            offset,
        });
    }

    fn ia_set_index_buffer(
        &mut self,
        buffer: Option<&NativeObject>,
        format: PixelFormat,
        offset: u32,
    ) {
        self.push(ContextCommand::IaSetIndexBuffer {
            buffer: buffer.cloned(),
            format,
            offset,
        });
    }

    fn so_set_targets(&mut self, buffers: &[Option<NativeObject>], offsets: &[u32]) {
        self.push(ContextCommand::SoSetTargets(buffers.to_vec(), offsets.to_vec()));
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        self.push(ContextCommand::Draw {
            vertex_count,
            start_vertex,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.push(ContextCommand::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
        });
    }

    fn draw_instanced(
        &mut self,
        vertex_count_per_instance: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) {
        self.push(ContextCommand::DrawInstanced {
            vertex_count_per_instance,
            instance_count,
            start_vertex,
            start_instance,
        });
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.push(ContextCommand::DrawIndexedInstanced {
            index_count_per_instance,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        });
    }

    fn draw_instanced_indirect(&mut self, arguments: &NativeObject, aligned_byte_offset: u32) {
        self.push(ContextCommand::DrawInstancedIndirect(
            arguments.clone(),
            aligned_byte_offset,
        ));
    }

    fn draw_indexed_instanced_indirect(
        &mut self,
        arguments: &NativeObject,
        aligned_byte_offset: u32,
    ) {
        self.push(ContextCommand::DrawIndexedInstancedIndirect(
            arguments.clone(),
            aligned_byte_offset,
        ));
    }

    fn draw_auto(&mut self) {
        self.push(ContextCommand::DrawAuto);
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.push(ContextCommand::Dispatch(x, y, z));
    }

    fn dispatch_indirect(&mut self, arguments: &NativeObject, aligned_byte_offset: u32) {
        self.push(ContextCommand::DispatchIndirect(
            arguments.clone(),
            aligned_byte_offset,
        ));
    }

    fn clear_depth_stencil_view(
        &mut self,
        view: &NativeObject,
        options: BitFlags<DepthStencilClearOptions>,
        depth: f32,
        stencil: u8,
    ) {
        self.push(ContextCommand::ClearDepthStencilView {
            view: view.clone(),
            options,
            depth,
            stencil,
        });
    }

    fn clear_render_target_view(&mut self, view: &NativeObject, color: [f32; 4]) {
        self.push(ContextCommand::ClearRenderTargetView(view.clone(), color));
    }

    fn clear_unordered_access_view_float(&mut self, view: &NativeObject, value: [f32; 4]) {
        self.push(ContextCommand::ClearUnorderedAccessViewFloat(view.clone(), value));
    }

    fn clear_unordered_access_view_uint(&mut self, view: &NativeObject, value: [u32; 4]) {
        self.push(ContextCommand::ClearUnorderedAccessViewUint(view.clone(), value));
    }

    fn copy_resource(&mut self, destination: &NativeObject, source: &NativeObject) {
        self.push(ContextCommand::CopyResource {
            destination: destination.clone(),
            source: source.clone(),
        });
    }

    fn resolve_subresource(
        &mut self,
        destination: &NativeObject,
        destination_subresource: u32,
        source: &NativeObject,
        source_subresource: u32,
        format: PixelFormat,
    ) {
        self.push(ContextCommand::ResolveSubresource {
            destination: destination.clone(),
            destination_subresource,
            source: source.clone(),
            source_subresource,
            format,
        });
    }

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
    ) {
        self.push(ContextCommand::CopySubresourceRegion {
            destination: destination.clone(),
            destination_subresource,
            x,
            y,
            z,
            source: source.clone(),
            source_subresource,
            source_region: source_region.copied(),
        });
    }

    fn copy_structure_count(
        &mut self,
        destination: &NativeObject,
        aligned_byte_offset: u32,
        source_view: &NativeObject,
    ) {
        self.push(ContextCommand::CopyStructureCount {
            destination: destination.clone(),
            aligned_byte_offset,
            source_view: source_view.clone(),
        });
    }

    fn update_subresource(
        &mut self,
        resource: &NativeObject,
        subresource: u32,
        region: Option<&ResourceRegion>,
        data: &[u8],
        _row_pitch: u32,
        _depth_pitch: u32,
    ) {
        self.push(ContextCommand::UpdateSubresource {
            resource: resource.clone(),
            subresource,
            region: region.copied(),
            data_size: data.len(),
        });
    }

    fn map(
        &mut self,
        resource: &NativeObject,
        subresource: u32,
        mode: MapMode,
        do_not_wait: bool,
    ) -> NativeResult<MappedSubresource> {
        if do_not_wait && self.state.gpu_busy.load(Ordering::SeqCst) {
            return Err(DeviceError::StillDrawing);
        }

        self.push(ContextCommand::Map {
            resource: resource.clone(),
            subresource,
            mode,
            do_not_wait,
        });
        Ok(MappedSubresource::empty())
    }

    fn unmap(&mut self, resource: &NativeObject, subresource: u32) {
        self.push(ContextCommand::Unmap(resource.clone(), subresource));
    }

    fn begin_query(&mut self, query: &NativeObject) {
        self.state.ended_queries.lock().remove(query);
        self.push(ContextCommand::BeginQuery(query.clone()));
    }

    fn end_query(&mut self, query: &NativeObject) {
        self.state.ended_queries.lock().insert(query.clone());
        self.push(ContextCommand::EndQuery(query.clone()));
    }

    fn timestamp_data(&mut self, query: &NativeObject) -> Option<u64> {
        let ready = self.state.queries_ready.load(Ordering::SeqCst)
            && self.state.ended_queries.lock().contains(query);
        object_id(query).filter(|_| ready)
    }

    fn timestamp_disjoint_data(&mut self, query: &NativeObject) -> Option<TimestampDisjoint> {
        if self.state.queries_ready.load(Ordering::SeqCst)
            && self.state.ended_queries.lock().contains(query)
        {
            Some(TimestampDisjoint {
                frequency: self.state.timestamp_frequency.load(Ordering::SeqCst),
                disjoint: false,
            })
        } else {
            None
        }
    }

    fn begin_event(&mut self, name: &str) {
        self.push(ContextCommand::BeginEvent(name.to_string()));
    }

    fn end_event(&mut self) {
        self.push(ContextCommand::EndEvent);
    }
}

fn object_id(object: &NativeObject) -> Option<u64> {
    object.downcast_ref::<NullObject>().map(|object| object.id)
}

pub struct NullVideoDevice {
    /// Decoder profiles and whether each one can output NV12
    pub profiles: Vec<(Uuid, bool)>,
    pub configs: Vec<VideoDecoderConfig>,
}

impl NativeVideoDevice for NullVideoDevice {
    fn decoder_profile_count(&self) -> u32 {
        self.profiles.len() as u32
    }

    fn decoder_profile(&self, index: u32) -> NativeResult<Uuid> {
        self.profiles
            .get(index as usize)
            .map(|(guid, _)| *guid)
            .ok_or(DeviceError::InvalidParameters)
    }

    fn check_decoder_format(&self, profile: &Uuid, format: PixelFormat) -> NativeResult<bool> {
        let (_, nv12) = self
            .profiles
            .iter()
            .find(|(guid, _)| guid == profile)
            .ok_or(DeviceError::InvalidParameters)?;
        Ok(*nv12 && format == PixelFormat::NV12)
    }

    fn decoder_config_count(&self, _desc: &VideoDecoderDesc) -> NativeResult<u32> {
        Ok(self.configs.len() as u32)
    }

    fn decoder_config(
        &self,
        _desc: &VideoDecoderDesc,
        index: u32,
    ) -> NativeResult<VideoDecoderConfig> {
        self.configs
            .get(index as usize)
            .copied()
            .ok_or(DeviceError::InvalidParameters)
    }

    fn create_decoder(
        &self,
        desc: &VideoDecoderDesc,
        _config: &VideoDecoderConfig,
    ) -> NativeResult<NativeObject> {
        Ok(NullObject::new_native(NullObjectKind::VideoDecoder(*desc)))
    }

    fn create_decoder_output_view(
        &self,
        texture: &NativeObject,
        profile: &Uuid,
        _array_slice: u32,
    ) -> NativeResult<NativeObject> {
        Ok(NullObject::new_native(NullObjectKind::VideoDecoderOutputView(
            texture.clone(),
            *profile,
        )))
    }
}

pub struct NullDevice {
    feature_level: GraphicsProfile,
    flags: BitFlags<DeviceCreationFlags>,
    context_state: Arc<NullContextState>,
    object: NativeObject,
    created: Mutex<Vec<NativeObject>>,
    failures: Mutex<Vec<NullObjectClass>>,
    removed_reason: Mutex<Option<DeviceRemovedReason>>,
    multithread_protected: AtomicBool,
    live_object_reports: AtomicUsize,
    debug_names: Mutex<Vec<(NativeObject, String)>>,
    video: Option<Arc<NullVideoDevice>>,
}

impl NullDevice {
    pub fn new(feature_level: GraphicsProfile) -> Self {
        Self {
            feature_level,
            flags: BitFlags::empty(),
            context_state: Arc::default(),
            object: NullObject::new_native(NullObjectKind::Device),
            created: Mutex::default(),
            failures: Mutex::default(),
            removed_reason: Mutex::default(),
            multithread_protected: AtomicBool::new(false),
            live_object_reports: AtomicUsize::new(0),
            debug_names: Mutex::default(),
            video: None,
        }
    }

    pub fn context_state(&self) -> &Arc<NullContextState> {
        &self.context_state
    }

    pub fn creation_flags(&self) -> BitFlags<DeviceCreationFlags> {
        self.flags
    }

    /// Make the next creation of `class` fail with `OutOfMemory`
    pub fn fail_next_creation(&self, class: NullObjectClass) {
        self.failures.lock().push(class);
    }

    pub fn set_removed_reason(&self, reason: Option<DeviceRemovedReason>) {
        *self.removed_reason.lock() = reason;
    }

    /// Every object created so far, in creation order
    pub fn created_objects(&self) -> Vec<NativeObject> {
        self.created.lock().clone()
    }

    pub fn created_count(&self, filter: impl Fn(&NullObjectKind) -> bool) -> usize {
        self.created
            .lock()
            .iter()
            .filter(|object| object_kind(object).map(&filter).unwrap_or(false))
            .count()
    }

    pub fn is_multithread_protected(&self) -> bool {
        self.multithread_protected.load(Ordering::SeqCst)
    }

    pub fn live_object_reports(&self) -> usize {
        self.live_object_reports.load(Ordering::SeqCst)
    }

    pub fn debug_name(&self, object: &NativeObject) -> Option<String> {
        self.debug_names
            .lock()
            .iter()
            .rev()
            .find(|(named, _)| named == object)
            .map(|(_, name)| name.clone())
    }

    fn create(&self, kind: NullObjectKind) -> NativeResult<NativeObject> {
        {
            let mut failures = self.failures.lock();
            if let Some(index) = failures.iter().position(|class| *class == kind.class()) {
                failures.remove(index);
                return Err(DeviceError::OutOfMemory);
            }
        }

        let object = NullObject::new_native(kind);
        self.created.lock().push(object.clone());
        Ok(object)
    }

    fn kind_of(object: &NativeObject) -> NativeResult<&NullObjectKind> {
        object_kind(object).ok_or(DeviceError::InvalidParameters)
    }
}

impl NativeDevice for NullDevice {
    fn feature_level(&self) -> GraphicsProfile {
        self.feature_level
    }

    fn threading_support(&self) -> ThreadingSupport {
        ThreadingSupport {
            concurrent_creates: true,
            command_lists: false,
        }
    }

    fn has_compute_shaders(&self) -> bool {
        self.feature_level >= GraphicsProfile::Level10_0
    }

    fn has_double_precision(&self) -> bool {
        self.feature_level >= GraphicsProfile::Level11_0
    }

    fn format_support(&self, format: PixelFormat) -> NativeResult<u32> {
        match format {
            PixelFormat::Unknown => Err(DeviceError::InvalidParameters),
            _ => Ok(0x1 | 0x20),
        }
    }

    fn multisample_quality_levels(&self, format: PixelFormat, sample_count: u32) -> u32 {
        if format.is_compressed() || format == PixelFormat::NV12 || sample_count > 4 {
            0
        } else {
            1
        }
    }

    fn create_buffer(
        &self,
        desc: &NativeBufferDesc,
        initial_data: Option<&[u8]>,
    ) -> NativeResult<NativeObject> {
        if desc.byte_width == 0 {
            return Err(DeviceError::InvalidParameters);
        }
        if desc.usage == GraphicsResourceUsage::Immutable && initial_data.is_none() {
            return Err(DeviceError::InvalidParameters);
        }
        self.create(NullObjectKind::Buffer(*desc))
    }

    fn create_texture(
        &self,
        desc: &NativeTextureDesc,
        _initial_data: &[SubresourceData],
    ) -> NativeResult<NativeObject> {
        if desc.width == 0 || desc.height == 0 || desc.depth_or_array_size == 0 {
            return Err(DeviceError::InvalidParameters);
        }
        self.create(NullObjectKind::Texture(*desc))
    }

    fn texture_desc(&self, texture: &NativeObject) -> NativeResult<NativeTextureDesc> {
        match Self::kind_of(texture)? {
            NullObjectKind::Texture(desc) => Ok(*desc),
            _ => Err(DeviceError::InvalidParameters),
        }
    }

    fn view_resource(&self, view: &NativeObject) -> NativeResult<NativeObject> {
        match Self::kind_of(view)? {
            NullObjectKind::ShaderResourceView(resource, _)
            | NullObjectKind::RenderTargetView(resource, _)
            | NullObjectKind::UnorderedAccessView(resource, _)
            | NullObjectKind::DepthStencilView(resource, _) => Ok(resource.clone()),
            _ => Err(DeviceError::InvalidParameters),
        }
    }

    fn create_shader_resource_view(
        &self,
        resource: &NativeObject,
        desc: &ShaderResourceViewDesc,
    ) -> NativeResult<NativeObject> {
        self.create(NullObjectKind::ShaderResourceView(resource.clone(), *desc))
    }

    fn create_render_target_view(
        &self,
        resource: &NativeObject,
        desc: &RenderTargetViewDesc,
    ) -> NativeResult<NativeObject> {
        self.create(NullObjectKind::RenderTargetView(resource.clone(), *desc))
    }

    fn create_unordered_access_view(
        &self,
        resource: &NativeObject,
        desc: &UnorderedAccessViewDesc,
    ) -> NativeResult<NativeObject> {
        self.create(NullObjectKind::UnorderedAccessView(resource.clone(), *desc))
    }

    fn create_depth_stencil_view(
        &self,
        resource: &NativeObject,
        desc: &DepthStencilViewDesc,
    ) -> NativeResult<NativeObject> {
        self.create(NullObjectKind::DepthStencilView(resource.clone(), *desc))
    }

    fn create_shader(&self, stage: ShaderStage, bytecode: &[u8]) -> NativeResult<NativeObject> {
        if bytecode.is_empty() || stage == ShaderStage::None {
            return Err(DeviceError::InvalidParameters);
        }
        self.create(NullObjectKind::Shader(stage))
    }

    fn create_geometry_shader_with_stream_output(
        &self,
        bytecode: &[u8],
        stream_output: &StreamOutputDesc,
    ) -> NativeResult<NativeObject> {
        if bytecode.is_empty() {
            return Err(DeviceError::InvalidParameters);
        }
        self.create(NullObjectKind::StreamOutputGeometryShader(
            stream_output.clone(),
        ))
    }

    fn create_input_layout(
        &self,
        elements: &[InputElementDesc],
        signature: &[u8],
    ) -> NativeResult<NativeObject> {
        if signature.is_empty() {
            return Err(DeviceError::InvalidParameters);
        }
        self.create(NullObjectKind::InputLayout(elements.to_vec()))
    }

    fn create_blend_state(&self, desc: &BlendStateDesc) -> NativeResult<NativeObject> {
        self.create(NullObjectKind::BlendState(*desc))
    }

    fn create_rasterizer_state(&self, desc: &RasterizerStateDesc) -> NativeResult<NativeObject> {
        self.create(NullObjectKind::RasterizerState(*desc))
    }

    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilStateDesc,
    ) -> NativeResult<NativeObject> {
        self.create(NullObjectKind::DepthStencilState(*desc))
    }

    fn create_sampler_state(&self, desc: &SamplerStateDesc) -> NativeResult<NativeObject> {
        self.create(NullObjectKind::SamplerState(*desc))
    }

    fn create_query(&self, kind: NativeQueryKind) -> NativeResult<NativeObject> {
        self.create(NullObjectKind::Query(kind))
    }

    fn device_removed_reason(&self) -> Option<DeviceRemovedReason> {
        *self.removed_reason.lock()
    }

    fn report_live_objects(&self) {
        self.live_object_reports.fetch_add(1, Ordering::SeqCst);
    }

    fn set_multithread_protected(&self, enabled: bool) {
        self.multithread_protected.store(enabled, Ordering::SeqCst);
    }

    fn set_debug_name(&self, object: &NativeObject, name: &str) {
        self.debug_names
            .lock()
            .push((object.clone(), name.to_string()));
    }

    fn shared_handle(&self, texture: &NativeObject) -> NativeResult<usize> {
        object_id(texture)
            .map(|id| id as usize)
            .ok_or(DeviceError::InvalidParameters)
    }

    fn create_shared_nt_handle(&self, texture: &NativeObject, name: &str) -> NativeResult<usize> {
        if name.is_empty() {
            return Err(DeviceError::InvalidParameters);
        }
        self.shared_handle(texture).map(|handle| handle | 0x8000_0000)
    }

    fn video_device(&self) -> NativeResult<Arc<dyn NativeVideoDevice>> {
        match &self.video {
            Some(video) => Ok(video.clone()),
            None => Err(DeviceError::Unsupported),
        }
    }

    fn as_native_object(&self) -> NativeObject {
        self.object.clone()
    }
}

pub struct NullOutput {
    pub desc: OutputDesc,
    pub modes: Vec<NativeModeDesc>,
    /// Returned by `display_mode_list` instead of the modes when set
    pub mode_list_error: Option<DeviceError>,
    object: NativeObject,
}

impl NullOutput {
    pub fn new(name: &str, desktop_coordinates: RectI32, modes: Vec<NativeModeDesc>) -> Self {
        Self {
            desc: OutputDesc {
                device_name: name.to_string(),
                desktop_coordinates,
                attached_to_desktop: true,
            },
            modes,
            mode_list_error: None,
            object: NullObject::new_native(NullObjectKind::Output),
        }
    }
}

impl NativeOutput for NullOutput {
    fn desc(&self) -> NativeResult<OutputDesc> {
        Ok(self.desc.clone())
    }

    fn display_mode_list(&self, format: PixelFormat) -> NativeResult<Vec<NativeModeDesc>> {
        if let Some(error) = self.mode_list_error {
            return Err(error);
        }
        Ok(self
            .modes
            .iter()
            .filter(|mode| mode.format == format)
            .copied()
            .collect())
    }

    fn find_closest_matching_mode(
        &self,
        mode: &NativeModeDesc,
        _device: Option<&dyn NativeDevice>,
    ) -> NativeResult<NativeModeDesc> {
        self.modes
            .iter()
            .filter(|candidate| {
                mode.format == PixelFormat::Unknown || candidate.format == mode.format
            })
            .min_by_key(|candidate| {
                (candidate.width as i64 - mode.width as i64).abs()
                    + (candidate.height as i64 - mode.height as i64).abs()
            })
            .copied()
            .ok_or(DeviceError::NotFound)
    }

    fn as_native_object(&self) -> NativeObject {
        self.object.clone()
    }
}

pub struct NullAdapter {
    pub desc: AdapterDesc,
    pub max_feature_level: GraphicsProfile,
    pub outputs: Vec<Arc<NullOutput>>,
    pub video: Option<Arc<NullVideoDevice>>,
    devices: Mutex<Vec<Arc<NullDevice>>>,
    creation_attempts: Mutex<Vec<Vec<GraphicsProfile>>>,
    checks: AtomicUsize,
}

impl NullAdapter {
    pub fn new(description: &str, vendor_id: u32, max_feature_level: GraphicsProfile) -> Self {
        Self {
            desc: AdapterDesc {
                description: description.to_string(),
                vendor_id,
                device_id: 0,
                dedicated_video_memory: 256 * 1024 * 1024,
                luid: (0, 0x1234),
            },
            max_feature_level,
            outputs: vec![],
            video: None,
            devices: Mutex::default(),
            creation_attempts: Mutex::default(),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn with_output(mut self, output: NullOutput) -> Self {
        self.outputs.push(Arc::new(output));
        self
    }

    pub fn with_video(mut self, video: NullVideoDevice) -> Self {
        self.video = Some(Arc::new(video));
        self
    }

    pub fn last_device(&self) -> Option<Arc<NullDevice>> {
        self.devices.lock().last().cloned()
    }

    /// Level lists passed to `create_device`, in call order
    pub fn creation_attempts(&self) -> Vec<Vec<GraphicsProfile>> {
        self.creation_attempts.lock().clone()
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl NativeAdapter for NullAdapter {
    fn desc(&self) -> AdapterDesc {
        self.desc.clone()
    }

    fn enum_outputs(&self) -> NativeResult<Vec<Arc<dyn NativeOutput>>> {
        Ok(self
            .outputs
            .iter()
            .map(|output| output.clone() as Arc<dyn NativeOutput>)
            .collect())
    }

    fn create_device(
        &self,
        levels: &[GraphicsProfile],
        flags: BitFlags<DeviceCreationFlags>,
    ) -> NativeResult<NativeDeviceHandles> {
        self.creation_attempts.lock().push(levels.to_vec());

        let level = levels
            .iter()
            .copied()
            .find(|level| *level <= self.max_feature_level)
            .ok_or(DeviceError::Unsupported)?;

        let mut device = NullDevice::new(level);
        device.flags = flags;
        device.video = self.video.clone();
        let device = Arc::new(device);
        self.devices.lock().push(device.clone());

        Ok(NativeDeviceHandles {
            immediate_context: Box::new(NullContext::new(device.context_state.clone())),
            device,
        })
    }

    fn is_feature_level_supported(&self, level: GraphicsProfile) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        level <= self.max_feature_level
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SwapChainCommand {
    Present(u32),
    ResizeBuffers {
        buffer_count: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        flags: BitFlags<SwapChainFlags>,
    },
    ResizeTarget(NativeModeDesc),
    SetFullscreenState(bool, Option<NativeObject>),
}

pub struct NullSwapChainState {
    desc: Mutex<SwapChainDesc>,
    fullscreen: AtomicBool,
    fullscreen_output: Mutex<Option<NativeObject>>,
    back_buffer: Mutex<NativeObject>,
    commands: Mutex<Vec<SwapChainCommand>>,
    present_error: Mutex<Option<DeviceError>>,
    resize_error: Mutex<Option<DeviceError>>,
}

impl NullSwapChainState {
    fn back_buffer_for(desc: &SwapChainDesc) -> NativeObject {
        NullObject::new_native(NullObjectKind::Texture(NativeTextureDesc {
            dimension: NativeTextureDimension::Texture2D,
            width: desc.mode.width,
            height: desc.mode.height,
            depth_or_array_size: 1,
            mip_levels: 1,
            format: desc.mode.format,
            sample_desc: desc.sample_desc,
            usage: GraphicsResourceUsage::Default,
            bind_flags: BindFlags::RenderTarget | BindFlags::ShaderResource,
            cpu_access_flags: BitFlags::empty(),
            misc_flags: BitFlags::empty(),
        }))
    }

    pub fn desc(&self) -> SwapChainDesc {
        *self.desc.lock()
    }

    pub fn commands(&self) -> Vec<SwapChainCommand> {
        self.commands.lock().clone()
    }

    pub fn set_present_error(&self, error: Option<DeviceError>) {
        *self.present_error.lock() = error;
    }

    pub fn set_resize_error(&self, error: Option<DeviceError>) {
        *self.resize_error.lock() = error;
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }
}

pub struct NullSwapChain {
    state: Arc<NullSwapChainState>,
}

impl NativeSwapChain for NullSwapChain {
    fn desc(&self) -> NativeResult<SwapChainDesc> {
        Ok(self.state.desc())
    }

    fn buffer(&self, index: u32) -> NativeResult<NativeObject> {
        if index != 0 {
            return Err(DeviceError::InvalidParameters);
        }
        Ok(self.state.back_buffer.lock().clone())
    }

    fn present(&mut self, sync_interval: u32) -> NativeResult<()> {
        self.state
            .commands
            .lock()
            .push(SwapChainCommand::Present(sync_interval));
        match *self.state.present_error.lock() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn resize_buffers(
        &mut self,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        flags: BitFlags<SwapChainFlags>,
    ) -> NativeResult<()> {
        self.state.commands.lock().push(SwapChainCommand::ResizeBuffers {
            buffer_count,
            width,
            height,
            format,
            flags,
        });
        if let Some(error) = *self.state.resize_error.lock() {
            return Err(error);
        }

        let mut desc = self.state.desc.lock();
        desc.mode.width = width;
        desc.mode.height = height;
        if format != PixelFormat::Unknown {
            desc.mode.format = format;
        }
        desc.flags = flags;
        *self.state.back_buffer.lock() = NullSwapChainState::back_buffer_for(&desc);
        Ok(())
    }

    fn resize_target(&mut self, mode: &NativeModeDesc) -> NativeResult<()> {
        self.state
            .commands
            .lock()
            .push(SwapChainCommand::ResizeTarget(*mode));
        Ok(())
    }

    fn set_fullscreen_state(
        &mut self,
        fullscreen: bool,
        output: Option<&NativeObject>,
    ) -> NativeResult<()> {
        self.state
            .commands
            .lock()
            .push(SwapChainCommand::SetFullscreenState(fullscreen, output.cloned()));
        self.state.fullscreen.store(fullscreen, Ordering::SeqCst);
        *self.state.fullscreen_output.lock() = output.filter(|_| fullscreen).cloned();
        Ok(())
    }

    fn fullscreen_state(&self) -> NativeResult<bool> {
        Ok(self.state.is_fullscreen())
    }

    fn fullscreen_output(&self) -> NativeResult<Option<NativeObject>> {
        Ok(self.state.fullscreen_output.lock().clone())
    }
}

pub struct NullFactory {
    pub adapters: Vec<Arc<NullAdapter>>,
    pub graphics_debugger_attached: bool,
    swap_chains: Mutex<Vec<Arc<NullSwapChainState>>>,
    window_associations: Mutex<Vec<BitFlags<WindowAssociationFlags>>>,
}

impl NullFactory {
    pub fn new(adapters: Vec<Arc<NullAdapter>>) -> Self {
        Self {
            adapters,
            graphics_debugger_attached: false,
            swap_chains: Mutex::default(),
            window_associations: Mutex::default(),
        }
    }

    /// A factory with one 11_1 adapter and one 1920x1080 output
    pub fn with_default_adapter() -> (Arc<Self>, Arc<NullAdapter>) {
        let mut modes = vec![];
        for format in [PixelFormat::R8G8B8A8Unorm, PixelFormat::B8G8R8A8Unorm] {
            for (width, height) in [(1280, 720), (1920, 1080)] {
                modes.push(NativeModeDesc {
                    width,
                    height,
                    refresh_rate: Rational::new(60, 1),
                    format,
                    scanline_ordering: ScanlineOrdering::Progressive,
                    scaling: ModeScaling::Unspecified,
                });
            }
        }

        let adapter = Arc::new(
            NullAdapter::new("Null Adapter", 0x10de, GraphicsProfile::Level11_1).with_output(
                NullOutput::new("\\\\.\\DISPLAY1", RectI32::new(0, 0, 1920, 1080), modes),
            ),
        );
        (Arc::new(Self::new(vec![adapter.clone()])), adapter)
    }

    pub fn swap_chains(&self) -> Vec<Arc<NullSwapChainState>> {
        self.swap_chains.lock().clone()
    }

    pub fn window_associations(&self) -> Vec<BitFlags<WindowAssociationFlags>> {
        self.window_associations.lock().clone()
    }
}

impl NativeFactory for NullFactory {
    fn enum_adapters(&self) -> NativeResult<Vec<Arc<dyn NativeAdapter>>> {
        Ok(self
            .adapters
            .iter()
            .map(|adapter| adapter.clone() as Arc<dyn NativeAdapter>)
            .collect())
    }

    fn is_graphics_debugger_attached(&self) -> bool {
        self.graphics_debugger_attached
    }

    fn create_swap_chain(
        &self,
        _device: &dyn NativeDevice,
        _window: RawWindowHandle,
        desc: &SwapChainDesc,
    ) -> NativeResult<Box<dyn NativeSwapChain>> {
        let state = Arc::new(NullSwapChainState {
            desc: Mutex::new(*desc),
            fullscreen: AtomicBool::new(!desc.windowed),
            fullscreen_output: Mutex::default(),
            back_buffer: Mutex::new(NullSwapChainState::back_buffer_for(desc)),
            commands: Mutex::default(),
            present_error: Mutex::default(),
            resize_error: Mutex::default(),
        });
        self.swap_chains.lock().push(state.clone());
        Ok(Box::new(NullSwapChain { state }))
    }

    fn make_window_association(
        &self,
        _window: RawWindowHandle,
        flags: BitFlags<WindowAssociationFlags>,
    ) -> NativeResult<()> {
        self.window_associations.lock().push(flags);
        Ok(())
    }
}
