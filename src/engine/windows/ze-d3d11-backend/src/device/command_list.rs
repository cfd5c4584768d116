use crate::device::buffer::Buffer;
use crate::device::pipeline_state::PipelineState;
use crate::device::query_pool::QueryPool;
use crate::device::resource::GraphicsResource;
use crate::device::sampler::SamplerState;
use crate::device::texture::Texture;
use crate::device::GraphicsDevice;
use crate::native::desc::MappedSubresource;
use crate::native::NativeObject;
use enumflags2::BitFlags;
use std::sync::Arc;
use tinyvec::ArrayVec;
use ze_core::maths::RectI32;
use ze_gfx::backend::DeviceError;
use ze_gfx::pipeline::{ShaderStage, MAX_RENDER_TARGET_COUNT, SHADER_STAGE_COUNT};
use ze_gfx::resource::{DepthStencilClearOptions, MapMode, ResourceRegion, Viewport};
use ze_gfx::PixelFormat;

pub const MAX_CONSTANT_BUFFER_COUNT: usize = 14;
pub const MAX_SAMPLER_COUNT: usize = 16;
pub const MAX_SHADER_RESOURCE_VIEW_COUNT: usize = 128;
pub const MAX_UNORDERED_ACCESS_VIEW_COUNT: usize = 8;
pub const MAX_STREAM_OUTPUT_TARGET_COUNT: usize = 4;

/// UAV initial count keeping the current hidden counter
pub const KEEP_UAV_COUNTER: u32 = u32::MAX;

const ANNOTATIONS_ENABLED: bool = cfg!(any(debug_assertions, feature = "annotations"));

/// A mapped subresource, to give back to `CommandList::unmap_subresource`
#[derive(Debug)]
pub struct MappedResource {
    resource: NativeObject,
    subresource: u32,
    pub data: MappedSubresource,
    pub offset_in_bytes: usize,
    pub length_in_bytes: usize,
}

/// Records commands on the immediate context, skipping redundant state changes
pub struct CommandList {
    device: Arc<GraphicsDevice>,
    default_pipeline_state: Arc<PipelineState>,
    current_pipeline_state: Arc<PipelineState>,
    constant_buffers: [[Option<NativeObject>; MAX_CONSTANT_BUFFER_COUNT]; SHADER_STAGE_COUNT],
    samplers: [[Option<NativeObject>; MAX_SAMPLER_COUNT]; SHADER_STAGE_COUNT],
    cs_unordered_access_views: [Option<NativeObject>; MAX_UNORDERED_ACCESS_VIEW_COUNT],
    om_unordered_access_views: [Option<NativeObject>; MAX_UNORDERED_ACCESS_VIEW_COUNT],
    render_targets: ArrayVec<[Option<NativeObject>; MAX_RENDER_TARGET_COUNT]>,
    depth_stencil: Option<NativeObject>,
    viewports: [Viewport; MAX_RENDER_TARGET_COUNT],
    viewports_dirty: bool,
}

impl CommandList {
    pub(crate) fn new(device: Arc<GraphicsDevice>) -> Result<Self, DeviceError> {
        let default_pipeline_state = Arc::new(PipelineState::new(
            &device,
            device.default_pipeline_state_desc(),
        )?);

        Ok(Self {
            device,
            current_pipeline_state: default_pipeline_state.clone(),
            default_pipeline_state,
            constant_buffers: Default::default(),
            samplers: Default::default(),
            cs_unordered_access_views: Default::default(),
            om_unordered_access_views: Default::default(),
            render_targets: ArrayVec::new(),
            depth_stencil: None,
            viewports: Default::default(),
            viewports_dirty: false,
        })
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    pub fn render_target_count(&self) -> usize {
        self.render_targets.len()
    }

    /// Flush the commands recorded so far to the GPU
    pub fn flush(&mut self) {
        self.device.context().flush();
    }

    /// Reset the native state and forget every binding
    pub fn clear_state(&mut self) {
        self.device.context().clear_state();

        self.constant_buffers = Default::default();
        self.samplers = Default::default();
        self.cs_unordered_access_views = Default::default();
        self.om_unordered_access_views = Default::default();
        self.render_targets.clear();
        self.depth_stencil = None;

        // Nothing can be drawn before another pipeline state is set
        self.current_pipeline_state = self.default_pipeline_state.clone();
    }

    /// `None` binds the device default state
    pub fn set_pipeline_state(&mut self, pipeline_state: Option<&Arc<PipelineState>>) {
        let pipeline_state = pipeline_state.unwrap_or(&self.default_pipeline_state);
        if Arc::ptr_eq(pipeline_state, &self.current_pipeline_state) {
            return;
        }

        pipeline_state.apply(
            &mut **self.device.context(),
            Some(&self.current_pipeline_state),
        );
        self.current_pipeline_state = pipeline_state.clone();
    }

    pub fn set_constant_buffer(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        buffer: Option<&Buffer>,
    ) -> Result<(), DeviceError> {
        let stage_index = stage.index().ok_or(DeviceError::InvalidParameters)?;
        let shadow = self.constant_buffers[stage_index]
            .get_mut(slot)
            .ok_or(DeviceError::InvalidParameters)?;

        let native = buffer.map(|buffer| buffer.native_buffer().clone());
        if *shadow != native {
            *shadow = native;
            self.device
                .context()
                .set_constant_buffer(stage, slot as u32, shadow.as_ref());
        }
        Ok(())
    }

    pub fn set_sampler_state(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        sampler: Option<&SamplerState>,
    ) -> Result<(), DeviceError> {
        let stage_index = stage.index().ok_or(DeviceError::InvalidParameters)?;
        let shadow = self.samplers[stage_index]
            .get_mut(slot)
            .ok_or(DeviceError::InvalidParameters)?;

        let native = sampler.map(|sampler| sampler.native_sampler().clone());
        if *shadow != native {
            *shadow = native;
            self.device
                .context()
                .set_sampler(stage, slot as u32, shadow.as_ref());
        }
        Ok(())
    }

    /// Shader resources are not tracked, the call always reaches the context
    pub fn set_shader_resource_view(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        resource: Option<&dyn GraphicsResource>,
    ) -> Result<(), DeviceError> {
        if stage == ShaderStage::None || slot >= MAX_SHADER_RESOURCE_VIEW_COUNT {
            return Err(DeviceError::InvalidParameters);
        }

        self.device.context().set_shader_resource(
            stage,
            slot as u32,
            resource.and_then(|resource| resource.native_shader_resource_view()),
        );
        Ok(())
    }

    /// Bind an unordered access view for the compute or pixel stage.
    /// `initial_count` sets the hidden counter of append and counter buffers,
    /// `KEEP_UAV_COUNTER` keeps it.
    pub fn set_unordered_access_view(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        resource: Option<&dyn GraphicsResource>,
        initial_count: u32,
    ) -> Result<(), DeviceError> {
        if slot >= MAX_UNORDERED_ACCESS_VIEW_COUNT {
            return Err(DeviceError::InvalidParameters);
        }

        let view = resource.and_then(|resource| resource.native_unordered_access_view().cloned());
        match stage {
            ShaderStage::Compute => {
                if self.cs_unordered_access_views[slot] != view {
                    self.device.context().cs_set_unordered_access_view(
                        slot as u32,
                        view.as_ref(),
                        initial_count,
                    );
                    self.cs_unordered_access_views[slot] = view;
                }
                Ok(())
            }
            ShaderStage::Pixel => {
                if self.om_unordered_access_views[slot] != view {
                    self.om_set_single_unordered_access_view(slot, view, initial_count)?;
                }
                Ok(())
            }
            _ => Err(DeviceError::InvalidParameters),
        }
    }

    /// Pixel stage UAVs share their slots with the render targets and start after them
    fn om_set_single_unordered_access_view(
        &mut self,
        slot: usize,
        view: Option<NativeObject>,
        initial_count: u32,
    ) -> Result<(), DeviceError> {
        if slot < self.render_targets.len() {
            return Err(DeviceError::InvalidParameters);
        }

        self.om_bind_unordered_access_view(slot, view, initial_count);
        Ok(())
    }

    /// `slot` must not be below the render target count
    fn om_bind_unordered_access_view(
        &mut self,
        slot: usize,
        view: Option<NativeObject>,
        initial_count: u32,
    ) {
        let first_slot = self.render_targets.len();
        self.om_unordered_access_views[slot] = view;

        let views = &self.om_unordered_access_views[first_slot..];
        let mut initial_counts = vec![KEEP_UAV_COUNTER; views.len()];
        initial_counts[slot - first_slot] = initial_count;

        self.device
            .context()
            .om_set_render_targets_and_unordered_access_views(
                self.render_targets.as_slice(),
                self.depth_stencil.as_ref(),
                first_slot as u32,
                views,
                &initial_counts,
            );
    }

    /// Unbind `resource` from every UAV slot it occupies
    pub fn unset_unordered_access_view(&mut self, resource: &dyn GraphicsResource) {
        let Some(view) = resource.native_unordered_access_view().cloned() else {
            return;
        };

        for slot in 0..MAX_UNORDERED_ACCESS_VIEW_COUNT {
            if self.cs_unordered_access_views[slot].as_ref() == Some(&view) {
                self.cs_unordered_access_views[slot] = None;
                self.device
                    .context()
                    .cs_set_unordered_access_view(slot as u32, None, KEEP_UAV_COUNTER);
            }
        }

        let first_slot = self.render_targets.len();
        for slot in 0..MAX_UNORDERED_ACCESS_VIEW_COUNT {
            if self.om_unordered_access_views[slot].as_ref() != Some(&view) {
                continue;
            }

            if slot < first_slot {
                // A render target bound since then owns the slot
                self.om_unordered_access_views[slot] = None;
            } else {
                self.om_bind_unordered_access_view(slot, None, KEEP_UAV_COUNTER);
            }
        }
    }

    /// Unbind every render target, depth-stencil buffer and pixel stage UAV
    pub fn reset_targets(&mut self) {
        self.render_targets.clear();
        self.depth_stencil = None;
        self.om_unordered_access_views = Default::default();
        self.device.context().om_set_render_targets(&[], None);
    }

    pub fn set_render_targets(
        &mut self,
        depth_stencil: Option<&Texture>,
        render_targets: &[&Texture],
    ) -> Result<(), DeviceError> {
        if render_targets.len() > MAX_RENDER_TARGET_COUNT {
            return Err(DeviceError::InvalidParameters);
        }

        let depth_stencil = match depth_stencil {
            Some(texture) => Some(
                texture
                    .native_depth_stencil_view()
                    .ok_or(DeviceError::InvalidParameters)?
                    .clone(),
            ),
            None => None,
        };

        let mut views = ArrayVec::new();
        for texture in render_targets {
            views.push(Some(
                texture
                    .native_render_target_view()
                    .ok_or(DeviceError::InvalidParameters)?
                    .clone(),
            ));
        }

        self.render_targets = views;
        self.depth_stencil = depth_stencil;
        self.device
            .context()
            .om_set_render_targets(self.render_targets.as_slice(), self.depth_stencil.as_ref());
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewports[0] = viewport;
        self.viewports_dirty = true;
    }

    pub fn set_viewports(&mut self, viewports: &[Viewport]) -> Result<(), DeviceError> {
        if viewports.len() > MAX_RENDER_TARGET_COUNT {
            return Err(DeviceError::InvalidParameters);
        }

        self.viewports[..viewports.len()].copy_from_slice(viewports);
        self.viewports_dirty = true;
        Ok(())
    }

    pub fn set_scissor_rectangle(&mut self, rectangle: RectI32) {
        self.device.context().rs_set_scissor_rects(&[rectangle]);
    }

    pub fn set_scissor_rectangles(&mut self, rectangles: &[RectI32]) {
        self.device.context().rs_set_scissor_rects(rectangles);
    }

    fn prepare_draw(&mut self) {
        if !self.viewports_dirty {
            return;
        }

        self.viewports_dirty = false;
        let count = self.render_targets.len().max(1);
        self.device
            .context()
            .rs_set_viewports(&self.viewports[..count]);
    }

    pub fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        self.prepare_draw();
        self.device.context().draw(vertex_count, start_vertex);
        self.device.count_draw(vertex_count as u64);
    }

    pub fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.prepare_draw();
        self.device
            .context()
            .draw_indexed(index_count, start_index, base_vertex);
        self.device.count_draw(index_count as u64);
    }

    pub fn draw_instanced(
        &mut self,
        vertex_count_per_instance: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) {
        self.prepare_draw();
        self.device.context().draw_instanced(
            vertex_count_per_instance,
            instance_count,
            start_vertex,
            start_instance,
        );
        self.device
            .count_draw(vertex_count_per_instance as u64 * instance_count as u64);
    }

    pub fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.prepare_draw();
        self.device.context().draw_indexed_instanced(
            index_count_per_instance,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        );
        self.device
            .count_draw(index_count_per_instance as u64 * instance_count as u64);
    }

    /// Arguments are read on the GPU, the triangle counter can't account for them
    pub fn draw_instanced_indirect(&mut self, arguments: &Buffer, aligned_byte_offset: u32) {
        self.prepare_draw();
        self.device
            .context()
            .draw_instanced_indirect(arguments.native_buffer(), aligned_byte_offset);
        self.device.count_draw(0);
    }

    pub fn draw_indexed_instanced_indirect(&mut self, arguments: &Buffer, aligned_byte_offset: u32) {
        self.prepare_draw();
        self.device
            .context()
            .draw_indexed_instanced_indirect(arguments.native_buffer(), aligned_byte_offset);
        self.device.count_draw(0);
    }

    /// Draw what the previous stream output pass wrote
    pub fn draw_auto(&mut self) {
        self.prepare_draw();
        self.device.context().draw_auto();
        self.device.count_draw(0);
    }

    pub fn dispatch(&mut self, thread_group_count_x: u32, thread_group_count_y: u32, thread_group_count_z: u32) {
        self.prepare_draw();
        self.device.context().dispatch(
            thread_group_count_x,
            thread_group_count_y,
            thread_group_count_z,
        );
    }

    pub fn dispatch_indirect(&mut self, arguments: &Buffer, aligned_byte_offset: u32) {
        self.prepare_draw();
        self.device
            .context()
            .dispatch_indirect(arguments.native_buffer(), aligned_byte_offset);
    }

    pub fn clear_depth_stencil(
        &mut self,
        depth_stencil: &Texture,
        options: BitFlags<DepthStencilClearOptions>,
        depth: f32,
        stencil: u8,
    ) -> Result<(), DeviceError> {
        let view = depth_stencil
            .native_depth_stencil_view()
            .ok_or(DeviceError::InvalidParameters)?;

        if options.contains(DepthStencilClearOptions::Stencil) && !depth_stencil.has_stencil() {
            return Err(DeviceError::InvalidOperation);
        }

        self.device
            .context()
            .clear_depth_stencil_view(view, options, depth, stencil);
        Ok(())
    }

    pub fn clear_render_target(
        &mut self,
        render_target: &Texture,
        color: [f32; 4],
    ) -> Result<(), DeviceError> {
        let view = render_target
            .native_render_target_view()
            .ok_or(DeviceError::InvalidParameters)?;
        self.device.context().clear_render_target_view(view, color);
        Ok(())
    }

    pub fn clear_read_write_float(
        &mut self,
        resource: &dyn GraphicsResource,
        value: [f32; 4],
    ) -> Result<(), DeviceError> {
        let view = resource
            .native_unordered_access_view()
            .ok_or(DeviceError::InvalidParameters)?;
        self.device
            .context()
            .clear_unordered_access_view_float(view, value);
        Ok(())
    }

    pub fn clear_read_write_uint(
        &mut self,
        resource: &dyn GraphicsResource,
        value: [u32; 4],
    ) -> Result<(), DeviceError> {
        let view = resource
            .native_unordered_access_view()
            .ok_or(DeviceError::InvalidParameters)?;
        self.device
            .context()
            .clear_unordered_access_view_uint(view, value);
        Ok(())
    }

    pub fn copy(&mut self, source: &dyn GraphicsResource, destination: &dyn GraphicsResource) {
        self.device
            .context()
            .copy_resource(destination.native_resource(), source.native_resource());
    }

    /// Resolve a multisampled texture. `PixelFormat::Unknown` resolves with the destination format.
    pub fn copy_multisample(
        &mut self,
        source: &Texture,
        source_subresource: u32,
        destination: &Texture,
        destination_subresource: u32,
        format: PixelFormat,
    ) -> Result<(), DeviceError> {
        if !source.desc().is_multisampled() {
            return Err(DeviceError::InvalidParameters);
        }

        let format = match format {
            PixelFormat::Unknown => destination.desc().format,
            format => format,
        };

        self.device.context().resolve_subresource(
            destination.native_texture(),
            destination_subresource,
            source.native_texture(),
            source_subresource,
            format,
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn copy_region(
        &mut self,
        source: &dyn GraphicsResource,
        source_subresource: u32,
        source_region: Option<&ResourceRegion>,
        destination: &dyn GraphicsResource,
        destination_subresource: u32,
        x: u32,
        y: u32,
        z: u32,
    ) {
        self.device.context().copy_subresource_region(
            destination.native_resource(),
            destination_subresource,
            x,
            y,
            z,
            source.native_resource(),
            source_subresource,
            source_region,
        );
    }

    /// Copy the hidden counter of `source` into `destination` at `offset_in_bytes`
    pub fn copy_count(
        &mut self,
        source: &Buffer,
        destination: &Buffer,
        offset_in_bytes: u32,
    ) -> Result<(), DeviceError> {
        let view = source
            .native_unordered_access_view()
            .ok_or(DeviceError::InvalidParameters)?;
        self.device
            .context()
            .copy_structure_count(destination.native_buffer(), offset_in_bytes, view);
        Ok(())
    }

    pub fn update_subresource(
        &mut self,
        resource: &dyn GraphicsResource,
        subresource: u32,
        data: &[u8],
        row_pitch: u32,
        depth_pitch: u32,
        region: Option<&ResourceRegion>,
    ) {
        self.device.context().update_subresource(
            resource.native_resource(),
            subresource,
            region,
            data,
            row_pitch,
            depth_pitch,
        );
    }

    /// Map a subresource. With `do_not_wait`, a resource still in use by the GPU
    /// gives `DeviceError::StillDrawing`.
    pub fn map_subresource(
        &mut self,
        resource: &dyn GraphicsResource,
        subresource: u32,
        mode: MapMode,
        do_not_wait: bool,
        offset_in_bytes: usize,
        length_in_bytes: usize,
    ) -> Result<MappedResource, DeviceError> {
        // Recycled resource, rename it to avoid waiting on the GPU
        let mode = if mode == MapMode::WriteNoOverwrite && resource.discard_next_map() {
            resource.set_discard_next_map(false);
            MapMode::WriteDiscard
        } else {
            mode
        };

        let mut data =
            self.device
                .context()
                .map(resource.native_resource(), subresource, mode, do_not_wait)?;
        data.data = data.data.wrapping_add(offset_in_bytes);

        Ok(MappedResource {
            resource: resource.native_resource().clone(),
            subresource,
            data,
            offset_in_bytes,
            length_in_bytes,
        })
    }

    pub fn unmap_subresource(&mut self, mapped: MappedResource) {
        self.device
            .context()
            .unmap(&mapped.resource, mapped.subresource);
    }

    /// Keeps the current depth-stencil state
    pub fn set_stencil_reference(&mut self, stencil_reference: u32) {
        let mut context = self.device.context();
        let (state, _) = context.om_get_depth_stencil_state();
        context.om_set_depth_stencil_state(state.as_ref(), stencil_reference);
    }

    /// Keeps the current blend state and sample mask
    pub fn set_blend_factor(&mut self, blend_factor: [f32; 4]) {
        let mut context = self.device.context();
        let (state, _, sample_mask) = context.om_get_blend_state();
        context.om_set_blend_state(state.as_ref(), blend_factor, sample_mask);
    }

    pub fn set_vertex_buffer(&mut self, index: u32, buffer: Option<&Buffer>, offset: u32, stride: u32) {
        self.device.context().ia_set_vertex_buffer(
            index,
            buffer.map(|buffer| buffer.native_buffer()),
            stride,
            offset,
        );
    }

    pub fn set_index_buffer(&mut self, buffer: Option<&Buffer>, offset: u32, is_32_bits: bool) {
        let format = if is_32_bits {
            PixelFormat::R32Uint
        } else {
            PixelFormat::R16Uint
        };
        self.device.context().ia_set_index_buffer(
            buffer.map(|buffer| buffer.native_buffer()),
            format,
            offset,
        );
    }

    /// Bind stream output targets, each written from its start. An empty list unbinds them.
    pub fn set_stream_targets(&mut self, buffers: &[&Buffer]) -> Result<(), DeviceError> {
        if buffers.len() > MAX_STREAM_OUTPUT_TARGET_COUNT {
            return Err(DeviceError::InvalidParameters);
        }

        let targets: Vec<_> = buffers
            .iter()
            .map(|buffer| Some(buffer.native_buffer().clone()))
            .collect();
        let offsets = vec![0; targets.len()];
        self.device.context().so_set_targets(&targets, &offsets);
        Ok(())
    }

    pub fn begin_profile(&mut self, name: &str) {
        if ANNOTATIONS_ENABLED {
            self.device.context().begin_event(name);
        }
    }

    pub fn end_profile(&mut self) {
        if ANNOTATIONS_ENABLED {
            self.device.context().end_event();
        }
    }

    pub fn write_timestamp(&mut self, pool: &QueryPool, index: usize) -> Result<(), DeviceError> {
        let query = pool.query(index).ok_or(DeviceError::InvalidParameters)?;
        self.device.context().end_query(query);
        Ok(())
    }
}
