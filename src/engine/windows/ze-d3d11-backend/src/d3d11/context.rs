use crate::d3d11::{conv, convert_error, resource, typed, typed_opt, SendableIUnknown};
use crate::native::desc::{MappedSubresource, TimestampDisjoint};
use crate::native::{NativeContext, NativeObject, NativeResult};
use enumflags2::BitFlags;
use std::ffi::c_void;
use std::mem::size_of;
use windows::core::{Interface, Vtable, HSTRING, HRESULT};
use windows::Win32::Foundation::S_OK;
use windows::Win32::Graphics::Direct3D11::*;
use ze_core::maths::RectI32;
use ze_gfx::pipeline::{PrimitiveType, ShaderStage};
use ze_gfx::resource::{DepthStencilClearOptions, MapMode, ResourceRegion, Viewport};
use ze_gfx::PixelFormat;

pub struct D3D11Context {
    context: SendableIUnknown<ID3D11DeviceContext>,
    annotation: Option<SendableIUnknown<ID3DUserDefinedAnnotation>>,
}

impl D3D11Context {
    pub fn new(context: ID3D11DeviceContext) -> Self {
        let annotation = context
            .cast::<ID3DUserDefinedAnnotation>()
            .ok()
            .map(SendableIUnknown::from);
        Self {
            context: context.into(),
            annotation,
        }
    }

    /// `None` while the query result is not available yet
    fn query_data<T: Default>(&self, query: &NativeObject) -> Option<T> {
        let query = typed::<ID3D11Query>(query).ok()?;
        let mut data = T::default();
        let result: HRESULT = unsafe {
            (Vtable::vtable(&*self.context).GetData)(
                Vtable::as_raw(&*self.context),
                Vtable::as_raw(query),
                &mut data as *mut T as *mut c_void,
                size_of::<T>() as u32,
                0,
            )
        };
        (result == S_OK).then_some(data)
    }
}

impl NativeContext for D3D11Context {
    fn clear_state(&mut self) {
        unsafe { self.context.ClearState() }
    }

    fn flush(&mut self) {
        unsafe { self.context.Flush() }
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<&NativeObject>) {
        unsafe {
            match stage {
                ShaderStage::Vertex => self
                    .context
                    .VSSetShader(typed_opt::<ID3D11VertexShader>(shader).as_ref(), None),
                ShaderStage::Hull => self
                    .context
                    .HSSetShader(typed_opt::<ID3D11HullShader>(shader).as_ref(), None),
                ShaderStage::Domain => self
                    .context
                    .DSSetShader(typed_opt::<ID3D11DomainShader>(shader).as_ref(), None),
                ShaderStage::Geometry => self
                    .context
                    .GSSetShader(typed_opt::<ID3D11GeometryShader>(shader).as_ref(), None),
                ShaderStage::Pixel => self
                    .context
                    .PSSetShader(typed_opt::<ID3D11PixelShader>(shader).as_ref(), None),
                ShaderStage::Compute => self
                    .context
                    .CSSetShader(typed_opt::<ID3D11ComputeShader>(shader).as_ref(), None),
                ShaderStage::None => {}
            }
        }
    }

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&NativeObject>) {
        let buffers = [typed_opt::<ID3D11Buffer>(buffer)];
        unsafe {
            match stage {
                ShaderStage::Vertex => self.context.VSSetConstantBuffers(slot, Some(&buffers)),
                ShaderStage::Hull => self.context.HSSetConstantBuffers(slot, Some(&buffers)),
                ShaderStage::Domain => self.context.DSSetConstantBuffers(slot, Some(&buffers)),
                ShaderStage::Geometry => self.context.GSSetConstantBuffers(slot, Some(&buffers)),
                ShaderStage::Pixel => self.context.PSSetConstantBuffers(slot, Some(&buffers)),
                ShaderStage::Compute => self.context.CSSetConstantBuffers(slot, Some(&buffers)),
                ShaderStage::None => {}
            }
        }
    }

    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: Option<&NativeObject>) {
        let samplers = [typed_opt::<ID3D11SamplerState>(sampler)];
        unsafe {
            match stage {
                ShaderStage::Vertex => self.context.VSSetSamplers(slot, Some(&samplers)),
                ShaderStage::Hull => self.context.HSSetSamplers(slot, Some(&samplers)),
                ShaderStage::Domain => self.context.DSSetSamplers(slot, Some(&samplers)),
                ShaderStage::Geometry => self.context.GSSetSamplers(slot, Some(&samplers)),
                ShaderStage::Pixel => self.context.PSSetSamplers(slot, Some(&samplers)),
                ShaderStage::Compute => self.context.CSSetSamplers(slot, Some(&samplers)),
                ShaderStage::None => {}
            }
        }
    }

    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: Option<&NativeObject>) {
        let views = [typed_opt::<ID3D11ShaderResourceView>(view)];
        unsafe {
            match stage {
                ShaderStage::Vertex => self.context.VSSetShaderResources(slot, Some(&views)),
                ShaderStage::Hull => self.context.HSSetShaderResources(slot, Some(&views)),
                ShaderStage::Domain => self.context.DSSetShaderResources(slot, Some(&views)),
                ShaderStage::Geometry => self.context.GSSetShaderResources(slot, Some(&views)),
                ShaderStage::Pixel => self.context.PSSetShaderResources(slot, Some(&views)),
                ShaderStage::Compute => self.context.CSSetShaderResources(slot, Some(&views)),
                ShaderStage::None => {}
            }
        }
    }

    fn cs_set_unordered_access_view(
        &mut self,
        slot: u32,
        view: Option<&NativeObject>,
        initial_count: u32,
    ) {
        let views = [typed_opt::<ID3D11UnorderedAccessView>(view)];
        unsafe {
            self.context.CSSetUnorderedAccessViews(
                slot,
                1,
                Some(views.as_ptr()),
                Some(&initial_count),
            )
        }
    }

    fn om_set_render_targets(
        &mut self,
        render_targets: &[Option<NativeObject>],
        depth_stencil: Option<&NativeObject>,
    ) {
        let render_targets: Vec<Option<ID3D11RenderTargetView>> = render_targets
            .iter()
            .map(|view| typed_opt(view.as_ref()))
            .collect();
        let depth_stencil = typed_opt::<ID3D11DepthStencilView>(depth_stencil);
        unsafe {
            self.context
                .OMSetRenderTargets(Some(&render_targets), depth_stencil.as_ref())
        }
    }

    fn om_set_render_targets_and_unordered_access_views(
        &mut self,
        render_targets: &[Option<NativeObject>],
        depth_stencil: Option<&NativeObject>,
        uav_start_slot: u32,
        views: &[Option<NativeObject>],
        initial_counts: &[u32],
    ) {
        let render_targets: Vec<Option<ID3D11RenderTargetView>> = render_targets
            .iter()
            .map(|view| typed_opt(view.as_ref()))
            .collect();
        let depth_stencil = typed_opt::<ID3D11DepthStencilView>(depth_stencil);
        let views: Vec<Option<ID3D11UnorderedAccessView>> =
            views.iter().map(|view| typed_opt(view.as_ref())).collect();
        unsafe {
            self.context.OMSetRenderTargetsAndUnorderedAccessViews(
                Some(&render_targets),
                depth_stencil.as_ref(),
                uav_start_slot,
                views.len() as u32,
                Some(views.as_ptr()),
                Some(initial_counts.as_ptr()),
            )
        }
    }

    fn om_get_blend_state(&mut self) -> (Option<NativeObject>, [f32; 4], u32) {
        let mut state = None;
        let mut blend_factor = [0.0f32; 4];
        let mut sample_mask = 0;
        unsafe {
            self.context.OMGetBlendState(
                Some(&mut state),
                Some(blend_factor.as_mut_ptr()),
                Some(&mut sample_mask),
            )
        };
        (state.map(super::wrap), blend_factor, sample_mask)
    }

    fn om_set_blend_state(
        &mut self,
        state: Option<&NativeObject>,
        blend_factor: [f32; 4],
        sample_mask: u32,
    ) {
        let state = typed_opt::<ID3D11BlendState>(state);
        unsafe {
            self.context
                .OMSetBlendState(state.as_ref(), Some(blend_factor.as_ptr()), sample_mask)
        }
    }

    fn om_get_depth_stencil_state(&mut self) -> (Option<NativeObject>, u32) {
        let mut state = None;
        let mut stencil_ref = 0;
        unsafe {
            self.context
                .OMGetDepthStencilState(Some(&mut state), Some(&mut stencil_ref))
        };
        (state.map(super::wrap), stencil_ref)
    }

    fn om_set_depth_stencil_state(&mut self, state: Option<&NativeObject>, stencil_ref: u32) {
        let state = typed_opt::<ID3D11DepthStencilState>(state);
        unsafe {
            self.context
                .OMSetDepthStencilState(state.as_ref(), stencil_ref)
        }
    }

    fn rs_set_state(&mut self, state: Option<&NativeObject>) {
        let state = typed_opt::<ID3D11RasterizerState>(state);
        unsafe { self.context.RSSetState(state.as_ref()) }
    }

    fn rs_set_viewports(&mut self, viewports: &[Viewport]) {
        let viewports: Vec<D3D11_VIEWPORT> = viewports.iter().map(conv::viewport).collect();
        unsafe { self.context.RSSetViewports(Some(&viewports)) }
    }

    fn rs_set_scissor_rects(&mut self, rects: &[RectI32]) {
        let rects: Vec<_> = rects.iter().map(conv::rect).collect();
        unsafe { self.context.RSSetScissorRects(Some(&rects)) }
    }

    fn ia_set_input_layout(&mut self, layout: Option<&NativeObject>) {
        let layout = typed_opt::<ID3D11InputLayout>(layout);
        unsafe { self.context.IASetInputLayout(layout.as_ref()) }
    }

    fn ia_set_primitive_topology(&mut self, topology: PrimitiveType) {
        unsafe {
            self.context
                .IASetPrimitiveTopology(conv::primitive_topology(topology))
        }
    }

    fn ia_set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: Option<&NativeObject>,
        stride: u32,
        offset: u32,
    ) {
        let buffers = [typed_opt::<ID3D11Buffer>(buffer)];
        unsafe {
            self.context.IASetVertexBuffers(
                slot,
                1,
                Some(buffers.as_ptr()),
                Some(&stride),
                Some(&offset),
            )
        }
    }

    fn ia_set_index_buffer(
        &mut self,
        buffer: Option<&NativeObject>,
        format: PixelFormat,
        offset: u32,
    ) {
        let buffer = typed_opt::<ID3D11Buffer>(buffer);
        unsafe {
            self.context
                .IASetIndexBuffer(buffer.as_ref(), conv::format(format), offset)
        }
    }

    fn so_set_targets(&mut self, buffers: &[Option<NativeObject>], offsets: &[u32]) {
        let buffers: Vec<Option<ID3D11Buffer>> =
            buffers.iter().map(|buffer| typed_opt(buffer.as_ref())).collect();
        unsafe {
            self.context.SOSetTargets(
                buffers.len() as u32,
                Some(buffers.as_ptr()),
                Some(offsets.as_ptr()),
            )
        }
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        unsafe { self.context.Draw(vertex_count, start_vertex) }
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        unsafe { self.context.DrawIndexed(index_count, start_index, base_vertex) }
    }

    fn draw_instanced(
        &mut self,
        vertex_count_per_instance: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) {
        unsafe {
            self.context.DrawInstanced(
                vertex_count_per_instance,
                instance_count,
                start_vertex,
                start_instance,
            )
        }
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        unsafe {
            self.context.DrawIndexedInstanced(
                index_count_per_instance,
                instance_count,
                start_index,
                base_vertex,
                start_instance,
            )
        }
    }

    fn draw_instanced_indirect(&mut self, arguments: &NativeObject, aligned_byte_offset: u32) {
        if let Ok(arguments) = typed::<ID3D11Buffer>(arguments) {
            unsafe {
                self.context
                    .DrawInstancedIndirect(arguments, aligned_byte_offset)
            }
        }
    }

    fn draw_indexed_instanced_indirect(
        &mut self,
        arguments: &NativeObject,
        aligned_byte_offset: u32,
    ) {
        if let Ok(arguments) = typed::<ID3D11Buffer>(arguments) {
            unsafe {
                self.context
                    .DrawIndexedInstancedIndirect(arguments, aligned_byte_offset)
            }
        }
    }

    fn draw_auto(&mut self) {
        unsafe { self.context.DrawAuto() }
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        unsafe { self.context.Dispatch(x, y, z) }
    }

    fn dispatch_indirect(&mut self, arguments: &NativeObject, aligned_byte_offset: u32) {
        if let Ok(arguments) = typed::<ID3D11Buffer>(arguments) {
            unsafe { self.context.DispatchIndirect(arguments, aligned_byte_offset) }
        }
    }

    fn clear_depth_stencil_view(
        &mut self,
        view: &NativeObject,
        options: BitFlags<DepthStencilClearOptions>,
        depth: f32,
        stencil: u8,
    ) {
        if let Ok(view) = typed::<ID3D11DepthStencilView>(view) {
            unsafe {
                self.context
                    .ClearDepthStencilView(view, options.bits(), depth, stencil)
            }
        }
    }

    fn clear_render_target_view(&mut self, view: &NativeObject, color: [f32; 4]) {
        if let Ok(view) = typed::<ID3D11RenderTargetView>(view) {
            unsafe { self.context.ClearRenderTargetView(view, color.as_ptr()) }
        }
    }

    fn clear_unordered_access_view_float(&mut self, view: &NativeObject, value: [f32; 4]) {
        if let Ok(view) = typed::<ID3D11UnorderedAccessView>(view) {
            unsafe {
                self.context
                    .ClearUnorderedAccessViewFloat(view, value.as_ptr())
            }
        }
    }

    fn clear_unordered_access_view_uint(&mut self, view: &NativeObject, value: [u32; 4]) {
        if let Ok(view) = typed::<ID3D11UnorderedAccessView>(view) {
            unsafe {
                self.context
                    .ClearUnorderedAccessViewUint(view, value.as_ptr())
            }
        }
    }

    fn copy_resource(&mut self, destination: &NativeObject, source: &NativeObject) {
        if let (Ok(destination), Ok(source)) = (resource(destination), resource(source)) {
            unsafe { self.context.CopyResource(&destination, &source) }
        }
    }

    fn resolve_subresource(
        &mut self,
        destination: &NativeObject,
        destination_subresource: u32,
        source: &NativeObject,
        source_subresource: u32,
        format: PixelFormat,
    ) {
        if let (Ok(destination), Ok(source)) = (resource(destination), resource(source)) {
            unsafe {
                self.context.ResolveSubresource(
                    &destination,
                    destination_subresource,
                    &source,
                    source_subresource,
                    conv::format(format),
                )
            }
        }
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
        let source_box = source_region.map(conv::resource_box);
        if let (Ok(destination), Ok(source)) = (resource(destination), resource(source)) {
            unsafe {
                self.context.CopySubresourceRegion(
                    &destination,
                    destination_subresource,
                    x,
                    y,
                    z,
                    &source,
                    source_subresource,
                    source_box.as_ref().map(|b| b as *const _),
                )
            }
        }
    }

    fn copy_structure_count(
        &mut self,
        destination: &NativeObject,
        aligned_byte_offset: u32,
        source_view: &NativeObject,
    ) {
        if let (Ok(destination), Ok(source_view)) = (
            typed::<ID3D11Buffer>(destination),
            typed::<ID3D11UnorderedAccessView>(source_view),
        ) {
            unsafe {
                self.context
                    .CopyStructureCount(destination, aligned_byte_offset, source_view)
            }
        }
    }

    fn update_subresource(
        &mut self,
        resource_object: &NativeObject,
        subresource: u32,
        region: Option<&ResourceRegion>,
        data: &[u8],
        row_pitch: u32,
        depth_pitch: u32,
    ) {
        let destination_box = region.map(conv::resource_box);
        if let Ok(resource) = resource(resource_object) {
            unsafe {
                self.context.UpdateSubresource(
                    &resource,
                    subresource,
                    destination_box.as_ref().map(|b| b as *const _),
                    data.as_ptr() as *const c_void,
                    row_pitch,
                    depth_pitch,
                )
            }
        }
    }

    fn map(
        &mut self,
        resource_object: &NativeObject,
        subresource: u32,
        mode: MapMode,
        do_not_wait: bool,
    ) -> NativeResult<MappedSubresource> {
        let resource = resource(resource_object)?;
        let flags = if do_not_wait {
            D3D11_MAP_FLAG_DO_NOT_WAIT.0 as u32
        } else {
            0
        };

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            self.context
                .Map(&resource, subresource, conv::map_type(mode), flags, Some(&mut mapped))
                .map_err(convert_error)?;
        }
        Ok(MappedSubresource {
            data: mapped.pData as *mut u8,
            row_pitch: mapped.RowPitch,
            depth_pitch: mapped.DepthPitch,
        })
    }

    fn unmap(&mut self, resource_object: &NativeObject, subresource: u32) {
        if let Ok(resource) = resource(resource_object) {
            unsafe { self.context.Unmap(&resource, subresource) }
        }
    }

    fn begin_query(&mut self, query: &NativeObject) {
        if let Ok(query) = typed::<ID3D11Query>(query) {
            unsafe { self.context.Begin(query) }
        }
    }

    fn end_query(&mut self, query: &NativeObject) {
        if let Ok(query) = typed::<ID3D11Query>(query) {
            unsafe { self.context.End(query) }
        }
    }

    fn timestamp_data(&mut self, query: &NativeObject) -> Option<u64> {
        self.query_data::<u64>(query)
    }

    fn timestamp_disjoint_data(&mut self, query: &NativeObject) -> Option<TimestampDisjoint> {
        self.query_data::<D3D11_QUERY_DATA_TIMESTAMP_DISJOINT>(query)
            .map(|data| TimestampDisjoint {
                frequency: data.Frequency,
                disjoint: data.Disjoint.as_bool(),
            })
    }

    fn begin_event(&mut self, name: &str) {
        if let Some(annotation) = &self.annotation {
            unsafe { annotation.BeginEvent(&HSTRING::from(name)) };
        }
    }

    fn end_event(&mut self) {
        if let Some(annotation) = &self.annotation {
            unsafe { annotation.EndEvent() };
        }
    }
}
