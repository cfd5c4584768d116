use crate::d3d11::video::D3D11VideoDevice;
use crate::d3d11::{conv, convert_error, created, resource, typed, wrap, SendableIUnknown};
use crate::native::desc::*;
use crate::native::*;
use std::ffi::{c_void, CString};
use std::mem::size_of;
use std::sync::Arc;
use windows::core::{Interface, HSTRING, PCSTR};
use windows::Win32::Graphics::Direct3D::WKPDID_D3DDebugObjectName;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::*;
use ze_gfx::backend::{DeviceError, GraphicsProfile};
use ze_gfx::pipeline::*;
use ze_gfx::PixelFormat;

pub struct D3D11Device {
    device: SendableIUnknown<ID3D11Device>,
}

impl D3D11Device {
    pub fn new(device: ID3D11Device) -> Self {
        Self {
            device: device.into(),
        }
    }

    fn check_feature_support<T: Default>(&self, feature: D3D11_FEATURE) -> Option<T> {
        let mut data = T::default();
        unsafe {
            self.device.CheckFeatureSupport(
                feature,
                &mut data as *mut T as *mut c_void,
                size_of::<T>() as u32,
            )
        }
        .ok()
        .map(|_| data)
    }
}

/// Common interface of every object a device creates
fn device_child(object: &NativeObject) -> Option<ID3D11DeviceChild> {
    macro_rules! try_child {
        ($($interface:ty),*) => {
            $(
                if let Ok(object) = typed::<$interface>(object) {
                    return object.cast().ok();
                }
            )*
        };
    }

    try_child!(
        ID3D11Buffer,
        ID3D11Texture1D,
        ID3D11Texture2D,
        ID3D11Texture3D,
        ID3D11ShaderResourceView,
        ID3D11RenderTargetView,
        ID3D11UnorderedAccessView,
        ID3D11DepthStencilView,
        ID3D11VertexShader,
        ID3D11HullShader,
        ID3D11DomainShader,
        ID3D11GeometryShader,
        ID3D11PixelShader,
        ID3D11ComputeShader,
        ID3D11InputLayout,
        ID3D11BlendState,
        ID3D11RasterizerState,
        ID3D11DepthStencilState,
        ID3D11SamplerState,
        ID3D11Query
    );
    None
}

fn view(object: &NativeObject) -> NativeResult<ID3D11View> {
    macro_rules! try_view {
        ($($interface:ty),*) => {
            $(
                if let Ok(view) = typed::<$interface>(object) {
                    return view.cast().map_err(convert_error);
                }
            )*
        };
    }

    try_view!(
        ID3D11ShaderResourceView,
        ID3D11RenderTargetView,
        ID3D11UnorderedAccessView,
        ID3D11DepthStencilView
    );
    Err(DeviceError::InvalidParameters)
}

/// Wrap a generic resource with its most specific interface
fn specific_resource(resource: &ID3D11Resource) -> NativeResult<NativeObject> {
    if let Ok(buffer) = resource.cast::<ID3D11Buffer>() {
        return Ok(wrap(buffer));
    }
    if let Ok(texture) = resource.cast::<ID3D11Texture2D>() {
        return Ok(wrap(texture));
    }
    if let Ok(texture) = resource.cast::<ID3D11Texture1D>() {
        return Ok(wrap(texture));
    }
    resource
        .cast::<ID3D11Texture3D>()
        .map(wrap)
        .map_err(convert_error)
}

impl NativeDevice for D3D11Device {
    fn feature_level(&self) -> GraphicsProfile {
        conv::profile(unsafe { self.device.GetFeatureLevel() })
    }

    fn threading_support(&self) -> ThreadingSupport {
        self.check_feature_support::<D3D11_FEATURE_DATA_THREADING>(D3D11_FEATURE_THREADING)
            .map(|data| ThreadingSupport {
                concurrent_creates: data.DriverConcurrentCreates.as_bool(),
                command_lists: data.DriverCommandLists.as_bool(),
            })
            .unwrap_or_default()
    }

    fn has_compute_shaders(&self) -> bool {
        self.check_feature_support::<D3D11_FEATURE_DATA_D3D10_X_HARDWARE_OPTIONS>(
            D3D11_FEATURE_D3D10_X_HARDWARE_OPTIONS,
        )
        .map(|data| data.ComputeShaders_Plus_RawAndStructuredBuffers_Via_Shader_4_x.as_bool())
        .unwrap_or(false)
    }

    fn has_double_precision(&self) -> bool {
        self.check_feature_support::<D3D11_FEATURE_DATA_DOUBLES>(D3D11_FEATURE_DOUBLES)
            .map(|data| data.DoublePrecisionFloatShaderOps.as_bool())
            .unwrap_or(false)
    }

    fn format_support(&self, format: PixelFormat) -> NativeResult<u32> {
        unsafe { self.device.CheckFormatSupport(conv::format(format)) }.map_err(convert_error)
    }

    fn multisample_quality_levels(&self, format: PixelFormat, sample_count: u32) -> u32 {
        unsafe {
            self.device
                .CheckMultisampleQualityLevels(conv::format(format), sample_count)
        }
        .unwrap_or(0)
    }

    fn create_buffer(
        &self,
        desc: &NativeBufferDesc,
        initial_data: Option<&[u8]>,
    ) -> NativeResult<NativeObject> {
        let initial_data = initial_data.map(|data| D3D11_SUBRESOURCE_DATA {
            pSysMem: data.as_ptr() as *const c_void,
            SysMemPitch: 0,
            SysMemSlicePitch: 0,
        });

        let mut buffer = None;
        unsafe {
            self.device
                .CreateBuffer(
                    &conv::buffer_desc(desc),
                    initial_data.as_ref().map(|data| data as *const _),
                    Some(&mut buffer),
                )
                .map_err(convert_error)?;
        }
        Ok(wrap(created(buffer)?))
    }

    fn create_texture(
        &self,
        desc: &NativeTextureDesc,
        initial_data: &[SubresourceData],
    ) -> NativeResult<NativeObject> {
        let initial_data: Vec<D3D11_SUBRESOURCE_DATA> = initial_data
            .iter()
            .map(|data| D3D11_SUBRESOURCE_DATA {
                pSysMem: data.data.as_ptr() as *const c_void,
                SysMemPitch: data.row_pitch,
                SysMemSlicePitch: data.slice_pitch,
            })
            .collect();
        let initial_data = if initial_data.is_empty() {
            None
        } else {
            Some(initial_data.as_ptr())
        };

        unsafe {
            match desc.dimension {
                NativeTextureDimension::Texture1D => {
                    let mut texture = None;
                    self.device
                        .CreateTexture1D(&conv::texture_1d_desc(desc), initial_data, Some(&mut texture))
                        .map_err(convert_error)?;
                    Ok(wrap(created(texture)?))
                }
                NativeTextureDimension::Texture2D => {
                    let mut texture = None;
                    self.device
                        .CreateTexture2D(&conv::texture_2d_desc(desc), initial_data, Some(&mut texture))
                        .map_err(convert_error)?;
                    Ok(wrap(created(texture)?))
                }
                NativeTextureDimension::Texture3D => {
                    let mut texture = None;
                    self.device
                        .CreateTexture3D(&conv::texture_3d_desc(desc), initial_data, Some(&mut texture))
                        .map_err(convert_error)?;
                    Ok(wrap(created(texture)?))
                }
            }
        }
    }

    fn texture_desc(&self, texture: &NativeObject) -> NativeResult<NativeTextureDesc> {
        if let Ok(texture) = typed::<ID3D11Texture2D>(texture) {
            let mut desc = D3D11_TEXTURE2D_DESC::default();
            unsafe { texture.GetDesc(&mut desc) };
            return Ok(conv::native_texture_desc(
                NativeTextureDimension::Texture2D,
                desc.Width,
                desc.Height,
                desc.ArraySize,
                desc.MipLevels,
                desc.Format,
                desc.SampleDesc,
                desc.Usage,
                desc.BindFlags.0 as u32,
                desc.CPUAccessFlags.0 as u32,
                desc.MiscFlags.0 as u32,
            ));
        }

        if let Ok(texture) = typed::<ID3D11Texture1D>(texture) {
            let mut desc = D3D11_TEXTURE1D_DESC::default();
            unsafe { texture.GetDesc(&mut desc) };
            return Ok(conv::native_texture_desc(
                NativeTextureDimension::Texture1D,
                desc.Width,
                1,
                desc.ArraySize,
                desc.MipLevels,
                desc.Format,
                conv::sample_desc(ze_gfx::SampleDesc::default()),
                desc.Usage,
                desc.BindFlags.0 as u32,
                desc.CPUAccessFlags.0 as u32,
                desc.MiscFlags.0 as u32,
            ));
        }

        let texture = typed::<ID3D11Texture3D>(texture)?;
        let mut desc = D3D11_TEXTURE3D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };
        Ok(conv::native_texture_desc(
            NativeTextureDimension::Texture3D,
            desc.Width,
            desc.Height,
            desc.Depth,
            desc.MipLevels,
            desc.Format,
            conv::sample_desc(ze_gfx::SampleDesc::default()),
            desc.Usage,
            desc.BindFlags.0 as u32,
            desc.CPUAccessFlags.0 as u32,
            desc.MiscFlags.0 as u32,
        ))
    }

    fn view_resource(&self, view_object: &NativeObject) -> NativeResult<NativeObject> {
        let view = view(view_object)?;
        let mut resource = None;
        unsafe { view.GetResource(&mut resource) };
        specific_resource(&created(resource)?)
    }

    fn create_shader_resource_view(
        &self,
        resource_object: &NativeObject,
        desc: &ShaderResourceViewDesc,
    ) -> NativeResult<NativeObject> {
        let resource = resource(resource_object)?;
        let mut view = None;
        unsafe {
            self.device
                .CreateShaderResourceView(&resource, Some(&conv::srv_desc(desc)), Some(&mut view))
                .map_err(convert_error)?;
        }
        Ok(wrap(created(view)?))
    }

    fn create_render_target_view(
        &self,
        resource_object: &NativeObject,
        desc: &RenderTargetViewDesc,
    ) -> NativeResult<NativeObject> {
        let resource = resource(resource_object)?;
        let mut view = None;
        unsafe {
            self.device
                .CreateRenderTargetView(&resource, Some(&conv::rtv_desc(desc)), Some(&mut view))
                .map_err(convert_error)?;
        }
        Ok(wrap(created(view)?))
    }

    fn create_unordered_access_view(
        &self,
        resource_object: &NativeObject,
        desc: &UnorderedAccessViewDesc,
    ) -> NativeResult<NativeObject> {
        let resource = resource(resource_object)?;
        let mut view = None;
        unsafe {
            self.device
                .CreateUnorderedAccessView(&resource, Some(&conv::uav_desc(desc)), Some(&mut view))
                .map_err(convert_error)?;
        }
        Ok(wrap(created(view)?))
    }

    fn create_depth_stencil_view(
        &self,
        resource_object: &NativeObject,
        desc: &DepthStencilViewDesc,
    ) -> NativeResult<NativeObject> {
        let resource = resource(resource_object)?;
        let mut view = None;
        unsafe {
            self.device
                .CreateDepthStencilView(&resource, Some(&conv::dsv_desc(desc)), Some(&mut view))
                .map_err(convert_error)?;
        }
        Ok(wrap(created(view)?))
    }

    fn create_shader(&self, stage: ShaderStage, bytecode: &[u8]) -> NativeResult<NativeObject> {
        let data = bytecode.as_ptr() as *const c_void;
        let length = bytecode.len();

        macro_rules! create_shader {
            ($method:ident) => {{
                let mut shader = None;
                unsafe {
                    self.device
                        .$method(data, length, None::<&ID3D11ClassLinkage>, Some(&mut shader))
                        .map_err(convert_error)?;
                }
                Ok(wrap(created(shader)?))
            }};
        }

        match stage {
            ShaderStage::Vertex => create_shader!(CreateVertexShader),
            ShaderStage::Hull => create_shader!(CreateHullShader),
            ShaderStage::Domain => create_shader!(CreateDomainShader),
            ShaderStage::Geometry => create_shader!(CreateGeometryShader),
            ShaderStage::Pixel => create_shader!(CreatePixelShader),
            ShaderStage::Compute => create_shader!(CreateComputeShader),
            ShaderStage::None => Err(DeviceError::InvalidParameters),
        }
    }

    fn create_geometry_shader_with_stream_output(
        &self,
        bytecode: &[u8],
        stream_output: &StreamOutputDesc,
    ) -> NativeResult<NativeObject> {
        let semantic_names = stream_output
            .elements
            .iter()
            .map(|element| CString::new(element.semantic_name.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DeviceError::InvalidParameters)?;

        let entries: Vec<D3D11_SO_DECLARATION_ENTRY> = stream_output
            .elements
            .iter()
            .zip(semantic_names.iter())
            .map(|(element, name)| D3D11_SO_DECLARATION_ENTRY {
                Stream: element.stream,
                SemanticName: PCSTR(name.as_ptr() as *const u8),
                SemanticIndex: element.semantic_index,
                StartComponent: element.start_component,
                ComponentCount: element.component_count,
                OutputSlot: element.output_slot,
            })
            .collect();

        let mut shader = None;
        unsafe {
            self.device
                .CreateGeometryShaderWithStreamOutput(
                    bytecode.as_ptr() as *const c_void,
                    bytecode.len(),
                    Some(&entries),
                    Some(&stream_output.strides),
                    stream_output.rasterized_stream as u32,
                    None::<&ID3D11ClassLinkage>,
                    Some(&mut shader),
                )
                .map_err(convert_error)?;
        }
        Ok(wrap(created(shader)?))
    }

    fn create_input_layout(
        &self,
        elements: &[InputElementDesc],
        signature: &[u8],
    ) -> NativeResult<NativeObject> {
        let semantic_names = elements
            .iter()
            .map(|element| CString::new(element.semantic_name.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DeviceError::InvalidParameters)?;

        let native_elements: Vec<D3D11_INPUT_ELEMENT_DESC> = elements
            .iter()
            .zip(semantic_names.iter())
            .map(|(element, name)| D3D11_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(name.as_ptr() as *const u8),
                SemanticIndex: element.semantic_index,
                Format: conv::format(element.format),
                InputSlot: element.input_slot,
                AlignedByteOffset: element.aligned_byte_offset,
                InputSlotClass: match element.input_slot_class {
                    InputClassification::Vertex => D3D11_INPUT_PER_VERTEX_DATA,
                    InputClassification::Instance => D3D11_INPUT_PER_INSTANCE_DATA,
                },
                InstanceDataStepRate: element.instance_data_step_rate,
            })
            .collect();

        let mut layout = None;
        unsafe {
            self.device
                .CreateInputLayout(
                    &native_elements,
                    signature.as_ptr() as *const c_void,
                    signature.len(),
                    Some(&mut layout),
                )
                .map_err(convert_error)?;
        }
        Ok(wrap(created(layout)?))
    }

    fn create_blend_state(&self, desc: &BlendStateDesc) -> NativeResult<NativeObject> {
        let mut state = None;
        unsafe {
            self.device
                .CreateBlendState(&conv::blend_desc(desc), Some(&mut state))
                .map_err(convert_error)?;
        }
        Ok(wrap(created(state)?))
    }

    fn create_rasterizer_state(&self, desc: &RasterizerStateDesc) -> NativeResult<NativeObject> {
        let mut state = None;
        unsafe {
            self.device
                .CreateRasterizerState(&conv::rasterizer_desc(desc), Some(&mut state))
                .map_err(convert_error)?;
        }
        Ok(wrap(created(state)?))
    }

    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilStateDesc,
    ) -> NativeResult<NativeObject> {
        let mut state = None;
        unsafe {
            self.device
                .CreateDepthStencilState(&conv::depth_stencil_desc(desc), Some(&mut state))
                .map_err(convert_error)?;
        }
        Ok(wrap(created(state)?))
    }

    fn create_sampler_state(&self, desc: &SamplerStateDesc) -> NativeResult<NativeObject> {
        let mut state = None;
        unsafe {
            self.device
                .CreateSamplerState(&conv::sampler_desc(desc), Some(&mut state))
                .map_err(convert_error)?;
        }
        Ok(wrap(created(state)?))
    }

    fn create_query(&self, kind: NativeQueryKind) -> NativeResult<NativeObject> {
        let desc = D3D11_QUERY_DESC {
            Query: match kind {
                NativeQueryKind::Timestamp => D3D11_QUERY_TIMESTAMP,
                NativeQueryKind::TimestampDisjoint => D3D11_QUERY_TIMESTAMP_DISJOINT,
            },
            MiscFlags: 0,
        };

        let mut query = None;
        unsafe {
            self.device
                .CreateQuery(&desc, Some(&mut query))
                .map_err(convert_error)?;
        }
        Ok(wrap(created(query)?))
    }

    fn device_removed_reason(&self) -> Option<DeviceRemovedReason> {
        let error = unsafe { self.device.GetDeviceRemovedReason() }.err()?;
        Some(match error.code() {
            DXGI_ERROR_DEVICE_REMOVED => DeviceRemovedReason::Removed,
            DXGI_ERROR_DEVICE_RESET => DeviceRemovedReason::Reset,
            DXGI_ERROR_DEVICE_HUNG => DeviceRemovedReason::Hung,
            DXGI_ERROR_DRIVER_INTERNAL_ERROR => DeviceRemovedReason::DriverInternalError,
            DXGI_ERROR_INVALID_CALL => DeviceRemovedReason::InvalidCall,
            _ => DeviceRemovedReason::Other,
        })
    }

    fn report_live_objects(&self) {
        if let Ok(debug) = self.device.cast::<ID3D11Debug>() {
            let _ = unsafe { debug.ReportLiveDeviceObjects(D3D11_RLDO_DETAIL) };
        }
    }

    fn set_multithread_protected(&self, enabled: bool) {
        let mut context = None;
        unsafe { self.device.GetImmediateContext(&mut context) };
        if let Some(multithread) = context.and_then(|context| context.cast::<ID3D11Multithread>().ok())
        {
            unsafe { multithread.SetMultithreadProtected(enabled) };
        }
    }

    fn set_debug_name(&self, object: &NativeObject, name: &str) {
        if let Some(child) = device_child(object) {
            let _ = unsafe {
                child.SetPrivateData(
                    &WKPDID_D3DDebugObjectName,
                    name.len() as u32,
                    Some(name.as_ptr() as *const c_void),
                )
            };
        }
    }

    fn shared_handle(&self, texture: &NativeObject) -> NativeResult<usize> {
        let resource: IDXGIResource = resource(texture)?.cast().map_err(convert_error)?;
        let handle = unsafe { resource.GetSharedHandle() }.map_err(convert_error)?;
        Ok(handle.0 as usize)
    }

    fn create_shared_nt_handle(&self, texture: &NativeObject, name: &str) -> NativeResult<usize> {
        let resource: IDXGIResource1 = resource(texture)?.cast().map_err(convert_error)?;
        let handle = unsafe {
            resource.CreateSharedHandle(
                None,
                DXGI_SHARED_RESOURCE_READ | DXGI_SHARED_RESOURCE_WRITE,
                &HSTRING::from(name),
            )
        }
        .map_err(convert_error)?;
        Ok(handle.0 as usize)
    }

    fn video_device(&self) -> NativeResult<Arc<dyn NativeVideoDevice>> {
        let video_device: ID3D11VideoDevice = self
            .device
            .cast()
            .map_err(|_| DeviceError::Unsupported)?;
        Ok(Arc::new(D3D11VideoDevice::new(video_device)))
    }

    fn as_native_object(&self) -> NativeObject {
        wrap(self.device.0.clone())
    }
}
