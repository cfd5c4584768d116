use crate::device::resource::{cpu_access_flags, GraphicsResource};
use crate::device::GraphicsDevice;
use crate::native::desc::{
    BindFlags, BufferUavFlags, NativeBufferDesc, RenderTargetViewDesc, ResourceMiscFlags,
    RtvDimension, ShaderResourceViewDesc, SrvDimension, UavDimension, UnorderedAccessViewDesc,
};
use crate::native::NativeObject;
use enumflags2::BitFlags;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ze_gfx::backend::DeviceError;
use ze_gfx::resource::{
    BufferDesc, BufferFlags, GraphicsResourceUsage, STRUCTURED_APPEND_BUFFER,
    STRUCTURED_COUNTER_BUFFER,
};
use ze_gfx::PixelFormat;

pub struct Buffer {
    device: Arc<GraphicsDevice>,
    desc: BufferDesc,
    native_desc: NativeBufferDesc,
    view_format: PixelFormat,
    element_count: u32,
    native: NativeObject,
    shader_resource_view: Option<NativeObject>,
    unordered_access_view: Option<NativeObject>,
    name: Option<String>,
    discard_next_map: AtomicBool,
}

impl Buffer {
    pub fn new(
        device: &Arc<GraphicsDevice>,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self, DeviceError> {
        let native_desc = native_buffer_desc(desc)?;
        let (element_count, view_format) = element_count_and_view_format(desc)?;
        let native = device
            .native_device()
            .create_buffer(&native_desc, initial_data)?;

        let views = BufferViews::new(
            device,
            desc,
            &native_desc,
            element_count,
            view_format,
            &native,
        )?;

        device.register_buffer_memory_usage(desc.size_in_bytes as i64);
        Ok(Self {
            device: device.clone(),
            desc: *desc,
            native_desc,
            view_format,
            element_count,
            native,
            shader_resource_view: views.shader_resource_view,
            unordered_access_view: views.unordered_access_view,
            name: None,
            discard_next_map: AtomicBool::new(false),
        })
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn native_desc(&self) -> &NativeBufferDesc {
        &self.native_desc
    }

    pub fn native_buffer(&self) -> &NativeObject {
        &self.native
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn view_format(&self) -> PixelFormat {
        self.view_format
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
        self.device.set_debug_name(&self.native, name);
        if let Some(view) = &self.shader_resource_view {
            self.device.set_debug_name(view, &format!("{} SRV", name));
        }
        if let Some(view) = &self.unordered_access_view {
            self.device.set_debug_name(view, &format!("{} UAV", name));
        }
    }

    /// Rebuild the native buffer and its views from the stored description
    pub fn recreate(&mut self, initial_data: Option<&[u8]>) -> Result<(), DeviceError> {
        let native = self
            .device
            .native_device()
            .create_buffer(&self.native_desc, initial_data)?;
        let views = BufferViews::new(
            &self.device,
            &self.desc,
            &self.native_desc,
            self.element_count,
            self.view_format,
            &native,
        )?;

        self.native = native;
        self.shader_resource_view = views.shader_resource_view;
        self.unordered_access_view = views.unordered_access_view;
        Ok(())
    }

    /// Called after a device reset. Returns whether the buffer was recreated.
    pub fn on_recreate(&mut self) -> Result<bool, DeviceError> {
        match self.desc.usage {
            GraphicsResourceUsage::Immutable | GraphicsResourceUsage::Default => Ok(false),
            _ => self.recreate(None).map(|_| true),
        }
    }

    /// Render target view over `width` elements of `format`, `None` if the buffer
    /// is not bound as a render target
    pub fn render_target_view(
        &self,
        format: PixelFormat,
        width: u32,
    ) -> Result<Option<NativeObject>, DeviceError> {
        if !self.native_desc.bind_flags.contains(BindFlags::RenderTarget) {
            return Ok(None);
        }

        let desc = RenderTargetViewDesc {
            format,
            dimension: RtvDimension::Buffer {
                first_element: 0,
                num_elements: format.bytes_size() * width,
            },
        };

        self.device
            .native_device()
            .create_render_target_view(&self.native, &desc)
            .map(Some)
    }
}

impl GraphicsResource for Buffer {
    fn native_resource(&self) -> &NativeObject {
        &self.native
    }

    fn native_shader_resource_view(&self) -> Option<&NativeObject> {
        self.shader_resource_view.as_ref()
    }

    fn native_unordered_access_view(&self) -> Option<&NativeObject> {
        self.unordered_access_view.as_ref()
    }

    fn discard_next_map(&self) -> bool {
        self.discard_next_map.load(Ordering::Relaxed)
    }

    fn set_discard_next_map(&self, discard: bool) {
        self.discard_next_map.store(discard, Ordering::Relaxed);
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.device
            .register_buffer_memory_usage(-(self.desc.size_in_bytes as i64));
    }
}

struct BufferViews {
    shader_resource_view: Option<NativeObject>,
    unordered_access_view: Option<NativeObject>,
}

impl BufferViews {
    fn new(
        device: &GraphicsDevice,
        desc: &BufferDesc,
        native_desc: &NativeBufferDesc,
        element_count: u32,
        view_format: PixelFormat,
        native: &NativeObject,
    ) -> Result<Self, DeviceError> {
        let mut views = Self {
            shader_resource_view: None,
            unordered_access_view: None,
        };

        if native_desc.usage == GraphicsResourceUsage::Staging {
            return Ok(views);
        }

        let raw = desc.flags.contains(BufferFlags::RawBuffer);
        let view_format = if raw {
            PixelFormat::R32Typeless
        } else {
            view_format
        };

        let native_device = device.native_device();
        if native_desc.bind_flags.contains(BindFlags::ShaderResource) {
            let view_desc = ShaderResourceViewDesc {
                format: view_format,
                dimension: SrvDimension::Buffer {
                    first_element: 0,
                    num_elements: element_count,
                    raw,
                },
            };
            views.shader_resource_view =
                Some(native_device.create_shader_resource_view(native, &view_desc)?);
        }

        if native_desc.bind_flags.contains(BindFlags::UnorderedAccess) {
            let mut flags = BitFlags::empty();
            if raw {
                flags |= BufferUavFlags::Raw;
            }
            if desc.flags.contains(STRUCTURED_APPEND_BUFFER) {
                flags |= BufferUavFlags::Append;
            }
            if desc.flags.contains(STRUCTURED_COUNTER_BUFFER) {
                flags |= BufferUavFlags::Counter;
            }

            let view_desc = UnorderedAccessViewDesc {
                format: view_format,
                dimension: UavDimension::Buffer {
                    first_element: 0,
                    num_elements: element_count,
                    flags,
                },
            };
            views.unordered_access_view =
                Some(native_device.create_unordered_access_view(native, &view_desc)?);
        }

        Ok(views)
    }
}

pub(crate) fn native_buffer_desc(desc: &BufferDesc) -> Result<NativeBufferDesc, DeviceError> {
    let mut bind_flags = BitFlags::empty();
    let mut misc_flags = BitFlags::empty();

    for (flag, bind_flag) in [
        (BufferFlags::ConstantBuffer, BindFlags::ConstantBuffer),
        (BufferFlags::IndexBuffer, BindFlags::IndexBuffer),
        (BufferFlags::VertexBuffer, BindFlags::VertexBuffer),
        (BufferFlags::RenderTarget, BindFlags::RenderTarget),
        (BufferFlags::ShaderResource, BindFlags::ShaderResource),
        (BufferFlags::UnorderedAccess, BindFlags::UnorderedAccess),
        (BufferFlags::StreamOutput, BindFlags::StreamOutput),
    ] {
        if desc.flags.contains(flag) {
            bind_flags |= bind_flag;
        }
    }

    if desc.flags.contains(BufferFlags::StructuredBuffer) {
        if desc.structure_byte_stride == 0 {
            return Err(DeviceError::InvalidParameters);
        }
        misc_flags |= ResourceMiscFlags::BufferStructured;
    }

    if desc.flags.contains(BufferFlags::RawBuffer) {
        misc_flags |= ResourceMiscFlags::BufferAllowRawViews;
    }

    if desc.flags.contains(BufferFlags::ArgumentBuffer) {
        misc_flags |= ResourceMiscFlags::DrawIndirectArgs;
    }

    Ok(NativeBufferDesc {
        byte_width: desc.size_in_bytes,
        usage: desc.usage,
        bind_flags,
        cpu_access_flags: cpu_access_flags(desc.usage),
        misc_flags,
        structure_byte_stride: desc.structure_byte_stride,
    })
}

/// Number of elements seen by the views, and the format they use
fn element_count_and_view_format(desc: &BufferDesc) -> Result<(u32, PixelFormat), DeviceError> {
    if desc.structure_byte_stride > 0 {
        return Ok((
            desc.size_in_bytes / desc.structure_byte_stride,
            PixelFormat::Unknown,
        ));
    }

    if desc.flags.contains(BufferFlags::RawBuffer) {
        Ok((desc.size_in_bytes / 4, desc.view_format))
    } else if desc.flags.contains(BufferFlags::ShaderResource) {
        match desc.view_format.bytes_size() {
            0 => Err(DeviceError::InvalidParameters),
            size => Ok((desc.size_in_bytes / size, desc.view_format)),
        }
    } else {
        Ok((0, desc.view_format))
    }
}
