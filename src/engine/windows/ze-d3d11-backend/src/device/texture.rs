use crate::device::resource::{cpu_access_flags, GraphicsResource};
use crate::device::GraphicsDevice;
use crate::native::desc::{
    BindFlags, DepthStencilViewDesc, DsvDimension, DsvFlags, NativeTextureDesc,
    NativeTextureDimension, RenderTargetViewDesc, ResourceMiscFlags, RtvDimension,
    ShaderResourceViewDesc, SrvDimension, SubresourceData, UavDimension, UnorderedAccessViewDesc,
};
use crate::native::NativeObject;
use enumflags2::BitFlags;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;
use ze_gfx::backend::{DeviceError, GraphicsProfile};
use ze_gfx::resource::{
    GraphicsResourceUsage, MultisampleCount, TextureDesc, TextureDimension, TextureFlags,
    TextureOptions, TextureViewDesc, ViewType, DEPTH_STENCIL_READ_ONLY,
};
use ze_gfx::{PixelFormat, SampleDesc};

/// Quality level selecting the standard sample positions
pub const STANDARD_MULTISAMPLE_PATTERN: u32 = 0xffff_ffff;

const DEFAULT_MINIMUM_LAST_MIP_SIZE: u32 = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TextureOrigin {
    /// Created and owned by this texture
    Created,
    /// Wraps a texture owned by someone else (swap chain, VR runtime)
    Wrapped,
    /// View over the native texture of another `Texture`
    View,
}

pub struct Texture {
    device: Arc<GraphicsDevice>,
    desc: TextureDesc,
    view_desc: TextureViewDesc,
    origin: TextureOrigin,
    native: NativeObject,
    shader_resource_view: Option<NativeObject>,
    unordered_access_view: Option<NativeObject>,
    render_target_view: Option<NativeObject>,
    depth_stencil_view: Option<NativeObject>,
    has_stencil: bool,
    shared_handle: Option<usize>,
    shared_nt_handle_name: Option<String>,
    name: Option<String>,
    discard_next_map: AtomicBool,
}

impl Texture {
    pub fn new(
        device: &Arc<GraphicsDevice>,
        desc: &TextureDesc,
        initial_data: &[SubresourceData],
    ) -> Result<Self, DeviceError> {
        let desc = check_mip_levels(device.current_profile(), desc)?;
        let native_desc = native_texture_desc(device.current_profile(), &desc)?;
        let native = device
            .native_device()
            .create_texture(&native_desc, initial_data)?;

        let texture = Self::from_parts(
            device,
            desc,
            full_view(&desc),
            TextureOrigin::Created,
            native,
        )?;
        device.register_texture_memory_usage(texture.size_in_bytes() as i64);
        Ok(texture)
    }

    /// Wrap a native 2D texture owned elsewhere, reading its description back
    pub fn from_native(
        device: &Arc<GraphicsDevice>,
        native: NativeObject,
        is_srgb: bool,
    ) -> Result<Self, DeviceError> {
        let mut desc = texture_desc_from_native(&device.native_device().texture_desc(&native)?);
        if is_srgb {
            desc.format = desc.format.to_srgb();
        }

        Self::from_parts(device, desc, full_view(&desc), TextureOrigin::Wrapped, native)
    }

    /// New view over the same native texture
    pub fn new_view(&self, view_desc: &TextureViewDesc) -> Result<Texture, DeviceError> {
        let mut view = Self::from_parts(
            &self.device,
            self.desc,
            *view_desc,
            TextureOrigin::View,
            self.native.clone(),
        )?;
        view.shared_handle = self.shared_handle;
        view.shared_nt_handle_name = self.shared_nt_handle_name.clone();
        Ok(view)
    }

    fn from_parts(
        device: &Arc<GraphicsDevice>,
        desc: TextureDesc,
        view_desc: TextureViewDesc,
        origin: TextureOrigin,
        native: NativeObject,
    ) -> Result<Self, DeviceError> {
        let views = TextureViews::new(device, &desc, &view_desc, &native)?;
        let shared = if origin != TextureOrigin::View {
            SharedHandle::new(device, &desc, &native)?
        } else {
            SharedHandle::default()
        };

        Ok(Self {
            device: device.clone(),
            desc,
            view_desc,
            origin,
            native,
            shader_resource_view: views.shader_resource_view,
            unordered_access_view: views.unordered_access_view,
            render_target_view: views.render_target_view,
            depth_stencil_view: views.depth_stencil_view,
            has_stencil: views.has_stencil,
            shared_handle: shared.handle,
            shared_nt_handle_name: shared.nt_handle_name,
            name: None,
            discard_next_map: AtomicBool::new(false),
        })
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn view_desc(&self) -> &TextureViewDesc {
        &self.view_desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// Format the views of this texture use
    pub fn view_format(&self) -> PixelFormat {
        self.view_desc.format
    }

    pub fn is_view(&self) -> bool {
        self.origin == TextureOrigin::View
    }

    pub fn native_texture(&self) -> &NativeObject {
        &self.native
    }

    pub fn native_render_target_view(&self) -> Option<&NativeObject> {
        self.render_target_view.as_ref()
    }

    pub fn native_depth_stencil_view(&self) -> Option<&NativeObject> {
        self.depth_stencil_view.as_ref()
    }

    pub fn has_stencil(&self) -> bool {
        self.has_stencil
    }

    pub fn shared_handle(&self) -> Option<usize> {
        self.shared_handle
    }

    pub fn shared_nt_handle_name(&self) -> Option<&str> {
        self.shared_nt_handle_name.as_deref()
    }

    pub fn subresource_index(&self, array_slice: u32, mip_level: u32) -> u32 {
        mip_level + array_slice * self.desc.mip_levels
    }

    pub fn size_in_bytes(&self) -> u64 {
        texture_size_in_bytes(&self.desc)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
        if self.origin != TextureOrigin::View {
            self.device.set_debug_name(&self.native, name);
        }

        for (view, suffix) in [
            (&self.shader_resource_view, "SRV"),
            (&self.unordered_access_view, "UAV"),
            (&self.render_target_view, "RTV"),
            (&self.depth_stencil_view, "DSV"),
        ] {
            if let Some(view) = view {
                self.device
                    .set_debug_name(view, &format!("{} {}", name, suffix));
            }
        }
    }

    /// Recreate the native texture with new content
    pub fn recreate(&mut self, initial_data: &[SubresourceData]) -> Result<(), DeviceError> {
        if self.origin != TextureOrigin::Created {
            return Err(DeviceError::InvalidOperation);
        }

        let native_desc = native_texture_desc(self.device.current_profile(), &self.desc)?;
        let native = self
            .device
            .native_device()
            .create_texture(&native_desc, initial_data)?;
        let views = TextureViews::new(&self.device, &self.desc, &self.view_desc, &native)?;
        let shared = SharedHandle::new(&self.device, &self.desc, &native)?;

        self.native = native;
        self.shader_resource_view = views.shader_resource_view;
        self.unordered_access_view = views.unordered_access_view;
        self.render_target_view = views.render_target_view;
        self.depth_stencil_view = views.depth_stencil_view;
        self.has_stencil = views.has_stencil;
        self.shared_handle = shared.handle;
        self.shared_nt_handle_name = shared.nt_handle_name;
        Ok(())
    }

    /// Called after a device reset. Returns whether the texture was recreated.
    /// Only textures whose content is rebuilt every frame or written by the CPU are.
    pub fn on_recreate(&mut self) -> Result<bool, DeviceError> {
        if self.origin != TextureOrigin::Created {
            return Ok(false);
        }

        if matches!(
            self.desc.usage,
            GraphicsResourceUsage::Immutable | GraphicsResourceUsage::Default
        ) && !self.desc.is_render_target()
            && !self.desc.is_depth_stencil()
        {
            return Ok(false);
        }

        self.recreate(&[])?;
        Ok(true)
    }
}

impl GraphicsResource for Texture {
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

impl Drop for Texture {
    fn drop(&mut self) {
        if self.origin == TextureOrigin::Created {
            self.device
                .register_texture_memory_usage(-(self.size_in_bytes() as i64));
        }
    }
}

struct TextureViews {
    shader_resource_view: Option<NativeObject>,
    unordered_access_view: Option<NativeObject>,
    render_target_view: Option<NativeObject>,
    depth_stencil_view: Option<NativeObject>,
    has_stencil: bool,
}

impl TextureViews {
    fn new(
        device: &GraphicsDevice,
        desc: &TextureDesc,
        view_desc: &TextureViewDesc,
        native: &NativeObject,
    ) -> Result<Self, DeviceError> {
        let profile = device.current_profile();
        let native_device = device.native_device();

        let shader_resource_view = shader_resource_view_desc(desc, view_desc)?
            .map(|desc| native_device.create_shader_resource_view(native, &desc))
            .transpose()?;
        let unordered_access_view = unordered_access_view_desc(desc, view_desc)?
            .map(|desc| native_device.create_unordered_access_view(native, &desc))
            .transpose()?;
        let render_target_view = render_target_view_desc(desc, view_desc)?
            .map(|desc| native_device.create_render_target_view(native, &desc))
            .transpose()?;
        let depth_stencil_view = depth_stencil_view_desc(profile, desc, view_desc)?
            .map(|desc| native_device.create_depth_stencil_view(native, &desc))
            .transpose()?;
        let has_stencil = depth_stencil_view.is_some() && is_stencil_format(view_desc.format);

        Ok(Self {
            shader_resource_view,
            unordered_access_view,
            render_target_view,
            depth_stencil_view,
            has_stencil,
        })
    }
}

#[derive(Default)]
struct SharedHandle {
    handle: Option<usize>,
    nt_handle_name: Option<String>,
}

impl SharedHandle {
    fn new(
        device: &GraphicsDevice,
        desc: &TextureDesc,
        native: &NativeObject,
    ) -> Result<Self, DeviceError> {
        let options = desc.options;
        let native_device = device.native_device();

        if options.is_empty() {
            Ok(Self::default())
        } else if options == TextureOptions::Shared {
            Ok(Self {
                handle: Some(native_device.shared_handle(native)?),
                nt_handle_name: None,
            })
        } else if options == TextureOptions::SharedNtHandle | TextureOptions::SharedKeyedMutex {
            let name = format!("ze:{}", Uuid::new_v4());
            Ok(Self {
                handle: Some(native_device.create_shared_nt_handle(native, &name)?),
                nt_handle_name: Some(name),
            })
        } else {
            Err(DeviceError::InvalidParameters)
        }
    }
}

pub fn is_depth_stencil_read_only_supported(device: &GraphicsDevice) -> bool {
    device.current_profile() >= GraphicsProfile::Level11_0
}

fn full_view(desc: &TextureDesc) -> TextureViewDesc {
    TextureViewDesc {
        format: desc.format,
        view_type: ViewType::Full,
        array_slice: 0,
        mip_level: 0,
        flags: desc.flags,
    }
}

fn texture_size_in_bytes(desc: &TextureDesc) -> u64 {
    let mut size = 0;
    for mip in 0..desc.mip_levels {
        let width = (desc.width >> mip).max(1);
        let height = (desc.height >> mip).max(1);
        let depth = (desc.depth >> mip).max(1) as u64;
        size += desc.format.texture_size_in_bytes(width, height) * depth;
    }
    size * desc.array_size as u64 * desc.multisample_count.count() as u64
}

fn bind_flags(flags: BitFlags<TextureFlags>) -> BitFlags<BindFlags> {
    let mut bind_flags = BitFlags::empty();
    for (flag, bind_flag) in [
        (TextureFlags::ShaderResource, BindFlags::ShaderResource),
        (TextureFlags::RenderTarget, BindFlags::RenderTarget),
        (TextureFlags::UnorderedAccess, BindFlags::UnorderedAccess),
        (TextureFlags::DepthStencil, BindFlags::DepthStencil),
    ] {
        if flags.contains(flag) {
            bind_flags |= bind_flag;
        }
    }
    bind_flags
}

fn misc_flags(options: BitFlags<TextureOptions>) -> BitFlags<ResourceMiscFlags> {
    let mut misc_flags = BitFlags::empty();
    for (option, misc_flag) in [
        (TextureOptions::Shared, ResourceMiscFlags::Shared),
        (TextureOptions::SharedKeyedMutex, ResourceMiscFlags::SharedKeyedMutex),
        (TextureOptions::SharedNtHandle, ResourceMiscFlags::SharedNtHandle),
    ] {
        if options.contains(option) {
            misc_flags |= misc_flag;
        }
    }
    misc_flags
}

/// Typeless storage format letting a depth buffer also be read as a shader resource
pub fn typeless_depth_format(format: PixelFormat) -> Option<PixelFormat> {
    match format {
        PixelFormat::D16Unorm => Some(PixelFormat::R16Typeless),
        PixelFormat::D32Float => Some(PixelFormat::R32Typeless),
        PixelFormat::D24UnormS8Uint => Some(PixelFormat::R24G8Typeless),
        PixelFormat::D32FloatS8X24Uint => Some(PixelFormat::R32G8X24Typeless),
        _ => None,
    }
}

pub(crate) fn native_texture_desc(
    profile: GraphicsProfile,
    desc: &TextureDesc,
) -> Result<NativeTextureDesc, DeviceError> {
    let mut format = desc.format;
    if desc.is_depth_stencil() {
        if profile < GraphicsProfile::Level10_0 {
            if desc.is_shader_resource() || !format.is_depth_stencil() {
                return Err(DeviceError::Unsupported);
            }
        } else {
            format = typeless_depth_format(desc.format).ok_or(DeviceError::Unsupported)?;
        }
    }

    let quality = if profile >= GraphicsProfile::Level10_1 && desc.is_multisampled() {
        STANDARD_MULTISAMPLE_PATTERN
    } else {
        0
    };

    let (dimension, height, depth_or_array_size) = match desc.dimension {
        TextureDimension::Texture1D => (NativeTextureDimension::Texture1D, 1, desc.array_size),
        TextureDimension::Texture2D | TextureDimension::TextureCube => {
            (NativeTextureDimension::Texture2D, desc.height, desc.array_size)
        }
        TextureDimension::Texture3D => {
            (NativeTextureDimension::Texture3D, desc.height, desc.depth)
        }
    };

    let misc_flags = if desc.dimension == TextureDimension::TextureCube {
        ResourceMiscFlags::TextureCube.into()
    } else {
        misc_flags(desc.options)
    };

    Ok(NativeTextureDesc {
        dimension,
        width: desc.width,
        height,
        depth_or_array_size,
        mip_levels: desc.mip_levels,
        format,
        sample_desc: SampleDesc {
            count: desc.multisample_count.count(),
            quality,
        },
        usage: desc.usage,
        bind_flags: bind_flags(desc.flags),
        cpu_access_flags: cpu_access_flags(desc.usage),
        misc_flags,
    })
}

pub(crate) fn texture_desc_from_native(native: &NativeTextureDesc) -> TextureDesc {
    let dimension = match native.dimension {
        NativeTextureDimension::Texture1D => TextureDimension::Texture1D,
        NativeTextureDimension::Texture2D
            if native.misc_flags.contains(ResourceMiscFlags::TextureCube) =>
        {
            TextureDimension::TextureCube
        }
        NativeTextureDimension::Texture2D => TextureDimension::Texture2D,
        NativeTextureDimension::Texture3D => TextureDimension::Texture3D,
    };

    let (depth, array_size) = match dimension {
        TextureDimension::Texture3D => (native.depth_or_array_size, 1),
        _ => (1, native.depth_or_array_size),
    };

    let multisample_count = MultisampleCount::ALL
        .into_iter()
        .find(|count| count.count() == native.sample_desc.count)
        .unwrap_or(MultisampleCount::None);

    let mut flags = BitFlags::empty();
    for (bind_flag, flag) in [
        (BindFlags::RenderTarget, TextureFlags::RenderTarget),
        (BindFlags::UnorderedAccess, TextureFlags::UnorderedAccess),
        (BindFlags::DepthStencil, TextureFlags::DepthStencil),
        (BindFlags::ShaderResource, TextureFlags::ShaderResource),
    ] {
        if native.bind_flags.contains(bind_flag) {
            flags |= flag;
        }
    }

    let mut options = BitFlags::empty();
    for (misc_flag, option) in [
        (ResourceMiscFlags::Shared, TextureOptions::Shared),
        (ResourceMiscFlags::SharedKeyedMutex, TextureOptions::SharedKeyedMutex),
        (ResourceMiscFlags::SharedNtHandle, TextureOptions::SharedNtHandle),
    ] {
        if native.misc_flags.contains(misc_flag) {
            options |= option;
        }
    }

    TextureDesc {
        dimension,
        width: native.width,
        height: native.height,
        depth,
        array_size,
        mip_levels: native.mip_levels,
        format: native.format,
        multisample_count,
        usage: native.usage,
        flags,
        options,
    }
}

/// Shader resource format reading the depth part of a depth format
pub fn depth_shader_resource_format(format: PixelFormat) -> PixelFormat {
    match format {
        PixelFormat::R16Typeless | PixelFormat::D16Unorm => PixelFormat::R16Float,
        PixelFormat::R32Typeless | PixelFormat::D32Float => PixelFormat::R32Float,
        PixelFormat::R24G8Typeless | PixelFormat::D24UnormS8Uint => {
            PixelFormat::R24UnormX8Typeless
        }
        PixelFormat::R32G8X24Typeless
        | PixelFormat::R32FloatX8X24Typeless
        | PixelFormat::D32FloatS8X24Uint => PixelFormat::R32FloatX8X24Typeless,
        _ => PixelFormat::Unknown,
    }
}

pub fn depth_view_format(format: PixelFormat) -> Result<PixelFormat, DeviceError> {
    match format {
        PixelFormat::R16Typeless | PixelFormat::D16Unorm => Ok(PixelFormat::D16Unorm),
        PixelFormat::R32Typeless | PixelFormat::D32Float => Ok(PixelFormat::D32Float),
        PixelFormat::R24G8Typeless | PixelFormat::D24UnormS8Uint => {
            Ok(PixelFormat::D24UnormS8Uint)
        }
        PixelFormat::R32G8X24Typeless | PixelFormat::D32FloatS8X24Uint => {
            Ok(PixelFormat::D32FloatS8X24Uint)
        }
        _ => Err(DeviceError::Unsupported),
    }
}

pub fn is_stencil_format(format: PixelFormat) -> bool {
    format.has_stencil()
}

/// First slice, first mip, slice count and mip count covered by a view
fn view_slice_bounds(desc: &TextureDesc, view: &TextureViewDesc) -> (u32, u32, u32, u32) {
    let is_3d = desc.dimension == TextureDimension::Texture3D;
    let size = if is_3d { desc.depth } else { desc.array_size };
    let (slice, mip) = (view.array_slice, view.mip_level);

    match view.view_type {
        ViewType::Full => (0, 0, size, desc.mip_levels),
        ViewType::Single => {
            let count = if is_3d { (desc.depth >> mip).max(1) } else { 1 };
            (slice, mip, count, 1)
        }
        ViewType::ArrayBand => (slice, mip, 1, desc.mip_levels.saturating_sub(mip)),
        ViewType::MipBand => (slice, mip, size.saturating_sub(slice), 1),
    }
}

fn shader_resource_view_desc(
    desc: &TextureDesc,
    view: &TextureViewDesc,
) -> Result<Option<ShaderResourceViewDesc>, DeviceError> {
    if !view.flags.contains(TextureFlags::ShaderResource) {
        return Ok(None);
    }

    let (slice, mip, array_count, mip_count) = view_slice_bounds(desc, view);
    let format = if desc.is_depth_stencil() {
        depth_shader_resource_format(view.format)
    } else {
        view.format
    };

    let dimension = if desc.array_size > 1 {
        if desc.dimension == TextureDimension::TextureCube {
            SrvDimension::TextureCube {
                most_detailed_mip: mip,
                mip_levels: mip_count,
            }
        } else if desc.is_multisampled() {
            if desc.dimension != TextureDimension::Texture2D {
                return Err(DeviceError::Unsupported);
            }
            SrvDimension::Texture2DMsArray {
                first_array_slice: slice,
                array_size: array_count,
            }
        } else if desc.dimension == TextureDimension::Texture2D {
            SrvDimension::Texture2DArray {
                most_detailed_mip: mip,
                mip_levels: mip_count,
                first_array_slice: slice,
                array_size: array_count,
            }
        } else {
            SrvDimension::Texture1DArray {
                most_detailed_mip: mip,
                mip_levels: mip_count,
                first_array_slice: slice,
                array_size: array_count,
            }
        }
    } else if desc.is_multisampled() {
        if desc.dimension != TextureDimension::Texture2D {
            return Err(DeviceError::Unsupported);
        }
        SrvDimension::Texture2DMs
    } else {
        match desc.dimension {
            TextureDimension::Texture1D => SrvDimension::Texture1D {
                most_detailed_mip: mip,
                mip_levels: mip_count,
            },
            TextureDimension::Texture2D => SrvDimension::Texture2D {
                most_detailed_mip: mip,
                mip_levels: mip_count,
            },
            TextureDimension::Texture3D => SrvDimension::Texture3D {
                most_detailed_mip: mip,
                mip_levels: mip_count,
            },
            // A cube needs its 6 faces
            TextureDimension::TextureCube => return Err(DeviceError::Unsupported),
        }
    };

    Ok(Some(ShaderResourceViewDesc { format, dimension }))
}

fn render_target_view_desc(
    desc: &TextureDesc,
    view: &TextureViewDesc,
) -> Result<Option<RenderTargetViewDesc>, DeviceError> {
    if !view.flags.contains(TextureFlags::RenderTarget) {
        return Ok(None);
    }

    if view.view_type == ViewType::MipBand {
        return Err(DeviceError::Unsupported);
    }

    let (slice, mip, array_count, _) = view_slice_bounds(desc, view);

    let dimension = if desc.array_size > 1 {
        if desc.is_multisampled() {
            if desc.dimension != TextureDimension::Texture2D {
                return Err(DeviceError::Unsupported);
            }
            RtvDimension::Texture2DMsArray {
                first_array_slice: slice,
                array_size: array_count,
            }
        } else {
            match desc.dimension {
                TextureDimension::Texture3D => return Err(DeviceError::Unsupported),
                TextureDimension::Texture2D | TextureDimension::TextureCube => {
                    RtvDimension::Texture2DArray {
                        mip_slice: mip,
                        first_array_slice: slice,
                        array_size: array_count,
                    }
                }
                TextureDimension::Texture1D => RtvDimension::Texture1DArray {
                    mip_slice: mip,
                    first_array_slice: slice,
                    array_size: array_count,
                },
            }
        }
    } else if desc.is_multisampled() {
        if desc.dimension != TextureDimension::Texture2D {
            return Err(DeviceError::Unsupported);
        }
        RtvDimension::Texture2DMs
    } else {
        match desc.dimension {
            TextureDimension::Texture1D => RtvDimension::Texture1D { mip_slice: mip },
            TextureDimension::Texture2D => RtvDimension::Texture2D { mip_slice: mip },
            TextureDimension::Texture3D => RtvDimension::Texture3D {
                mip_slice: mip,
                first_w_slice: slice,
                w_size: array_count,
            },
            TextureDimension::TextureCube => return Err(DeviceError::Unsupported),
        }
    };

    Ok(Some(RenderTargetViewDesc {
        format: view.format,
        dimension,
    }))
}

fn unordered_access_view_desc(
    desc: &TextureDesc,
    view: &TextureViewDesc,
) -> Result<Option<UnorderedAccessViewDesc>, DeviceError> {
    if !view.flags.contains(TextureFlags::UnorderedAccess) {
        return Ok(None);
    }

    if desc.is_multisampled() {
        return Err(DeviceError::Unsupported);
    }

    let (slice, mip, array_count, _) = view_slice_bounds(desc, view);

    let dimension = if desc.array_size > 1 {
        match desc.dimension {
            TextureDimension::Texture1D => UavDimension::Texture1DArray {
                mip_slice: mip,
                first_array_slice: slice,
                array_size: array_count,
            },
            TextureDimension::Texture2D | TextureDimension::TextureCube => {
                UavDimension::Texture2DArray {
                    mip_slice: mip,
                    first_array_slice: slice,
                    array_size: array_count,
                }
            }
            TextureDimension::Texture3D => return Err(DeviceError::Unsupported),
        }
    } else {
        match desc.dimension {
            TextureDimension::Texture1D => UavDimension::Texture1D { mip_slice: mip },
            TextureDimension::Texture2D => UavDimension::Texture2D { mip_slice: mip },
            TextureDimension::Texture3D => UavDimension::Texture3D {
                mip_slice: mip,
                first_w_slice: slice,
                w_size: array_count,
            },
            TextureDimension::TextureCube => return Err(DeviceError::Unsupported),
        }
    };

    Ok(Some(UnorderedAccessViewDesc {
        format: view.format,
        dimension,
    }))
}

fn depth_stencil_view_desc(
    profile: GraphicsProfile,
    desc: &TextureDesc,
    view: &TextureViewDesc,
) -> Result<Option<DepthStencilViewDesc>, DeviceError> {
    if !view.flags.contains(TextureFlags::DepthStencil) {
        return Ok(None);
    }

    if depth_shader_resource_format(view.format) == PixelFormat::Unknown {
        return Err(DeviceError::Unsupported);
    }

    let has_stencil = is_stencil_format(view.format);

    let dimension = if desc.is_multisampled() {
        DsvDimension::Texture2DMs
    } else if desc.array_size > 1 {
        DsvDimension::Texture2DArray {
            mip_slice: 0,
            first_array_slice: 0,
            array_size: desc.array_size,
        }
    } else {
        DsvDimension::Texture2D { mip_slice: 0 }
    };

    let mut flags = BitFlags::empty();
    if view.flags.contains(DEPTH_STENCIL_READ_ONLY) {
        if profile < GraphicsProfile::Level11_0 {
            return Err(DeviceError::Unsupported);
        }

        flags |= DsvFlags::ReadOnlyDepth;
        if has_stencil {
            flags |= DsvFlags::ReadOnlyStencil;
        }
    }

    Ok(Some(DepthStencilViewDesc {
        format: depth_view_format(view.format)?,
        flags,
        dimension,
    }))
}

fn mip_count_from_size(mut size: u32, minimum_last_mip_size: u32) -> Result<u32, DeviceError> {
    if size == 0 || minimum_last_mip_size == 0 {
        return Err(DeviceError::InvalidParameters);
    }

    let mut level = 1;
    while size / 2 >= minimum_last_mip_size {
        size = (size / 2).max(1);
        level += 1;
    }
    Ok(level)
}

/// Number of mips until either axis goes below `minimum_last_mip_size`
pub fn calculate_mip_count(
    width: u32,
    height: u32,
    minimum_last_mip_size: u32,
) -> Result<u32, DeviceError> {
    Ok(mip_count_from_size(width, minimum_last_mip_size)?
        .min(mip_count_from_size(height, minimum_last_mip_size)?))
}

/// Below 10_0, compressed mips must stay at least one block wide
pub fn check_mip_levels(
    profile: GraphicsProfile,
    desc: &TextureDesc,
) -> Result<TextureDesc, DeviceError> {
    let mut desc = *desc;
    if profile < GraphicsProfile::Level10_0
        && !desc.is_depth_stencil()
        && desc.format.is_compressed()
    {
        desc.mip_levels = calculate_mip_count(
            desc.width,
            desc.height,
            DEFAULT_MINIMUM_LAST_MIP_SIZE,
        )?
        .min(desc.mip_levels);
    }
    Ok(desc)
}

#[cfg(test)]
mod tests {
    use crate::device::resource::GraphicsResource;
    use crate::device::tests::{test_device, test_device_at};
    use crate::device::texture::{
        calculate_mip_count, check_mip_levels, depth_shader_resource_format, native_texture_desc,
        texture_desc_from_native, Texture, STANDARD_MULTISAMPLE_PATTERN,
    };
    use crate::native::desc::{
        BindFlags, DsvDimension, DsvFlags, NativeTextureDimension, ResourceMiscFlags,
        RtvDimension, SrvDimension, UavDimension,
    };
    use crate::null::{object_kind, NullObjectClass, NullObjectKind};
    use ze_gfx::backend::{DeviceError, GraphicsProfile};
    use ze_gfx::resource::{
        GraphicsResourceUsage, MultisampleCount, TextureDesc, TextureDimension, TextureFlags,
        TextureOptions, TextureViewDesc, ViewType, DEPTH_STENCIL_READ_ONLY,
    };
    use ze_gfx::PixelFormat;

    fn depth_desc(flags: enumflags2::BitFlags<TextureFlags>) -> TextureDesc {
        TextureDesc::new_2d(256, 256, PixelFormat::D24UnormS8Uint, flags)
    }

    fn srv_dimension(texture: &Texture) -> SrvDimension {
        match object_kind(texture.native_shader_resource_view().unwrap()) {
            Some(NullObjectKind::ShaderResourceView(_, desc)) => desc.dimension,
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn depth_uses_typeless_storage() {
        let desc = depth_desc(TextureFlags::DepthStencil | TextureFlags::ShaderResource);
        let native = native_texture_desc(GraphicsProfile::Level11_0, &desc).unwrap();
        assert_eq!(native.format, PixelFormat::R24G8Typeless);
        assert_eq!(
            native.bind_flags,
            BindFlags::DepthStencil | BindFlags::ShaderResource
        );

        let mut desc = depth_desc(TextureFlags::DepthStencil.into());
        desc.format = PixelFormat::R8G8B8A8Unorm;
        assert_eq!(
            native_texture_desc(GraphicsProfile::Level11_0, &desc).err(),
            Some(DeviceError::Unsupported)
        );
    }

    #[test]
    fn depth_below_10_0() {
        let desc = depth_desc(TextureFlags::DepthStencil.into());
        let native = native_texture_desc(GraphicsProfile::Level9_3, &desc).unwrap();
        assert_eq!(native.format, PixelFormat::D24UnormS8Uint);

        let desc = depth_desc(TextureFlags::DepthStencil | TextureFlags::ShaderResource);
        assert_eq!(
            native_texture_desc(GraphicsProfile::Level9_3, &desc).err(),
            Some(DeviceError::Unsupported)
        );
    }

    #[test]
    fn multisample_quality() {
        let mut desc = TextureDesc::new_2d(
            64,
            64,
            PixelFormat::R8G8B8A8Unorm,
            TextureFlags::RenderTarget.into(),
        );
        desc.multisample_count = MultisampleCount::X4;

        let native = native_texture_desc(GraphicsProfile::Level10_1, &desc).unwrap();
        assert_eq!(native.sample_desc.count, 4);
        assert_eq!(native.sample_desc.quality, STANDARD_MULTISAMPLE_PATTERN);

        let native = native_texture_desc(GraphicsProfile::Level10_0, &desc).unwrap();
        assert_eq!(native.sample_desc.quality, 0);
    }

    #[test]
    fn cube_overrides_options() {
        let mut desc = TextureDesc::new_2d(
            32,
            32,
            PixelFormat::R16G16B16A16Float,
            TextureFlags::ShaderResource.into(),
        );
        desc.dimension = TextureDimension::TextureCube;
        desc.array_size = 6;
        desc.options = TextureOptions::Shared.into();

        let native = native_texture_desc(GraphicsProfile::Level11_0, &desc).unwrap();
        assert_eq!(native.dimension, NativeTextureDimension::Texture2D);
        assert_eq!(native.depth_or_array_size, 6);
        assert_eq!(native.misc_flags, ResourceMiscFlags::TextureCube);

        let read_back = texture_desc_from_native(&native);
        assert_eq!(read_back.dimension, TextureDimension::TextureCube);
        assert_eq!(read_back.array_size, 6);
    }

    #[test]
    fn mip_counts() {
        assert_eq!(calculate_mip_count(256, 256, 4), Ok(7));
        assert_eq!(calculate_mip_count(256, 16, 4), Ok(3));
        assert_eq!(calculate_mip_count(3, 3, 4), Ok(1));
        assert_eq!(calculate_mip_count(1024, 1024, 1), Ok(11));
        assert_eq!(
            calculate_mip_count(0, 16, 4),
            Err(DeviceError::InvalidParameters)
        );

        let mut desc = TextureDesc::new_2d(
            64,
            64,
            PixelFormat::BC1Unorm,
            TextureFlags::ShaderResource.into(),
        );
        desc.mip_levels = 7;
        assert_eq!(
            check_mip_levels(GraphicsProfile::Level9_3, &desc)
                .unwrap()
                .mip_levels,
            5
        );
        assert_eq!(
            check_mip_levels(GraphicsProfile::Level10_0, &desc)
                .unwrap()
                .mip_levels,
            7
        );
    }

    #[test]
    fn depth_views() {
        let (device, _) = test_device();
        let texture = Texture::new(
            &device,
            &depth_desc(TextureFlags::DepthStencil | TextureFlags::ShaderResource),
            &[],
        )
        .unwrap();
        assert!(texture.has_stencil());

        match object_kind(texture.native_shader_resource_view().unwrap()) {
            Some(NullObjectKind::ShaderResourceView(_, desc)) => {
                assert_eq!(desc.format, PixelFormat::R24UnormX8Typeless);
                assert_eq!(
                    desc.dimension,
                    SrvDimension::Texture2D {
                        most_detailed_mip: 0,
                        mip_levels: 1
                    }
                );
            }
            other => panic!("unexpected view {:?}", other),
        }

        match object_kind(texture.native_depth_stencil_view().unwrap()) {
            Some(NullObjectKind::DepthStencilView(_, desc)) => {
                assert_eq!(desc.format, PixelFormat::D24UnormS8Uint);
                assert!(desc.flags.is_empty());
                assert_eq!(desc.dimension, DsvDimension::Texture2D { mip_slice: 0 });
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn read_only_depth_view() {
        let (device, _) = test_device();
        let texture = Texture::new(&device, &depth_desc(DEPTH_STENCIL_READ_ONLY), &[]).unwrap();
        match object_kind(texture.native_depth_stencil_view().unwrap()) {
            Some(NullObjectKind::DepthStencilView(_, desc)) => assert_eq!(
                desc.flags,
                DsvFlags::ReadOnlyDepth | DsvFlags::ReadOnlyStencil
            ),
            other => panic!("unexpected view {:?}", other),
        }

        let (device, _) = test_device_at(GraphicsProfile::Level10_1);
        assert_eq!(
            Texture::new(&device, &depth_desc(DEPTH_STENCIL_READ_ONLY), &[]).err(),
            Some(DeviceError::Unsupported)
        );
    }

    #[test]
    fn depth_srv_formats() {
        assert_eq!(
            depth_shader_resource_format(PixelFormat::D16Unorm),
            PixelFormat::R16Float
        );
        assert_eq!(
            depth_shader_resource_format(PixelFormat::R32Typeless),
            PixelFormat::R32Float
        );
        assert_eq!(
            depth_shader_resource_format(PixelFormat::D32FloatS8X24Uint),
            PixelFormat::R32FloatX8X24Typeless
        );
        assert_eq!(
            depth_shader_resource_format(PixelFormat::R8G8B8A8Unorm),
            PixelFormat::Unknown
        );
    }

    #[test]
    fn array_views() {
        let (device, _) = test_device();
        let mut desc = TextureDesc::new_2d(
            128,
            128,
            PixelFormat::R8G8B8A8Unorm,
            TextureFlags::ShaderResource | TextureFlags::RenderTarget | TextureFlags::UnorderedAccess,
        );
        desc.array_size = 4;
        desc.mip_levels = 3;
        let texture = Texture::new(&device, &desc, &[]).unwrap();

        assert_eq!(
            srv_dimension(&texture),
            SrvDimension::Texture2DArray {
                most_detailed_mip: 0,
                mip_levels: 3,
                first_array_slice: 0,
                array_size: 4
            }
        );

        let band = texture
            .new_view(&TextureViewDesc {
                format: PixelFormat::R8G8B8A8Unorm,
                view_type: ViewType::ArrayBand,
                array_slice: 2,
                mip_level: 1,
                flags: TextureFlags::ShaderResource | TextureFlags::UnorderedAccess,
            })
            .unwrap();
        assert!(band.is_view());
        assert!(band.native_render_target_view().is_none());
        assert_eq!(
            srv_dimension(&band),
            SrvDimension::Texture2DArray {
                most_detailed_mip: 1,
                mip_levels: 2,
                first_array_slice: 2,
                array_size: 1
            }
        );
        match object_kind(band.native_unordered_access_view().unwrap()) {
            Some(NullObjectKind::UnorderedAccessView(resource, desc)) => {
                assert_eq!(resource, texture.native_texture());
                assert_eq!(
                    desc.dimension,
                    UavDimension::Texture2DArray {
                        mip_slice: 1,
                        first_array_slice: 2,
                        array_size: 1
                    }
                );
            }
            other => panic!("unexpected view {:?}", other),
        }

        let mip_band = TextureViewDesc {
            format: PixelFormat::R8G8B8A8Unorm,
            view_type: ViewType::MipBand,
            array_slice: 1,
            mip_level: 2,
            flags: TextureFlags::RenderTarget.into(),
        };
        assert_eq!(
            texture.new_view(&mip_band).err(),
            Some(DeviceError::Unsupported)
        );
    }

    #[test]
    fn volume_render_target_slices() {
        let (device, _) = test_device();
        let mut desc = TextureDesc::new_2d(
            32,
            32,
            PixelFormat::R16Float,
            TextureFlags::RenderTarget.into(),
        );
        desc.dimension = TextureDimension::Texture3D;
        desc.depth = 16;
        desc.mip_levels = 2;
        let texture = Texture::new(&device, &desc, &[]).unwrap();

        let single = texture
            .new_view(&TextureViewDesc {
                format: PixelFormat::R16Float,
                view_type: ViewType::Single,
                array_slice: 0,
                mip_level: 1,
                flags: TextureFlags::RenderTarget.into(),
            })
            .unwrap();
        match object_kind(single.native_render_target_view().unwrap()) {
            Some(NullObjectKind::RenderTargetView(_, desc)) => assert_eq!(
                desc.dimension,
                RtvDimension::Texture3D {
                    mip_slice: 1,
                    first_w_slice: 0,
                    w_size: 8
                }
            ),
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn multisampled_views() {
        let (device, _) = test_device();
        let mut desc = TextureDesc::new_2d(
            64,
            64,
            PixelFormat::R8G8B8A8Unorm,
            TextureFlags::ShaderResource | TextureFlags::RenderTarget,
        );
        desc.multisample_count = MultisampleCount::X4;
        let texture = Texture::new(&device, &desc, &[]).unwrap();
        assert_eq!(srv_dimension(&texture), SrvDimension::Texture2DMs);

        desc.flags |= TextureFlags::UnorderedAccess;
        assert_eq!(
            Texture::new(&device, &desc, &[]).err(),
            Some(DeviceError::Unsupported)
        );
    }

    #[test]
    fn cube_shader_resource() {
        let (device, _) = test_device();
        let mut desc = TextureDesc::new_2d(
            16,
            16,
            PixelFormat::R8G8B8A8Unorm,
            TextureFlags::ShaderResource.into(),
        );
        desc.dimension = TextureDimension::TextureCube;
        desc.array_size = 6;
        desc.mip_levels = 5;
        let texture = Texture::new(&device, &desc, &[]).unwrap();
        assert_eq!(
            srv_dimension(&texture),
            SrvDimension::TextureCube {
                most_detailed_mip: 0,
                mip_levels: 5
            }
        );

        desc.array_size = 1;
        assert_eq!(
            Texture::new(&device, &desc, &[]).err(),
            Some(DeviceError::Unsupported)
        );
    }

    #[test]
    fn shared_handles() {
        let (device, _) = test_device();
        let mut desc = TextureDesc::new_2d(
            64,
            64,
            PixelFormat::B8G8R8A8Unorm,
            TextureFlags::RenderTarget.into(),
        );

        desc.options = TextureOptions::Shared.into();
        let shared = Texture::new(&device, &desc, &[]).unwrap();
        assert!(shared.shared_handle().is_some());
        assert!(shared.shared_nt_handle_name().is_none());

        desc.options = TextureOptions::SharedNtHandle | TextureOptions::SharedKeyedMutex;
        let nt = Texture::new(&device, &desc, &[]).unwrap();
        assert!(nt.shared_handle().is_some());
        assert!(nt.shared_nt_handle_name().unwrap().starts_with("ze:"));

        desc.options = TextureOptions::SharedNtHandle.into();
        assert_eq!(
            Texture::new(&device, &desc, &[]).err(),
            Some(DeviceError::InvalidParameters)
        );
    }

    #[test]
    fn wrapped_textures() {
        let (device, _) = test_device();
        let owner = Texture::new(
            &device,
            &TextureDesc::new_2d(
                1280,
                720,
                PixelFormat::R8G8B8A8Unorm,
                TextureFlags::RenderTarget | TextureFlags::ShaderResource,
            ),
            &[],
        )
        .unwrap();
        let memory = device.texture_memory();
        assert_eq!(memory, 1280 * 720 * 4);

        let wrapped = Texture::from_native(&device, owner.native_texture().clone(), true).unwrap();
        assert_eq!(wrapped.desc().format, PixelFormat::R8G8B8A8UnormSrgb);
        assert_eq!(wrapped.width(), 1280);
        assert!(wrapped.desc().is_render_target());
        assert_eq!(device.texture_memory(), memory);

        drop(wrapped);
        assert_eq!(device.texture_memory(), memory);
        drop(owner);
        assert_eq!(device.texture_memory(), 0);
    }

    #[test]
    fn recreate_after_reset() {
        let (device, _) = test_device();
        let mut render_target = Texture::new(
            &device,
            &TextureDesc::new_2d(
                8,
                8,
                PixelFormat::R8G8B8A8Unorm,
                TextureFlags::RenderTarget.into(),
            ),
            &[],
        )
        .unwrap();
        let before = render_target.native_texture().clone();
        assert_eq!(render_target.on_recreate(), Ok(true));
        assert_ne!(render_target.native_texture(), &before);
        assert_ne!(
            render_target.native_render_target_view(),
            None
        );

        let mut static_texture = Texture::new(
            &device,
            &TextureDesc::new_2d(
                8,
                8,
                PixelFormat::R8G8B8A8Unorm,
                TextureFlags::ShaderResource.into(),
            ),
            &[],
        )
        .unwrap();
        assert_eq!(static_texture.on_recreate(), Ok(false));

        let mut desc = *static_texture.desc();
        desc.usage = GraphicsResourceUsage::Dynamic;
        let mut dynamic = Texture::new(&device, &desc, &[]).unwrap();
        assert_eq!(dynamic.on_recreate(), Ok(true));
    }

    #[test]
    fn failed_creation_keeps_memory_balanced() {
        let (device, adapter) = test_device();
        let native = adapter.last_device().unwrap();
        let mut desc = TextureDesc::new_2d(
            64,
            64,
            PixelFormat::R8G8B8A8Unorm,
            TextureFlags::ShaderResource | TextureFlags::UnorderedAccess,
        );
        desc.multisample_count = MultisampleCount::X4;
        assert_eq!(
            Texture::new(&device, &desc, &[]).err(),
            Some(DeviceError::Unsupported)
        );
        assert_eq!(device.texture_memory(), 0);

        desc.multisample_count = MultisampleCount::None;
        native.fail_next_creation(NullObjectClass::View);
        assert_eq!(
            Texture::new(&device, &desc, &[]).err(),
            Some(DeviceError::OutOfMemory)
        );
        assert_eq!(device.texture_memory(), 0);
    }

    #[test]
    fn failed_recreate_keeps_the_previous_texture() {
        let (device, adapter) = test_device();
        let native = adapter.last_device().unwrap();
        let mut texture = Texture::new(
            &device,
            &TextureDesc::new_2d(
                8,
                8,
                PixelFormat::R8G8B8A8Unorm,
                TextureFlags::ShaderResource | TextureFlags::RenderTarget,
            ),
            &[],
        )
        .unwrap();
        let texture_before = texture.native_texture().clone();
        let srv_before = texture.native_shader_resource_view().cloned();
        let rtv_before = texture.native_render_target_view().cloned();

        native.fail_next_creation(NullObjectClass::View);
        assert_eq!(texture.recreate(&[]), Err(DeviceError::OutOfMemory));
        assert_eq!(texture.native_texture(), &texture_before);
        assert_eq!(texture.native_shader_resource_view().cloned(), srv_before);
        assert_eq!(texture.native_render_target_view().cloned(), rtv_before);
        assert_eq!(
            device.texture_memory(),
            texture.size_in_bytes() as i64
        );
    }

    #[test]
    fn debug_names() {
        let (device, adapter) = test_device();
        let native = adapter.last_device().unwrap();
        let mut texture = Texture::new(
            &device,
            &depth_desc(TextureFlags::DepthStencil | TextureFlags::ShaderResource),
            &[],
        )
        .unwrap();
        texture.set_name("Shadow map");
        assert_eq!(
            native.debug_name(texture.native_depth_stencil_view().unwrap()),
            Some("Shadow map DSV".to_string())
        );
        assert_eq!(
            native.debug_name(texture.native_shader_resource_view().unwrap()),
            Some("Shadow map SRV".to_string())
        );
    }
}
