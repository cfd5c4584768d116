use crate::d3d11::context::D3D11Context;
use crate::d3d11::device::D3D11Device;
use crate::d3d11::{conv, convert_error, created, typed, wrap, SendableIUnknown};
use crate::native::desc::*;
use crate::native::*;
use enumflags2::BitFlags;
use raw_window_handle::RawWindowHandle;
use std::sync::Arc;
use windows::core::{IUnknown, Interface};
use windows::w;
use windows::Win32::Foundation::{BOOL, HINSTANCE, HWND};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use ze_core::maths::RectI32;
use ze_gfx::backend::{DeviceCreationFlags, DeviceError, GraphicsProfile};
use ze_gfx::PixelFormat;

fn wide_to_string(wide: &[u16]) -> String {
    let length = wide.iter().position(|c| *c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..length])
}

fn hwnd(window: RawWindowHandle) -> Result<HWND, DeviceError> {
    match window {
        RawWindowHandle::Win32(handle) if !handle.hwnd.is_null() => Ok(HWND(handle.hwnd as isize)),
        _ => Err(DeviceError::InvalidParameters),
    }
}

pub struct DxgiFactory {
    factory: SendableIUnknown<IDXGIFactory1>,
}

impl DxgiFactory {
    pub fn new() -> Result<Self, DeviceError> {
        let factory = unsafe { CreateDXGIFactory1::<IDXGIFactory1>() }.map_err(convert_error)?;
        Ok(Self {
            factory: factory.into(),
        })
    }
}

impl NativeFactory for DxgiFactory {
    fn enum_adapters(&self) -> NativeResult<Vec<Arc<dyn NativeAdapter>>> {
        let mut adapters: Vec<Arc<dyn NativeAdapter>> = vec![];
        let mut adapter_index = 0;
        while let Ok(adapter) = unsafe { self.factory.EnumAdapters1(adapter_index) } {
            adapters.push(Arc::new(DxgiAdapter {
                adapter: adapter.into(),
            }));
            adapter_index += 1;
        }
        Ok(adapters)
    }

    fn is_graphics_debugger_attached(&self) -> bool {
        unsafe { GetModuleHandleW(w!("renderdoc.dll")) }.is_ok()
    }

    fn create_swap_chain(
        &self,
        device: &dyn NativeDevice,
        window: RawWindowHandle,
        desc: &SwapChainDesc,
    ) -> NativeResult<Box<dyn NativeSwapChain>> {
        let device = device.as_native_object();
        let device = typed::<ID3D11Device>(&device)?;

        let native_desc = DXGI_SWAP_CHAIN_DESC {
            BufferDesc: conv::mode_desc(&desc.mode),
            SampleDesc: conv::sample_desc(desc.sample_desc),
            BufferUsage: DXGI_USAGE_BACK_BUFFER | DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: desc.buffer_count,
            OutputWindow: hwnd(window)?,
            Windowed: BOOL::from(desc.windowed),
            SwapEffect: match desc.swap_effect {
                SwapEffect::Discard => DXGI_SWAP_EFFECT_DISCARD,
                SwapEffect::Sequential => DXGI_SWAP_EFFECT_SEQUENTIAL,
                SwapEffect::FlipSequential => DXGI_SWAP_EFFECT_FLIP_SEQUENTIAL,
                SwapEffect::FlipDiscard => DXGI_SWAP_EFFECT_FLIP_DISCARD,
            },
            Flags: desc.flags.bits(),
        };

        let mut swap_chain = None;
        unsafe {
            self.factory
                .CreateSwapChain(device, &native_desc, &mut swap_chain)
                .ok()
                .map_err(convert_error)?;
        }

        Ok(Box::new(DxgiSwapChain {
            swap_chain: created(swap_chain)?.into(),
        }))
    }

    fn make_window_association(
        &self,
        window: RawWindowHandle,
        flags: BitFlags<WindowAssociationFlags>,
    ) -> NativeResult<()> {
        unsafe {
            self.factory
                .MakeWindowAssociation(hwnd(window)?, flags.bits())
                .map_err(convert_error)
        }
    }
}

pub struct DxgiAdapter {
    adapter: SendableIUnknown<IDXGIAdapter1>,
}

fn device_creation_flags(flags: BitFlags<DeviceCreationFlags>) -> D3D11_CREATE_DEVICE_FLAG {
    let mut native = D3D11_CREATE_DEVICE_FLAG(0);
    for flag in flags.iter() {
        native |= match flag {
            DeviceCreationFlags::Debug => D3D11_CREATE_DEVICE_DEBUG,
            DeviceCreationFlags::VideoSupport => D3D11_CREATE_DEVICE_VIDEO_SUPPORT,
            DeviceCreationFlags::BgraSupport => D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            DeviceCreationFlags::SingleThreaded => D3D11_CREATE_DEVICE_SINGLETHREADED,
            DeviceCreationFlags::PreventThreadingOptimizations => {
                D3D11_CREATE_DEVICE_PREVENT_INTERNAL_THREADING_OPTIMIZATIONS
            }
        };
    }
    native
}

impl NativeAdapter for DxgiAdapter {
    fn desc(&self) -> AdapterDesc {
        match unsafe { self.adapter.GetDesc1() } {
            Ok(desc) => AdapterDesc {
                description: wide_to_string(&desc.Description),
                vendor_id: desc.VendorId,
                device_id: desc.DeviceId,
                dedicated_video_memory: desc.DedicatedVideoMemory as u64,
                luid: (desc.AdapterLuid.HighPart, desc.AdapterLuid.LowPart),
            },
            Err(_) => AdapterDesc {
                description: String::new(),
                vendor_id: 0,
                device_id: 0,
                dedicated_video_memory: 0,
                luid: (0, 0),
            },
        }
    }

    fn enum_outputs(&self) -> NativeResult<Vec<Arc<dyn NativeOutput>>> {
        let mut outputs: Vec<Arc<dyn NativeOutput>> = vec![];
        let mut output_index = 0;
        while let Ok(output) = unsafe { self.adapter.EnumOutputs(output_index) } {
            outputs.push(Arc::new(DxgiOutput {
                output: output.into(),
            }));
            output_index += 1;
        }
        Ok(outputs)
    }

    fn create_device(
        &self,
        levels: &[GraphicsProfile],
        flags: BitFlags<DeviceCreationFlags>,
    ) -> NativeResult<NativeDeviceHandles> {
        let levels: Vec<D3D_FEATURE_LEVEL> = levels.iter().map(|l| conv::feature_level(*l)).collect();
        let mut device = None;
        let mut context = None;
        unsafe {
            D3D11CreateDevice(
                &*self.adapter,
                D3D_DRIVER_TYPE_UNKNOWN,
                HINSTANCE::default(),
                device_creation_flags(flags),
                Some(&levels),
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
            .map_err(convert_error)?;
        }

        let device = created(device)?;
        let context = created(context)?;
        Ok(NativeDeviceHandles {
            device: Arc::new(D3D11Device::new(device)),
            immediate_context: Box::new(D3D11Context::new(context)),
        })
    }

    fn is_feature_level_supported(&self, level: GraphicsProfile) -> bool {
        let levels = [conv::feature_level(level)];
        unsafe {
            D3D11CreateDevice(
                &*self.adapter,
                D3D_DRIVER_TYPE_UNKNOWN,
                HINSTANCE::default(),
                D3D11_CREATE_DEVICE_FLAG(0),
                Some(&levels),
                D3D11_SDK_VERSION,
                None,
                None,
                None,
            )
        }
        .is_ok()
    }
}

pub struct DxgiOutput {
    output: SendableIUnknown<IDXGIOutput>,
}

impl NativeOutput for DxgiOutput {
    fn desc(&self) -> NativeResult<OutputDesc> {
        let desc = unsafe { self.output.GetDesc() }.map_err(convert_error)?;
        let rect = desc.DesktopCoordinates;
        Ok(OutputDesc {
            device_name: wide_to_string(&desc.DeviceName),
            desktop_coordinates: RectI32::new(
                rect.left,
                rect.top,
                rect.right - rect.left,
                rect.bottom - rect.top,
            ),
            attached_to_desktop: desc.AttachedToDesktop.as_bool(),
        })
    }

    fn display_mode_list(&self, format: PixelFormat) -> NativeResult<Vec<NativeModeDesc>> {
        let format = conv::format(format);
        let mut count = 0;
        unsafe {
            self.output
                .GetDisplayModeList(format, DXGI_ENUM_MODES_INTERLACED | DXGI_ENUM_MODES_SCALING, &mut count, None)
                .map_err(convert_error)?;
        }

        let mut modes = vec![DXGI_MODE_DESC::default(); count as usize];
        if count > 0 {
            unsafe {
                self.output
                    .GetDisplayModeList(format, DXGI_ENUM_MODES_INTERLACED | DXGI_ENUM_MODES_SCALING, &mut count, Some(modes.as_mut_ptr()))
                    .map_err(convert_error)?;
            }
        }
        modes.truncate(count as usize);
        Ok(modes.iter().map(conv::native_mode_desc).collect())
    }

    fn find_closest_matching_mode(
        &self,
        mode: &NativeModeDesc,
        device: Option<&dyn NativeDevice>,
    ) -> NativeResult<NativeModeDesc> {
        let concerned_device: Option<IUnknown> = match device {
            Some(device) => {
                let device = device.as_native_object();
                Some(typed::<ID3D11Device>(&device)?.cast().map_err(convert_error)?)
            }
            None => None,
        };

        let mut closest = DXGI_MODE_DESC::default();
        unsafe {
            self.output
                .FindClosestMatchingMode(&conv::mode_desc(mode), &mut closest, concerned_device.as_ref())
                .map_err(convert_error)?;
        }
        Ok(conv::native_mode_desc(&closest))
    }

    fn as_native_object(&self) -> NativeObject {
        wrap(self.output.0.clone())
    }
}

pub struct DxgiSwapChain {
    swap_chain: SendableIUnknown<IDXGISwapChain>,
}

impl NativeSwapChain for DxgiSwapChain {
    fn desc(&self) -> NativeResult<SwapChainDesc> {
        let desc = unsafe { self.swap_chain.GetDesc() }.map_err(convert_error)?;
        Ok(SwapChainDesc {
            mode: conv::native_mode_desc(&desc.BufferDesc),
            sample_desc: ze_gfx::SampleDesc {
                count: desc.SampleDesc.Count,
                quality: desc.SampleDesc.Quality,
            },
            buffer_count: desc.BufferCount,
            windowed: desc.Windowed.as_bool(),
            swap_effect: match desc.SwapEffect {
                DXGI_SWAP_EFFECT_SEQUENTIAL => SwapEffect::Sequential,
                DXGI_SWAP_EFFECT_FLIP_SEQUENTIAL => SwapEffect::FlipSequential,
                DXGI_SWAP_EFFECT_FLIP_DISCARD => SwapEffect::FlipDiscard,
                _ => SwapEffect::Discard,
            },
            flags: BitFlags::from_bits_truncate(desc.Flags),
        })
    }

    fn buffer(&self, index: u32) -> NativeResult<NativeObject> {
        let buffer =
            unsafe { self.swap_chain.GetBuffer::<ID3D11Texture2D>(index) }.map_err(convert_error)?;
        Ok(wrap(buffer))
    }

    fn present(&mut self, sync_interval: u32) -> NativeResult<()> {
        unsafe { self.swap_chain.Present(sync_interval, 0) }
            .ok()
            .map_err(convert_error)
    }

    fn resize_buffers(
        &mut self,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        flags: BitFlags<SwapChainFlags>,
    ) -> NativeResult<()> {
        unsafe {
            self.swap_chain
                .ResizeBuffers(buffer_count, width, height, conv::format(format), flags.bits())
                .map_err(convert_error)
        }
    }

    fn resize_target(&mut self, mode: &NativeModeDesc) -> NativeResult<()> {
        unsafe {
            self.swap_chain
                .ResizeTarget(&conv::mode_desc(mode))
                .map_err(convert_error)
        }
    }

    fn set_fullscreen_state(
        &mut self,
        fullscreen: bool,
        output: Option<&NativeObject>,
    ) -> NativeResult<()> {
        let output = match output {
            Some(output) => Some(typed::<IDXGIOutput>(output)?.clone()),
            None => None,
        };
        unsafe {
            self.swap_chain
                .SetFullscreenState(fullscreen, output.as_ref())
                .map_err(convert_error)
        }
    }

    fn fullscreen_state(&self) -> NativeResult<bool> {
        let mut fullscreen = BOOL::default();
        unsafe {
            self.swap_chain
                .GetFullscreenState(Some(&mut fullscreen), None)
                .map_err(convert_error)?;
        }
        Ok(fullscreen.as_bool())
    }

    fn fullscreen_output(&self) -> NativeResult<Option<NativeObject>> {
        let mut fullscreen = BOOL::default();
        let mut output: Option<IDXGIOutput> = None;
        unsafe {
            self.swap_chain
                .GetFullscreenState(Some(&mut fullscreen), Some(&mut output))
                .map_err(convert_error)?;
        }
        Ok(output.filter(|_| fullscreen.as_bool()).map(wrap))
    }
}

