use crate::device::texture::Texture;
use crate::device::GraphicsDevice;
use crate::native::desc::{
    ModeScaling, NativeModeDesc, ScanlineOrdering, SwapChainDesc, SwapChainFlags, SwapEffect,
    WindowAssociationFlags,
};
use crate::native::{NativeObject, NativeSwapChain};
use enumflags2::BitFlags;
use raw_window_handle::RawWindowHandle;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use ze_core::ze_info;
use ze_gfx::backend::{
    DeviceError, GraphicsDeviceStatus, PresentInterval, PresentationParameters, Rational,
};
use ze_gfx::resource::{TextureDesc, TextureFlags};
use ze_gfx::{PixelFormat, SampleDesc};

const BUFFER_COUNT: u32 = 1;

/// A failed present, with the device status observed right after it
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PresentError {
    pub status: GraphicsDeviceStatus,
    pub error: DeviceError,
}

impl Display for PresentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unexpected error on present: {} (device status: {:?})",
            self.error, self.status
        )
    }
}

impl std::error::Error for PresentError {}

/// Presents to a window through a DXGI swap chain
pub struct SwapChainGraphicsPresenter {
    device: Arc<GraphicsDevice>,
    desc: PresentationParameters,
    window: RawWindowHandle,
    swap_chain: Option<Box<dyn NativeSwapChain>>,
    back_buffer: Option<Texture>,
    depth_stencil_buffer: Option<Texture>,
    forced_present_interval: Option<PresentInterval>,
}

impl SwapChainGraphicsPresenter {
    pub fn new(
        device: &Arc<GraphicsDevice>,
        desc: &PresentationParameters,
    ) -> Result<Self, DeviceError> {
        let window = match desc.device_window_handle {
            Some(RawWindowHandle::Win32(handle)) if !handle.hwnd.is_null() => {
                RawWindowHandle::Win32(handle)
            }
            _ => return Err(DeviceError::InvalidParameters),
        };

        let mut presenter = Self {
            device: device.clone(),
            desc: desc.clone(),
            window,
            swap_chain: None,
            back_buffer: None,
            depth_stencil_buffer: None,
            forced_present_interval: None,
        };

        presenter.create_swap_chain()?;
        presenter.create_depth_stencil_buffer()?;
        Ok(presenter)
    }

    pub fn desc(&self) -> &PresentationParameters {
        &self.desc
    }

    pub fn back_buffer(&self) -> Option<&Texture> {
        self.back_buffer.as_ref()
    }

    pub fn depth_stencil_buffer(&self) -> Option<&Texture> {
        self.depth_stencil_buffer.as_ref()
    }

    /// Overrides the configured present interval, e.g. to uncap benchmarks
    pub fn set_forced_present_interval(&mut self, interval: Option<PresentInterval>) {
        self.forced_present_interval = interval;
    }

    pub fn present_interval(&self) -> PresentInterval {
        self.desc.present_interval
    }

    pub fn set_present_interval(&mut self, interval: PresentInterval) {
        self.desc.present_interval = interval;
    }

    fn swap_chain(&mut self) -> Result<&mut Box<dyn NativeSwapChain>, DeviceError> {
        self.swap_chain.as_mut().ok_or(DeviceError::InvalidOperation)
    }

    fn preferred_output(&self) -> Option<NativeObject> {
        self.device
            .adapter()
            .outputs()
            .get(self.desc.preferred_full_screen_output_index)
            .map(|output| output.native_output())
    }

    fn back_buffer_mode(&self, width: u32, height: u32, refresh_rate: Rational) -> NativeModeDesc {
        NativeModeDesc {
            width,
            height,
            refresh_rate,
            format: self.desc.back_buffer_format,
            scanline_ordering: ScanlineOrdering::Unspecified,
            scaling: ModeScaling::Unspecified,
        }
    }

    fn create_swap_chain(&mut self) -> Result<(), DeviceError> {
        let flags = if self.desc.is_full_screen {
            BitFlags::from(SwapChainFlags::AllowModeSwitch)
        } else {
            BitFlags::empty()
        };

        // Created windowed, fullscreen is entered afterwards
        let swap_chain_desc = SwapChainDesc {
            mode: self.back_buffer_mode(
                self.desc.back_buffer_width,
                self.desc.back_buffer_height,
                self.desc.refresh_rate,
            ),
            sample_desc: SampleDesc {
                count: self.desc.multisample_count.count(),
                quality: 0,
            },
            buffer_count: BUFFER_COUNT,
            windowed: true,
            swap_effect: SwapEffect::Discard,
            flags,
        };

        let factory = self.device.adapter().native_factory().clone();
        let mut swap_chain = factory.create_swap_chain(
            self.device.native_device().as_ref(),
            self.window,
            &swap_chain_desc,
        )?;

        factory.make_window_association(self.window, WindowAssociationFlags::NoAltEnter.into())?;

        if self.desc.is_full_screen {
            swap_chain.resize_target(&swap_chain_desc.mode)?;
            swap_chain.set_fullscreen_state(true, self.preferred_output().as_ref())?;
            swap_chain.resize_buffers(
                BUFFER_COUNT,
                self.desc.back_buffer_width,
                self.desc.back_buffer_height,
                self.desc.back_buffer_format,
                flags,
            )?;
        }

        let back_buffer = Texture::from_native(
            &self.device,
            swap_chain.buffer(0)?,
            self.desc.back_buffer_format.is_srgb(),
        )?;

        ze_info!(
            "Created swap chain {}x{} {:?} (fullscreen: {})",
            self.desc.back_buffer_width,
            self.desc.back_buffer_height,
            self.desc.back_buffer_format,
            self.desc.is_full_screen
        );

        self.swap_chain = Some(swap_chain);
        self.back_buffer = Some(back_buffer);
        Ok(())
    }

    fn destroy_swap_chain(&mut self) {
        // Buffer references must be gone before the swap chain is released
        self.back_buffer = None;
        self.swap_chain = None;
    }

    fn create_depth_stencil_buffer(&mut self) -> Result<(), DeviceError> {
        if self.desc.depth_stencil_format == PixelFormat::Unknown {
            return Ok(());
        }

        let mut flags = BitFlags::from(TextureFlags::DepthStencil);
        if self.device.features().has_depth_as_srv {
            flags |= TextureFlags::ShaderResource;
        }

        let mut desc = TextureDesc::new_2d(
            self.desc.back_buffer_width,
            self.desc.back_buffer_height,
            self.desc.depth_stencil_format,
            flags,
        );
        desc.multisample_count = self.desc.multisample_count;

        self.depth_stencil_buffer = Some(Texture::new(&self.device, &desc, &[])?);
        Ok(())
    }

    /// Present the back buffer. Failures report the device status, which tells
    /// removed and reset devices apart.
    pub fn present(&mut self) -> Result<(), PresentError> {
        let interval = self
            .forced_present_interval
            .unwrap_or(self.desc.present_interval);

        let result = match self.swap_chain.as_mut() {
            Some(swap_chain) => swap_chain.present(interval.sync_interval()),
            None => Err(DeviceError::InvalidOperation),
        };

        result.map_err(|error| PresentError {
            status: self.device.graphics_device_status(),
            error,
        })
    }

    /// Resize both the back buffer and the depth-stencil buffer
    pub fn resize(&mut self, width: u32, height: u32, format: PixelFormat) -> Result<(), DeviceError> {
        self.resize_back_buffer(width, height, format)?;
        self.resize_depth_stencil_buffer(width, height)?;
        self.desc.back_buffer_width = width;
        self.desc.back_buffer_height = height;
        Ok(())
    }

    pub fn resize_back_buffer(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<(), DeviceError> {
        // The swap chain buffers must all be released before resizing
        let current_format = self
            .back_buffer
            .take()
            .map(|back_buffer| back_buffer.view_format());

        // Unknown keeps the swap chain format
        let format = if Some(format) == current_format {
            PixelFormat::Unknown
        } else {
            format
        };

        let flags = if self.desc.is_full_screen {
            BitFlags::from(SwapChainFlags::AllowModeSwitch)
        } else {
            BitFlags::empty()
        };

        let resized = self
            .swap_chain()?
            .resize_buffers(BUFFER_COUNT, width, height, format, flags);
        match resized.and_then(|_| self.wrap_back_buffer()) {
            Ok(back_buffer) => {
                self.back_buffer = Some(back_buffer);
                ze_info!("Resized back buffer to {}x{}", width, height);
                Ok(())
            }
            Err(error) => {
                // A failed resize leaves the previous buffers in place
                self.back_buffer = self.wrap_back_buffer().ok();
                Err(error)
            }
        }
    }

    fn wrap_back_buffer(&mut self) -> Result<Texture, DeviceError> {
        let native = self.swap_chain()?.buffer(0)?;
        Texture::from_native(
            &self.device,
            native,
            self.desc.back_buffer_format.is_srgb(),
        )
    }

    pub fn resize_depth_stencil_buffer(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        let Some(depth_stencil_buffer) = self.depth_stencil_buffer.take() else {
            return Ok(());
        };

        let mut desc = *depth_stencil_buffer.desc();
        desc.width = width;
        desc.height = height;

        match Texture::new(&self.device, &desc, &[]) {
            Ok(resized) => {
                self.depth_stencil_buffer = Some(resized);
                Ok(())
            }
            Err(error) => {
                self.depth_stencil_buffer = Some(depth_stencil_buffer);
                Err(error)
            }
        }
    }

    pub fn is_full_screen(&self) -> Result<bool, DeviceError> {
        match self.swap_chain.as_ref() {
            Some(swap_chain) => swap_chain.fullscreen_state(),
            None => Ok(false),
        }
    }

    pub fn set_full_screen(&mut self, full_screen: bool) -> Result<(), DeviceError> {
        if self.swap_chain.is_none() {
            return Ok(());
        }

        let preferred_output = self.preferred_output();
        let swap_chain = self.swap_chain()?;
        let currently_full_screen = swap_chain.fullscreen_state()?;
        if currently_full_screen == full_screen
            && (!currently_full_screen
                || (preferred_output.is_some()
                    && swap_chain.fullscreen_output()? == preferred_output))
        {
            return Ok(());
        }

        let (width, height, format) = match self.back_buffer.as_ref() {
            Some(back_buffer) => (back_buffer.width(), back_buffer.height(), back_buffer.view_format()),
            None => (
                self.desc.back_buffer_width,
                self.desc.back_buffer_height,
                self.desc.back_buffer_format,
            ),
        };

        if full_screen {
            self.destroy_swap_chain();
            self.desc.is_full_screen = true;
            self.create_swap_chain()?;
        } else {
            self.desc.is_full_screen = false;
            self.swap_chain()?.set_fullscreen_state(false, None)?;
            self.resize_back_buffer(width, height, format)?;

            let mode = self.back_buffer_mode(width, height, Rational::new(0, 0));
            self.swap_chain()?.resize_target(&mode)?;
        }

        ze_info!("Switched to {}", if full_screen { "fullscreen" } else { "windowed" });
        Ok(())
    }
}

impl Drop for SwapChainGraphicsPresenter {
    fn drop(&mut self) {
        // DXGI refuses to release a fullscreen swap chain
        if let Some(swap_chain) = self.swap_chain.as_mut() {
            if let Ok(true) = swap_chain.fullscreen_state() {
                let _ = swap_chain.set_fullscreen_state(false, None);
            }
        }
        self.destroy_swap_chain();
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::GraphicsAdapterFactory;
    use crate::device::presenter::{PresentError, SwapChainGraphicsPresenter};
    use crate::device::GraphicsDevice;
    use crate::native::desc::{SwapChainFlags, SwapEffect, WindowAssociationFlags};
    use crate::null::{NullFactory, NullSwapChainState, SwapChainCommand};
    use raw_window_handle::{RawWindowHandle, Win32WindowHandle};
    use std::sync::Arc;
    use ze_gfx::backend::{
        DeviceError, GraphicsDeviceDesc, GraphicsDeviceStatus, GraphicsProfile, PresentInterval,
        PresentationParameters, Rational,
    };
    use ze_gfx::PixelFormat;

    fn window() -> RawWindowHandle {
        let mut handle = Win32WindowHandle::empty();
        handle.hwnd = 0x1234 as *mut _;
        RawWindowHandle::Win32(handle)
    }

    fn setup(
        desc: PresentationParameters,
    ) -> (
        SwapChainGraphicsPresenter,
        Arc<GraphicsDevice>,
        Arc<NullFactory>,
    ) {
        let (factory, _) = NullFactory::with_default_adapter();
        let adapters = GraphicsAdapterFactory::new(factory.clone()).unwrap();
        let device = GraphicsDevice::new(
            adapters.default_adapter().unwrap(),
            &GraphicsDeviceDesc {
                profiles: vec![GraphicsProfile::Level11_0],
                ..Default::default()
            },
        )
        .unwrap();
        let presenter = SwapChainGraphicsPresenter::new(
            &device,
            &PresentationParameters {
                device_window_handle: Some(window()),
                ..desc
            },
        )
        .unwrap();
        (presenter, device, factory)
    }

    fn swap_chain(factory: &NullFactory) -> Arc<NullSwapChainState> {
        factory.swap_chains().last().unwrap().clone()
    }

    #[test]
    fn window_handle_is_required() {
        let (_, device, _) = setup(PresentationParameters::default());
        assert_eq!(
            SwapChainGraphicsPresenter::new(&device, &PresentationParameters::default()).err(),
            Some(DeviceError::InvalidParameters)
        );
    }

    #[test]
    fn windowed_swap_chain() {
        let (presenter, _, factory) = setup(PresentationParameters {
            back_buffer_format: PixelFormat::R8G8B8A8UnormSrgb,
            depth_stencil_format: PixelFormat::D24UnormS8Uint,
            ..Default::default()
        });

        let desc = swap_chain(&factory).desc();
        assert_eq!(desc.buffer_count, 1);
        assert!(desc.windowed);
        assert_eq!(desc.swap_effect, SwapEffect::Discard);
        assert!(desc.flags.is_empty());
        assert_eq!(
            factory.window_associations(),
            vec![enumflags2::BitFlags::<WindowAssociationFlags>::from(WindowAssociationFlags::NoAltEnter)]
        );
        assert!(swap_chain(&factory).commands().is_empty());

        let back_buffer = presenter.back_buffer().unwrap();
        assert_eq!(back_buffer.width(), 800);
        assert_eq!(back_buffer.view_format(), PixelFormat::R8G8B8A8UnormSrgb);
        assert!(back_buffer.native_render_target_view().is_some());

        let depth = presenter.depth_stencil_buffer().unwrap();
        assert_eq!(depth.desc().format, PixelFormat::D24UnormS8Uint);
        assert!(depth.has_stencil());
    }

    #[test]
    fn fullscreen_creation_order() {
        let (presenter, _, factory) = setup(PresentationParameters {
            is_full_screen: true,
            ..Default::default()
        });

        let state = swap_chain(&factory);
        assert_eq!(
            state.desc().flags,
            enumflags2::BitFlags::<SwapChainFlags>::from(SwapChainFlags::AllowModeSwitch)
        );
        let commands = state.commands();
        assert!(matches!(commands[0], SwapChainCommand::ResizeTarget(_)));
        assert!(matches!(
            commands[1],
            SwapChainCommand::SetFullscreenState(true, Some(_))
        ));
        assert!(matches!(
            commands[2],
            SwapChainCommand::ResizeBuffers { buffer_count: 1, .. }
        ));
        assert_eq!(presenter.is_full_screen(), Ok(true));
    }

    #[test]
    fn present_intervals() {
        let (mut presenter, _, factory) = setup(PresentationParameters {
            present_interval: PresentInterval::Two,
            ..Default::default()
        });

        presenter.present().unwrap();
        presenter.set_forced_present_interval(Some(PresentInterval::Immediate));
        presenter.present().unwrap();
        presenter.set_forced_present_interval(None);
        presenter.present().unwrap();

        assert_eq!(
            swap_chain(&factory).commands(),
            vec![
                SwapChainCommand::Present(2),
                SwapChainCommand::Present(0),
                SwapChainCommand::Present(2)
            ]
        );
    }

    #[test]
    fn present_failure_reports_status() {
        let (mut presenter, device, factory) = setup(PresentationParameters::default());
        swap_chain(&factory).set_present_error(Some(DeviceError::DeviceRemoved));
        device.simulate_reset();

        assert_eq!(
            presenter.present(),
            Err(PresentError {
                status: GraphicsDeviceStatus::Reset,
                error: DeviceError::DeviceRemoved
            })
        );
    }

    #[test]
    fn resize_keeps_unchanged_format() {
        let (mut presenter, _, factory) = setup(PresentationParameters {
            depth_stencil_format: PixelFormat::D32Float,
            ..Default::default()
        });

        presenter
            .resize(1024, 768, PixelFormat::R8G8B8A8Unorm)
            .unwrap();
        presenter
            .resize_back_buffer(640, 480, PixelFormat::B8G8R8A8Unorm)
            .unwrap();

        assert_eq!(
            swap_chain(&factory).commands(),
            vec![
                SwapChainCommand::ResizeBuffers {
                    buffer_count: 1,
                    width: 1024,
                    height: 768,
                    format: PixelFormat::Unknown,
                    flags: Default::default()
                },
                SwapChainCommand::ResizeBuffers {
                    buffer_count: 1,
                    width: 640,
                    height: 480,
                    format: PixelFormat::B8G8R8A8Unorm,
                    flags: Default::default()
                },
            ]
        );
        assert_eq!(presenter.back_buffer().unwrap().width(), 640);
        assert_eq!(presenter.depth_stencil_buffer().unwrap().width(), 1024);
        assert_eq!(presenter.desc().back_buffer_width, 1024);
    }

    #[test]
    fn failed_resize_keeps_the_buffers() {
        let (mut presenter, _, factory) = setup(PresentationParameters {
            depth_stencil_format: PixelFormat::D32Float,
            ..Default::default()
        });
        let width = presenter.back_buffer().unwrap().width();
        let depth_width = presenter.depth_stencil_buffer().unwrap().width();

        swap_chain(&factory).set_resize_error(Some(DeviceError::OutOfMemory));
        assert_eq!(
            presenter.resize(width * 2, 64, PixelFormat::R8G8B8A8Unorm),
            Err(DeviceError::OutOfMemory)
        );
        assert_eq!(presenter.back_buffer().unwrap().width(), width);
        assert_eq!(presenter.depth_stencil_buffer().unwrap().width(), depth_width);
        assert_eq!(presenter.desc().back_buffer_width, width);

        swap_chain(&factory).set_resize_error(None);
        presenter
            .resize(width * 2, 64, PixelFormat::R8G8B8A8Unorm)
            .unwrap();
        assert_eq!(presenter.back_buffer().unwrap().width(), width * 2);
    }

    #[test]
    fn toggling_fullscreen() {
        let (mut presenter, _, factory) = setup(PresentationParameters::default());

        presenter.set_full_screen(false).unwrap();
        assert_eq!(factory.swap_chains().len(), 1);

        presenter.set_full_screen(true).unwrap();
        assert_eq!(factory.swap_chains().len(), 2);
        assert_eq!(presenter.is_full_screen(), Ok(true));
        assert!(presenter.desc().is_full_screen);

        // Already fullscreen on the preferred output
        presenter.set_full_screen(true).unwrap();
        assert_eq!(factory.swap_chains().len(), 2);

        let state = swap_chain(&factory);
        let before = state.commands().len();
        presenter.set_full_screen(false).unwrap();
        let commands = state.commands();
        assert_eq!(
            commands[before],
            SwapChainCommand::SetFullscreenState(false, None)
        );
        assert!(matches!(
            commands[before + 1],
            SwapChainCommand::ResizeBuffers { width: 800, height: 480, .. }
        ));
        match &commands[before + 2] {
            SwapChainCommand::ResizeTarget(mode) => {
                assert_eq!(mode.refresh_rate, Rational::new(0, 0));
                assert_eq!(mode.width, 800);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(presenter.is_full_screen(), Ok(false));
    }
}
