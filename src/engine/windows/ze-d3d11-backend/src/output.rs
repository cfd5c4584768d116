use crate::native::desc::{ModeScaling, NativeModeDesc, OutputDesc, ScanlineOrdering};
use crate::native::{NativeAdapter, NativeObject, NativeOutput};
use enumflags2::BitFlags;
use std::collections::HashSet;
use std::sync::Arc;
use ze_core::maths::RectI32;
use ze_gfx::backend::{DeviceError, DisplayMode, GraphicsProfile};
use ze_gfx::PixelFormat;

/// A monitor connected to an adapter
pub struct GraphicsOutput {
    index: usize,
    native_output: Arc<dyn NativeOutput>,
    native_adapter: Arc<dyn NativeAdapter>,
    desc: OutputDesc,
}

impl GraphicsOutput {
    pub(crate) fn new(
        index: usize,
        native_output: Arc<dyn NativeOutput>,
        native_adapter: Arc<dyn NativeAdapter>,
    ) -> Result<Self, DeviceError> {
        let desc = native_output.desc()?;
        Ok(Self {
            index,
            native_output,
            native_adapter,
            desc,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        self.desc.device_name.trim_end_matches(char::from(0))
    }

    pub fn desktop_bounds(&self) -> RectI32 {
        self.desc.desktop_coordinates
    }

    pub fn is_attached_to_desktop(&self) -> bool {
        self.desc.attached_to_desktop
    }

    /// Every unscaled mode of every pixel format, in enumeration order
    pub fn supported_display_modes(&self) -> Result<Vec<DisplayMode>, DeviceError> {
        let mut seen = HashSet::new();
        let mut modes = vec![];

        for format in PixelFormat::ALL {
            if format == PixelFormat::Unknown {
                continue;
            }

            let native_modes = match self.native_output.display_mode_list(format) {
                Ok(native_modes) => native_modes,
                Err(DeviceError::NotCurrentlyAvailable) => return Ok(vec![]),
                Err(error) => return Err(error),
            };

            for mode in native_modes {
                if mode.scaling != ModeScaling::Unspecified {
                    continue;
                }

                let key = (
                    format,
                    mode.width,
                    mode.height,
                    mode.refresh_rate.numerator,
                    mode.refresh_rate.denominator,
                );
                if seen.insert(key) {
                    modes.push(DisplayMode::new(
                        mode.format,
                        mode.width,
                        mode.height,
                        mode.refresh_rate,
                    ));
                }
            }
        }

        Ok(modes)
    }

    /// The desktop mode, looked up in RGBA then BGRA
    pub fn current_display_mode(&self) -> Result<Option<DisplayMode>, DeviceError> {
        let modes = self.supported_display_modes()?;
        let bounds = self.desktop_bounds();

        let find = |format: PixelFormat| {
            modes.iter().find(|mode| {
                mode.width as i32 == bounds.width
                    && mode.height as i32 == bounds.height
                    && mode.format == format
            })
        };

        Ok(find(PixelFormat::R8G8B8A8Unorm)
            .or_else(|| find(PixelFormat::B8G8R8A8Unorm))
            .map(|mode| {
                DisplayMode::new(
                    mode.format,
                    bounds.width as u32,
                    bounds.height as u32,
                    mode.refresh_rate,
                )
            }))
    }

    pub fn find_closest_matching_display_mode(
        &self,
        profiles: &[GraphicsProfile],
        mode: &DisplayMode,
    ) -> Result<DisplayMode, DeviceError> {
        if profiles.is_empty() {
            return Err(DeviceError::InvalidParameters);
        }

        // The device only narrows the search, the lookup still runs without one
        let device = self
            .native_adapter
            .create_device(profiles, BitFlags::empty())
            .ok()
            .map(|handles| handles.device);

        let closest = self.native_output.find_closest_matching_mode(
            &NativeModeDesc {
                width: mode.width,
                height: mode.height,
                refresh_rate: mode.refresh_rate,
                format: mode.format,
                scanline_ordering: ScanlineOrdering::Unspecified,
                scaling: ModeScaling::Unspecified,
            },
            device.as_deref(),
        )?;

        Ok(DisplayMode::new(
            closest.format,
            closest.width,
            closest.height,
            closest.refresh_rate,
        ))
    }

    pub fn native_output(&self) -> NativeObject {
        self.native_output.as_native_object()
    }
}

#[cfg(test)]
mod tests {
    use crate::native::desc::{ModeScaling, NativeModeDesc, ScanlineOrdering};
    use crate::native::NativeAdapter;
    use crate::null::{NullAdapter, NullOutput};
    use crate::output::GraphicsOutput;
    use std::sync::Arc;
    use ze_core::maths::RectI32;
    use ze_gfx::backend::{DeviceError, DisplayMode, GraphicsProfile, Rational};
    use ze_gfx::PixelFormat;

    fn mode(format: PixelFormat, width: u32, height: u32, scaling: ModeScaling) -> NativeModeDesc {
        NativeModeDesc {
            width,
            height,
            refresh_rate: Rational::new(60, 1),
            format,
            scanline_ordering: ScanlineOrdering::Progressive,
            scaling,
        }
    }

    fn output_with(modes: Vec<NativeModeDesc>, error: Option<DeviceError>) -> GraphicsOutput {
        let mut native = NullOutput::new("\\\\.\\DISPLAY1", RectI32::new(0, 0, 1920, 1080), modes);
        native.mode_list_error = error;
        let adapter: Arc<dyn NativeAdapter> =
            Arc::new(NullAdapter::new("Test", 0x10de, GraphicsProfile::Level11_0));
        GraphicsOutput::new(0, Arc::new(native), adapter).unwrap()
    }

    #[test]
    fn display_modes_skip_scaled_and_duplicates() {
        let output = output_with(
            vec![
                mode(PixelFormat::B8G8R8A8Unorm, 1920, 1080, ModeScaling::Unspecified),
                mode(PixelFormat::B8G8R8A8Unorm, 1920, 1080, ModeScaling::Unspecified),
                mode(PixelFormat::B8G8R8A8Unorm, 1280, 720, ModeScaling::Stretched),
                mode(PixelFormat::R8G8B8A8Unorm, 1280, 720, ModeScaling::Unspecified),
            ],
            None,
        );

        let modes = output.supported_display_modes().unwrap();
        assert_eq!(modes.len(), 2);
        // Formats are walked in enumeration order
        assert_eq!(modes[0].format, PixelFormat::R8G8B8A8Unorm);
        assert_eq!(modes[1].format, PixelFormat::B8G8R8A8Unorm);
    }

    #[test]
    fn not_currently_available_yields_no_mode() {
        let output = output_with(vec![], Some(DeviceError::NotCurrentlyAvailable));
        assert_eq!(output.supported_display_modes(), Ok(vec![]));
        assert_eq!(output.current_display_mode(), Ok(None));

        let output = output_with(vec![], Some(DeviceError::Unknown));
        assert_eq!(output.supported_display_modes(), Err(DeviceError::Unknown));
    }

    #[test]
    fn current_display_mode_prefers_rgba() {
        let output = output_with(
            vec![
                mode(PixelFormat::B8G8R8A8Unorm, 1920, 1080, ModeScaling::Unspecified),
                mode(PixelFormat::R8G8B8A8Unorm, 1280, 720, ModeScaling::Unspecified),
            ],
            None,
        );
        assert_eq!(
            output.current_display_mode().unwrap(),
            Some(DisplayMode::new(
                PixelFormat::B8G8R8A8Unorm,
                1920,
                1080,
                Rational::new(60, 1)
            ))
        );

        let output = output_with(
            vec![
                mode(PixelFormat::B8G8R8A8Unorm, 1920, 1080, ModeScaling::Unspecified),
                mode(PixelFormat::R8G8B8A8Unorm, 1920, 1080, ModeScaling::Unspecified),
            ],
            None,
        );
        assert_eq!(
            output.current_display_mode().unwrap().map(|mode| mode.format),
            Some(PixelFormat::R8G8B8A8Unorm)
        );
    }

    #[test]
    fn closest_mode_requires_profiles() {
        let output = output_with(
            vec![mode(PixelFormat::R8G8B8A8Unorm, 1280, 720, ModeScaling::Unspecified)],
            None,
        );
        let wanted = DisplayMode::new(PixelFormat::R8G8B8A8Unorm, 1300, 700, Rational::new(60, 1));

        assert_eq!(
            output.find_closest_matching_display_mode(&[], &wanted),
            Err(DeviceError::InvalidParameters)
        );

        let closest = output
            .find_closest_matching_display_mode(&[GraphicsProfile::Level11_0], &wanted)
            .unwrap();
        assert_eq!((closest.width, closest.height), (1280, 720));
    }
}
