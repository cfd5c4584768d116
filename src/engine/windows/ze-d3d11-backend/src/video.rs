//! Hardware accelerated video decoding through D3D11VA.
//!
//! The codec library is abstracted behind [`CodecContext`], this module only wires
//! the device side: decoder profiles, decoder configs and output surfaces.

use crate::device::texture::Texture;
use crate::device::GraphicsDevice;
use crate::native::{NativeObject, NativeVideoDevice};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;
use ze_core::ze_verbose;
use ze_gfx::backend::DeviceError;
use ze_gfx::resource::{TextureDesc, TextureFlags};
use ze_gfx::PixelFormat;

/// Surface format decoders write to
pub const DECODER_OUTPUT_FORMAT: PixelFormat = PixelFormat::NV12;

/// Binary GUID layout expected by codec libraries
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct NativeGuid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

pub fn to_native_guid(uuid: &Uuid) -> NativeGuid {
    let (data1, data2, data3, data4) = uuid.as_fields();
    NativeGuid {
        data1,
        data2,
        data3,
        data4: *data4,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VideoDecoderDesc {
    pub profile: Uuid,
    pub sample_width: u32,
    pub sample_height: u32,
    pub output_format: PixelFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct VideoDecoderConfig {
    pub guid_config_bitstream_encryption: Uuid,
    pub guid_config_mb_control_encryption: Uuid,
    pub guid_config_resid_diff_encryption: Uuid,
    pub config_bitstream_raw: u32,
    pub config_mb_control_raster_order: u32,
    pub config_resid_diff_host: u32,
    pub config_spatial_resid8: u32,
    pub config_resid8_subtraction: u32,
    pub config_spatial_host8or9_clipping: u32,
    pub config_spatial_resid_interleaved: u32,
    pub config_intra_resid_unsigned: u32,
    pub config_resid_diff_accelerator: u32,
    pub config_host_inverse_scan: u32,
    pub config_specific_idct: u32,
    pub config_4_grouped_coefs: u32,
    pub config_min_render_target_buff_count: u16,
    pub config_decoder_specific: u16,
}

/// [`VideoDecoderConfig`] as handed to the codec library
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct NativeDecoderConfig {
    pub guid_config_bitstream_encryption: NativeGuid,
    pub guid_config_mb_control_encryption: NativeGuid,
    pub guid_config_resid_diff_encryption: NativeGuid,
    pub config_bitstream_raw: u32,
    pub config_mb_control_raster_order: u32,
    pub config_resid_diff_host: u32,
    pub config_spatial_resid8: u32,
    pub config_resid8_subtraction: u32,
    pub config_spatial_host8or9_clipping: u32,
    pub config_spatial_resid_interleaved: u32,
    pub config_intra_resid_unsigned: u32,
    pub config_resid_diff_accelerator: u32,
    pub config_host_inverse_scan: u32,
    pub config_specific_idct: u32,
    pub config_4_grouped_coefs: u32,
    pub config_min_render_target_buff_count: u16,
    pub config_decoder_specific: u16,
}

impl VideoDecoderConfig {
    pub fn to_native(&self) -> NativeDecoderConfig {
        NativeDecoderConfig {
            guid_config_bitstream_encryption: to_native_guid(&self.guid_config_bitstream_encryption),
            guid_config_mb_control_encryption: to_native_guid(
                &self.guid_config_mb_control_encryption,
            ),
            guid_config_resid_diff_encryption: to_native_guid(
                &self.guid_config_resid_diff_encryption,
            ),
            config_bitstream_raw: self.config_bitstream_raw,
            config_mb_control_raster_order: self.config_mb_control_raster_order,
            config_resid_diff_host: self.config_resid_diff_host,
            config_spatial_resid8: self.config_spatial_resid8,
            config_resid8_subtraction: self.config_resid8_subtraction,
            config_spatial_host8or9_clipping: self.config_spatial_host8or9_clipping,
            config_spatial_resid_interleaved: self.config_spatial_resid_interleaved,
            config_intra_resid_unsigned: self.config_intra_resid_unsigned,
            config_resid_diff_accelerator: self.config_resid_diff_accelerator,
            config_host_inverse_scan: self.config_host_inverse_scan,
            config_specific_idct: self.config_specific_idct,
            config_4_grouped_coefs: self.config_4_grouped_coefs,
            config_min_render_target_buff_count: self.config_min_render_target_buff_count,
            config_decoder_specific: self.config_decoder_specific,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HardwareDeviceType {
    None,
    Vdpau,
    Cuda,
    Vaapi,
    Dxva2,
    Qsv,
    VideoToolbox,
    D3D11Va,
}

/// Pixel formats a codec may offer during format negotiation
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CodecPixelFormat {
    Yuv420P,
    Nv12,
    Dxva2Vld,
    D3D11,
    Vaapi,
    Cuda,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VideoError {
    NoHardwareSurfaceFormat,
    UnsupportedHardwareDevice(HardwareDeviceType),
    NoCompatibleProfile,
    Device(DeviceError),
    /// Error code reported by the codec library
    Codec(i32),
}

impl fmt::Display for VideoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoError::NoHardwareSurfaceFormat => write!(f, "failed to get HW surface format"),
            VideoError::UnsupportedHardwareDevice(device_type) => {
                write!(f, "hardware device type {:?} is not supported", device_type)
            }
            VideoError::NoCompatibleProfile => write!(f, "no compatible decoder profile"),
            VideoError::Device(error) => write!(f, "device error: {}", error),
            VideoError::Codec(code) => write!(f, "codec error {}", code),
        }
    }
}

impl std::error::Error for VideoError {}

impl From<DeviceError> for VideoError {
    fn from(error: DeviceError) -> Self {
        VideoError::Device(error)
    }
}

impl HardwareDeviceType {
    pub fn hardware_pixel_format(&self) -> Result<CodecPixelFormat, VideoError> {
        match self {
            HardwareDeviceType::D3D11Va => Ok(CodecPixelFormat::D3D11),
            other => Err(VideoError::UnsupportedHardwareDevice(*other)),
        }
    }
}

pub type FormatNegotiator =
    Arc<dyn Fn(&[CodecPixelFormat]) -> Result<CodecPixelFormat, VideoError> + Send + Sync>;

/// Pick the hardware surface format of `device_type` among the formats the codec offers
pub fn negotiate_hardware_format(
    device_type: HardwareDeviceType,
    offered: &[CodecPixelFormat],
) -> Result<CodecPixelFormat, VideoError> {
    let wanted = device_type.hardware_pixel_format()?;
    offered
        .iter()
        .copied()
        .find(|format| *format == wanted)
        .ok_or(VideoError::NoHardwareSurfaceFormat)
}

/// Device side state a codec decodes into
pub struct HardwareAccelerationContext {
    pub decoder: NativeObject,
    pub config: NativeDecoderConfig,
    pub output_views: Vec<NativeObject>,
    pub output_texture: Texture,
    pub surface_count: u32,
}

/// Decoder library context
pub trait CodecContext: Send {
    type Frame;

    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// `None` sends the end-of-stream packet
    fn send_packet(&mut self, packet: Option<&[u8]>) -> Result<(), i32>;
    fn receive_frame(&mut self, frame: &mut Self::Frame) -> Result<(), i32>;
    fn flush_buffers(&mut self);

    fn set_format_negotiator(&mut self, negotiator: FormatNegotiator);
    fn create_hardware_device(&mut self, device_type: HardwareDeviceType) -> bool;
    fn set_hardware_acceleration_context(&mut self, context: Arc<HardwareAccelerationContext>);
}

pub struct VideoCodec<C: CodecContext> {
    context: C,
    device_type: HardwareDeviceType,
    is_hardware_accelerated: bool,
    hardware_context: Option<Arc<HardwareAccelerationContext>>,
}

impl<C: CodecContext> VideoCodec<C> {
    pub fn new(mut context: C, device_type: HardwareDeviceType) -> Self {
        context.set_format_negotiator(Self::negotiator(device_type));
        let is_hardware_accelerated = context.create_hardware_device(device_type);
        Self {
            context,
            device_type,
            is_hardware_accelerated,
            hardware_context: None,
        }
    }

    fn negotiator(device_type: HardwareDeviceType) -> FormatNegotiator {
        Arc::new(move |offered| negotiate_hardware_format(device_type, offered))
    }

    pub fn is_hardware_accelerated(&self) -> bool {
        self.is_hardware_accelerated
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn hardware_context(&self) -> Option<&Arc<HardwareAccelerationContext>> {
        self.hardware_context.as_ref()
    }

    pub fn enable_hardware_acceleration(
        &mut self,
        device: &Arc<GraphicsDevice>,
    ) -> Result<(), VideoError> {
        let hardware_context = Arc::new(create_hardware_acceleration_context(
            device,
            self.context.width(),
            self.context.height(),
        )?);
        self.context
            .set_hardware_acceleration_context(hardware_context.clone());
        self.hardware_context = Some(hardware_context);
        Ok(())
    }

    /// Drain every pending frame then reset the decoder for the next stream
    pub fn flush(&mut self, frame: &mut C::Frame) {
        match self.context.send_packet(None) {
            Ok(()) => while self.context.receive_frame(frame).is_ok() {},
            Err(code) => ze_verbose!("Could not send flush packet to the decoder ({})", code),
        }

        self.context.flush_buffers();
        self.context
            .set_format_negotiator(Self::negotiator(self.device_type));
    }
}

/// Profiles able to decode into the output format
pub fn find_compatible_decoder_profiles(
    video_device: &dyn NativeVideoDevice,
) -> Result<Vec<Uuid>, DeviceError> {
    let mut profiles = vec![];
    for i in 0..video_device.decoder_profile_count() {
        let profile = video_device.decoder_profile(i)?;
        if video_device.check_decoder_format(&profile, DECODER_OUTPUT_FORMAT)? {
            profiles.push(profile);
        }
    }
    Ok(profiles)
}

/// Build a decoder and its output surface for a `width`x`height` stream.
/// The first profile and config the device accepts are used.
pub fn create_hardware_acceleration_context(
    device: &Arc<GraphicsDevice>,
    width: u32,
    height: u32,
) -> Result<HardwareAccelerationContext, VideoError> {
    let video_device = device.native_device().video_device()?;

    for profile in find_compatible_decoder_profiles(video_device.as_ref())? {
        let decoder_desc = VideoDecoderDesc {
            profile,
            sample_width: width,
            sample_height: height,
            output_format: DECODER_OUTPUT_FORMAT,
        };

        for i in 0..video_device.decoder_config_count(&decoder_desc)? {
            let config = video_device.decoder_config(&decoder_desc, i)?;
            let decoder = match video_device.create_decoder(&decoder_desc, &config) {
                Ok(decoder) => decoder,
                Err(error) => {
                    ze_verbose!("Decoder config {} of {} rejected: {}", i, profile, error);
                    continue;
                }
            };

            let output_texture = Texture::new(
                device,
                &TextureDesc::new_2d(
                    width,
                    height,
                    DECODER_OUTPUT_FORMAT,
                    TextureFlags::RenderTarget | TextureFlags::ShaderResource,
                ),
                &[],
            )?;

            let output_view = video_device.create_decoder_output_view(
                output_texture.native_texture(),
                &profile,
                0,
            )?;

            return Ok(HardwareAccelerationContext {
                decoder,
                config: config.to_native(),
                output_views: vec![output_view],
                output_texture,
                surface_count: 1,
            });
        }
    }

    Err(VideoError::NoCompatibleProfile)
}

pub struct VideoSystem {
    device: Arc<GraphicsDevice>,
}

impl VideoSystem {
    /// Decoders run on their own threads, the device must serialize its context
    pub fn initialize(device: Arc<GraphicsDevice>) -> Self {
        device.native_device().set_multithread_protected(true);
        Self { device }
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    pub fn create_codec<C: CodecContext>(&self, context: C) -> VideoCodec<C> {
        VideoCodec::new(context, HardwareDeviceType::D3D11Va)
    }
}

#[cfg(test)]
mod tests {
    use crate::device::GraphicsDevice;
    use crate::adapter::GraphicsAdapterFactory;
    use crate::null::{NullAdapter, NullFactory, NullObjectKind, NullVideoDevice};
    use crate::video::*;
    use std::sync::Arc;
    use uuid::Uuid;
    use ze_gfx::backend::{GraphicsDeviceDesc, GraphicsProfile};

    const H264: Uuid = Uuid::from_u128(0x1b81be68_a0c7_11d3_b984_00c04f2e73c5);
    const HEVC: Uuid = Uuid::from_u128(0x5b11d51b_2f4c_4452_bcc3_09f2a1160cc0);

    fn device_with_video(video: NullVideoDevice) -> (Arc<GraphicsDevice>, Arc<NullAdapter>) {
        let adapter = Arc::new(
            NullAdapter::new("Video Adapter", 0x10de, GraphicsProfile::Level11_1).with_video(video),
        );
        let factory =
            GraphicsAdapterFactory::new(Arc::new(NullFactory::new(vec![adapter.clone()])))
                .unwrap();
        let device =
            GraphicsDevice::new(factory.default_adapter().unwrap(), &GraphicsDeviceDesc::default())
                .unwrap();
        (device, adapter)
    }

    #[test]
    fn native_guid_layout() {
        let guid = to_native_guid(&H264);
        assert_eq!(guid.data1, 0x1b81be68);
        assert_eq!(guid.data2, 0xa0c7);
        assert_eq!(guid.data3, 0x11d3);
        assert_eq!(guid.data4, [0xb9, 0x84, 0x00, 0xc0, 0x4f, 0x2e, 0x73, 0xc5]);
    }

    #[test]
    fn config_to_native_converts_guids() {
        let config = VideoDecoderConfig {
            guid_config_bitstream_encryption: H264,
            config_bitstream_raw: 2,
            config_min_render_target_buff_count: 3,
            ..Default::default()
        };
        let native = config.to_native();
        assert_eq!(native.guid_config_bitstream_encryption, to_native_guid(&H264));
        assert_eq!(native.guid_config_mb_control_encryption, NativeGuid::default());
        assert_eq!(native.config_bitstream_raw, 2);
        assert_eq!(native.config_min_render_target_buff_count, 3);
    }

    #[test]
    fn hardware_format_negotiation() {
        assert_eq!(
            negotiate_hardware_format(
                HardwareDeviceType::D3D11Va,
                &[CodecPixelFormat::Yuv420P, CodecPixelFormat::D3D11]
            ),
            Ok(CodecPixelFormat::D3D11)
        );
        assert_eq!(
            negotiate_hardware_format(HardwareDeviceType::D3D11Va, &[CodecPixelFormat::Nv12]),
            Err(VideoError::NoHardwareSurfaceFormat)
        );
        assert_eq!(
            negotiate_hardware_format(HardwareDeviceType::Cuda, &[CodecPixelFormat::Cuda]),
            Err(VideoError::UnsupportedHardwareDevice(HardwareDeviceType::Cuda))
        );
    }

    #[test]
    fn compatible_profiles_need_nv12() {
        let video = NullVideoDevice {
            profiles: vec![(H264, true), (HEVC, false)],
            configs: vec![],
        };
        assert_eq!(find_compatible_decoder_profiles(&video), Ok(vec![H264]));
    }

    #[test]
    fn acceleration_context_uses_first_profile_and_config() {
        let first = VideoDecoderConfig {
            config_bitstream_raw: 1,
            ..Default::default()
        };
        let second = VideoDecoderConfig {
            config_bitstream_raw: 2,
            ..Default::default()
        };
        let (device, _adapter) = device_with_video(NullVideoDevice {
            profiles: vec![(HEVC, false), (H264, true)],
            configs: vec![first, second],
        });

        let context = create_hardware_acceleration_context(&device, 640, 480).unwrap();
        assert_eq!(context.surface_count, 1);
        assert_eq!(context.config, first.to_native());
        assert_eq!(context.output_views.len(), 1);
        assert_eq!(
            crate::null::object_kind(&context.decoder),
            Some(&NullObjectKind::VideoDecoder(VideoDecoderDesc {
                profile: H264,
                sample_width: 640,
                sample_height: 480,
                output_format: PixelFormat::NV12,
            }))
        );
        assert_eq!(context.output_texture.desc().format, PixelFormat::NV12);
    }

    #[test]
    fn acceleration_context_without_profile_fails() {
        let (device, _adapter) = device_with_video(NullVideoDevice {
            profiles: vec![(HEVC, false)],
            configs: vec![VideoDecoderConfig::default()],
        });
        assert_eq!(
            create_hardware_acceleration_context(&device, 640, 480).err(),
            Some(VideoError::NoCompatibleProfile)
        );
    }

    #[test]
    fn video_system_protects_the_device() {
        let (device, adapter) = device_with_video(NullVideoDevice {
            profiles: vec![],
            configs: vec![],
        });
        let _system = VideoSystem::initialize(device);
        assert!(adapter.last_device().unwrap().is_multithread_protected());
    }

    struct FakeCodec {
        pending_frames: u32,
        send_error: Option<i32>,
        negotiator_sets: u32,
        flushed: bool,
        negotiator: Option<FormatNegotiator>,
    }

    impl CodecContext for FakeCodec {
        type Frame = u32;

        fn width(&self) -> u32 {
            320
        }

        fn height(&self) -> u32 {
            240
        }

        fn send_packet(&mut self, _packet: Option<&[u8]>) -> Result<(), i32> {
            match self.send_error {
                Some(code) => Err(code),
                None => Ok(()),
            }
        }

        fn receive_frame(&mut self, frame: &mut u32) -> Result<(), i32> {
            if self.pending_frames == 0 {
                return Err(-11);
            }
            self.pending_frames -= 1;
            *frame += 1;
            Ok(())
        }

        fn flush_buffers(&mut self) {
            self.flushed = true;
        }

        fn set_format_negotiator(&mut self, negotiator: FormatNegotiator) {
            self.negotiator_sets += 1;
            self.negotiator = Some(negotiator);
        }

        fn create_hardware_device(&mut self, device_type: HardwareDeviceType) -> bool {
            device_type == HardwareDeviceType::D3D11Va
        }

        fn set_hardware_acceleration_context(&mut self, _context: Arc<HardwareAccelerationContext>) {}
    }

    fn fake_codec(pending_frames: u32, send_error: Option<i32>) -> FakeCodec {
        FakeCodec {
            pending_frames,
            send_error,
            negotiator_sets: 0,
            flushed: false,
            negotiator: None,
        }
    }

    #[test]
    fn flush_drains_pending_frames() {
        let mut codec = VideoCodec::new(fake_codec(3, None), HardwareDeviceType::D3D11Va);
        assert!(codec.is_hardware_accelerated());

        let mut frames = 0;
        codec.flush(&mut frames);
        assert_eq!(frames, 3);
        assert!(codec.context().flushed);
        assert_eq!(codec.context().negotiator_sets, 2);

        let negotiator = codec.context().negotiator.clone().unwrap();
        assert_eq!(
            negotiator(&[CodecPixelFormat::D3D11]),
            Ok(CodecPixelFormat::D3D11)
        );
    }

    #[test]
    fn flush_survives_send_failure() {
        let mut codec = VideoCodec::new(fake_codec(3, Some(-1)), HardwareDeviceType::D3D11Va);
        let mut frames = 0;
        codec.flush(&mut frames);
        assert_eq!(frames, 0);
        assert!(codec.context().flushed);
    }
}
