use crate::d3d11::{conv, convert_error, created, resource, wrap, SendableIUnknown};
use crate::native::{NativeObject, NativeResult, NativeVideoDevice};
use crate::video::{VideoDecoderConfig, VideoDecoderDesc};
use uuid::Uuid;
use windows::core::GUID;
use windows::Win32::Graphics::Direct3D11::*;
use ze_gfx::PixelFormat;

fn guid(uuid: &Uuid) -> GUID {
    GUID::from_u128(uuid.as_u128())
}

fn uuid(guid: &GUID) -> Uuid {
    Uuid::from_u128(guid.to_u128())
}

fn decoder_desc(desc: &VideoDecoderDesc) -> D3D11_VIDEO_DECODER_DESC {
    D3D11_VIDEO_DECODER_DESC {
        Guid: guid(&desc.profile),
        SampleWidth: desc.sample_width,
        SampleHeight: desc.sample_height,
        OutputFormat: conv::format(desc.output_format),
    }
}

fn decoder_config(config: &VideoDecoderConfig) -> D3D11_VIDEO_DECODER_CONFIG {
    D3D11_VIDEO_DECODER_CONFIG {
        guidConfigBitstreamEncryption: guid(&config.guid_config_bitstream_encryption),
        guidConfigMBcontrolEncryption: guid(&config.guid_config_mb_control_encryption),
        guidConfigResidDiffEncryption: guid(&config.guid_config_resid_diff_encryption),
        ConfigBitstreamRaw: config.config_bitstream_raw,
        ConfigMBcontrolRasterOrder: config.config_mb_control_raster_order,
        ConfigResidDiffHost: config.config_resid_diff_host,
        ConfigSpatialResid8: config.config_spatial_resid8,
        ConfigResid8Subtraction: config.config_resid8_subtraction,
        ConfigSpatialHost8or9Clipping: config.config_spatial_host8or9_clipping,
        ConfigSpatialResidInterleaved: config.config_spatial_resid_interleaved,
        ConfigIntraResidUnsigned: config.config_intra_resid_unsigned,
        ConfigResidDiffAccelerator: config.config_resid_diff_accelerator,
        ConfigHostInverseScan: config.config_host_inverse_scan,
        ConfigSpecificIDCT: config.config_specific_idct,
        Config4GroupedCoefs: config.config_4_grouped_coefs,
        ConfigMinRenderTargetBuffCount: config.config_min_render_target_buff_count,
        ConfigDecoderSpecific: config.config_decoder_specific,
    }
}

pub struct D3D11VideoDevice {
    device: SendableIUnknown<ID3D11VideoDevice>,
}

impl D3D11VideoDevice {
    pub fn new(device: ID3D11VideoDevice) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl NativeVideoDevice for D3D11VideoDevice {
    fn decoder_profile_count(&self) -> u32 {
        unsafe { self.device.GetVideoDecoderProfileCount() }
    }

    fn decoder_profile(&self, index: u32) -> NativeResult<Uuid> {
        let profile = unsafe { self.device.GetVideoDecoderProfile(index) }.map_err(convert_error)?;
        Ok(uuid(&profile))
    }

    fn check_decoder_format(&self, profile: &Uuid, format: PixelFormat) -> NativeResult<bool> {
        let supported = unsafe {
            self.device
                .CheckVideoDecoderFormat(&guid(profile), conv::format(format))
        }
        .map_err(convert_error)?;
        Ok(supported.as_bool())
    }

    fn decoder_config_count(&self, desc: &VideoDecoderDesc) -> NativeResult<u32> {
        unsafe { self.device.GetVideoDecoderConfigCount(&decoder_desc(desc)) }
            .map_err(convert_error)
    }

    fn decoder_config(
        &self,
        desc: &VideoDecoderDesc,
        index: u32,
    ) -> NativeResult<VideoDecoderConfig> {
        let config = unsafe {
            self.device
                .GetVideoDecoderConfig(&decoder_desc(desc), index)
        }
        .map_err(convert_error)?;

        Ok(VideoDecoderConfig {
            guid_config_bitstream_encryption: uuid(&config.guidConfigBitstreamEncryption),
            guid_config_mb_control_encryption: uuid(&config.guidConfigMBcontrolEncryption),
            guid_config_resid_diff_encryption: uuid(&config.guidConfigResidDiffEncryption),
            config_bitstream_raw: config.ConfigBitstreamRaw,
            config_mb_control_raster_order: config.ConfigMBcontrolRasterOrder,
            config_resid_diff_host: config.ConfigResidDiffHost,
            config_spatial_resid8: config.ConfigSpatialResid8,
            config_resid8_subtraction: config.ConfigResid8Subtraction,
            config_spatial_host8or9_clipping: config.ConfigSpatialHost8or9Clipping,
            config_spatial_resid_interleaved: config.ConfigSpatialResidInterleaved,
            config_intra_resid_unsigned: config.ConfigIntraResidUnsigned,
            config_resid_diff_accelerator: config.ConfigResidDiffAccelerator,
            config_host_inverse_scan: config.ConfigHostInverseScan,
            config_specific_idct: config.ConfigSpecificIDCT,
            config_4_grouped_coefs: config.Config4GroupedCoefs,
            config_min_render_target_buff_count: config.ConfigMinRenderTargetBuffCount,
            config_decoder_specific: config.ConfigDecoderSpecific,
        })
    }

    fn create_decoder(
        &self,
        desc: &VideoDecoderDesc,
        config: &VideoDecoderConfig,
    ) -> NativeResult<NativeObject> {
        let decoder = unsafe {
            self.device
                .CreateVideoDecoder(&decoder_desc(desc), &decoder_config(config))
        }
        .map_err(convert_error)?;
        Ok(wrap(decoder))
    }

    fn create_decoder_output_view(
        &self,
        texture: &NativeObject,
        profile: &Uuid,
        array_slice: u32,
    ) -> NativeResult<NativeObject> {
        let resource = resource(texture)?;
        let desc = D3D11_VIDEO_DECODER_OUTPUT_VIEW_DESC {
            DecodeProfile: guid(profile),
            ViewDimension: D3D11_VDOV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_VIDEO_DECODER_OUTPUT_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_VDOV {
                    ArraySlice: array_slice,
                },
            },
        };

        let mut view = None;
        unsafe {
            self.device
                .CreateVideoDecoderOutputView(&resource, &desc, Some(&mut view))
                .map_err(convert_error)?;
        }
        Ok(wrap(created(view)?))
    }
}
