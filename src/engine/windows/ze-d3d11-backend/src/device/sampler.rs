use crate::device::GraphicsDevice;
use crate::native::NativeObject;
use std::sync::Arc;
use ze_gfx::backend::{DeviceError, GraphicsProfile};
use ze_gfx::pipeline::{SamplerStateDesc, TextureAddressMode};

pub struct SamplerState {
    device: Arc<GraphicsDevice>,
    desc: SamplerStateDesc,
    native: NativeObject,
}

impl SamplerState {
    pub fn new(device: &Arc<GraphicsDevice>, desc: &SamplerStateDesc) -> Result<Self, DeviceError> {
        let native = create_native(device, desc)?;
        Ok(Self {
            device: device.clone(),
            desc: *desc,
            native,
        })
    }

    pub fn desc(&self) -> &SamplerStateDesc {
        &self.desc
    }

    pub fn native_sampler(&self) -> &NativeObject {
        &self.native
    }

    /// Samplers hold no content, they are always recreated after a reset
    pub fn on_recreate(&mut self) -> Result<bool, DeviceError> {
        self.native = create_native(&self.device, &self.desc)?;
        Ok(true)
    }
}

fn create_native(
    device: &GraphicsDevice,
    desc: &SamplerStateDesc,
) -> Result<NativeObject, DeviceError> {
    device
        .native_device()
        .create_sampler_state(&native_sampler_desc(device.current_profile(), desc))
}

/// 9_1 hardware caps anisotropy at 2 and has no mirror once addressing
pub(crate) fn native_sampler_desc(
    profile: GraphicsProfile,
    desc: &SamplerStateDesc,
) -> SamplerStateDesc {
    let mut desc = *desc;
    if profile == GraphicsProfile::Level9_1 {
        desc.max_anisotropy = desc.max_anisotropy.min(2);
        for mode in [
            &mut desc.address_u,
            &mut desc.address_v,
            &mut desc.address_w,
        ] {
            if *mode == TextureAddressMode::MirrorOnce {
                *mode = TextureAddressMode::Mirror;
            }
        }
    }
    desc
}

#[cfg(test)]
mod tests {
    use crate::device::sampler::{native_sampler_desc, SamplerState};
    use crate::device::tests::test_device;
    use crate::null::{object_kind, NullObjectKind};
    use ze_gfx::backend::GraphicsProfile;
    use ze_gfx::pipeline::{SamplerStateDesc, TextureAddressMode, TextureFilter};

    fn mirror_once() -> SamplerStateDesc {
        SamplerStateDesc {
            filter: TextureFilter::Anisotropic,
            address_u: TextureAddressMode::MirrorOnce,
            address_v: TextureAddressMode::Clamp,
            address_w: TextureAddressMode::MirrorOnce,
            max_anisotropy: 16,
            ..Default::default()
        }
    }

    #[test]
    fn level_9_1_limits() {
        let desc = native_sampler_desc(GraphicsProfile::Level9_1, &mirror_once());
        assert_eq!(desc.max_anisotropy, 2);
        assert_eq!(desc.address_u, TextureAddressMode::Mirror);
        assert_eq!(desc.address_v, TextureAddressMode::Clamp);
        assert_eq!(desc.address_w, TextureAddressMode::Mirror);

        assert_eq!(
            native_sampler_desc(GraphicsProfile::Level9_3, &mirror_once()),
            mirror_once()
        );
    }

    #[test]
    fn recreated_on_reset() {
        let (device, _) = test_device();
        let mut sampler = SamplerState::new(&device, &mirror_once()).unwrap();
        let before = sampler.native_sampler().clone();
        match object_kind(&before) {
            Some(NullObjectKind::SamplerState(desc)) => assert_eq!(*desc, mirror_once()),
            other => panic!("unexpected object {:?}", other),
        }

        assert_eq!(sampler.on_recreate(), Ok(true));
        assert_ne!(sampler.native_sampler(), &before);
    }
}
