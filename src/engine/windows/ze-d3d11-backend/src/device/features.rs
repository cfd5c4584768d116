use crate::native::NativeDevice;
use std::collections::HashMap;
use ze_gfx::backend::{DeviceError, FormatFeatures, GraphicsDeviceFeatures, GraphicsProfile};
use ze_gfx::resource::MultisampleCount;
use ze_gfx::PixelFormat;

/// Query what `device` can do
pub(crate) fn query_features(
    device: &dyn NativeDevice,
    requested_profile: GraphicsProfile,
) -> Result<GraphicsDeviceFeatures, DeviceError> {
    let current_profile = device.feature_level();
    let threading = device.threading_support();

    let mut format_features = HashMap::new();
    for format in PixelFormat::ALL {
        if format == PixelFormat::Unknown {
            continue;
        }

        format_features.insert(
            format,
            FormatFeatures {
                maximum_multisample_count: maximum_multisample_count(device, format),
                format_support: device.format_support(format)?,
            },
        );
    }

    Ok(GraphicsDeviceFeatures {
        requested_profile,
        current_profile,
        has_compute_shaders: device.has_compute_shaders(),
        has_double_precision: device.has_double_precision(),
        has_multithreading_concurrent_resources: threading.concurrent_creates,
        has_driver_command_lists: threading.command_lists,
        has_srgb: true,
        has_resource_renaming: true,
        has_depth_as_srv: current_profile >= GraphicsProfile::Level10_0,
        has_depth_as_read_only_rt: current_profile >= GraphicsProfile::Level11_0,
        has_multisample_depth_as_srv: current_profile >= GraphicsProfile::Level11_0,
        format_features,
    })
}

fn maximum_multisample_count(device: &dyn NativeDevice, format: PixelFormat) -> MultisampleCount {
    MultisampleCount::ALL
        .into_iter()
        .filter(|count| device.multisample_quality_levels(format, count.count()) != 0)
        .max()
        .unwrap_or(MultisampleCount::None)
}

#[cfg(test)]
mod tests {
    use crate::device::features::query_features;
    use crate::null::NullDevice;
    use ze_gfx::backend::GraphicsProfile;
    use ze_gfx::resource::MultisampleCount;
    use ze_gfx::PixelFormat;

    #[test]
    fn profile_dependent_features() {
        let features =
            query_features(&NullDevice::new(GraphicsProfile::Level10_0), GraphicsProfile::Level11_0)
                .unwrap();
        assert_eq!(features.requested_profile, GraphicsProfile::Level11_0);
        assert_eq!(features.current_profile, GraphicsProfile::Level10_0);
        assert!(features.has_depth_as_srv);
        assert!(!features.has_depth_as_read_only_rt);
        assert!(!features.has_multisample_depth_as_srv);
        assert!(features.has_srgb);
        assert!(features.has_resource_renaming);
        assert!(features.has_multithreading_concurrent_resources);
        assert!(!features.has_driver_command_lists);

        let features =
            query_features(&NullDevice::new(GraphicsProfile::Level11_1), GraphicsProfile::Level11_1)
                .unwrap();
        assert!(features.has_depth_as_read_only_rt);
        assert!(features.has_multisample_depth_as_srv);
        assert!(features.has_double_precision);
    }

    #[test]
    fn per_format_features() {
        let features =
            query_features(&NullDevice::new(GraphicsProfile::Level11_0), GraphicsProfile::Level11_0)
                .unwrap();

        // The null device accepts up to 4 samples for plain formats
        assert_eq!(
            features.format(PixelFormat::R8G8B8A8Unorm).maximum_multisample_count,
            MultisampleCount::X4
        );
        assert_eq!(
            features.format(PixelFormat::BC1Unorm).maximum_multisample_count,
            MultisampleCount::None
        );
        assert_ne!(features.format(PixelFormat::R8G8B8A8Unorm).format_support, 0);
        assert!(!features.format_features.contains_key(&PixelFormat::Unknown));
    }
}
