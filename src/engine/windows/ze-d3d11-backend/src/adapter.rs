use crate::native::desc::AdapterDesc;
use crate::native::{NativeAdapter, NativeFactory};
use crate::output::GraphicsOutput;
use parking_lot::Mutex;
use std::sync::Arc;
use ze_core::ze_info;
use ze_gfx::backend::{DeviceError, GraphicsProfile};

/// Enumerates the adapters of a native factory, in system order
pub struct GraphicsAdapterFactory {
    factory: Arc<dyn NativeFactory>,
    adapters: Vec<Arc<GraphicsAdapter>>,
}

impl GraphicsAdapterFactory {
    pub fn new(factory: Arc<dyn NativeFactory>) -> Result<Self, DeviceError> {
        let mut adapters = vec![];
        for (ordinal, native) in factory.enum_adapters()?.into_iter().enumerate() {
            let adapter = GraphicsAdapter::new(factory.clone(), native, ordinal)?;
            ze_info!("Found adapter: {}", adapter.description());
            adapters.push(Arc::new(adapter));
        }

        Ok(Self { factory, adapters })
    }

    pub fn adapters(&self) -> &[Arc<GraphicsAdapter>] {
        &self.adapters
    }

    pub fn default_adapter(&self) -> Option<Arc<GraphicsAdapter>> {
        self.adapters.first().cloned()
    }

    pub fn native_factory(&self) -> &Arc<dyn NativeFactory> {
        &self.factory
    }
}

#[derive(Default)]
struct ProfileSupportCache {
    maximum_supported: Option<GraphicsProfile>,
    minimum_unsupported: Option<GraphicsProfile>,
}

pub struct GraphicsAdapter {
    native: Arc<dyn NativeAdapter>,
    factory: Arc<dyn NativeFactory>,
    ordinal: usize,
    desc: AdapterDesc,
    outputs: Vec<GraphicsOutput>,
    profile_support: Mutex<ProfileSupportCache>,
}

impl GraphicsAdapter {
    fn new(
        factory: Arc<dyn NativeFactory>,
        native: Arc<dyn NativeAdapter>,
        ordinal: usize,
    ) -> Result<Self, DeviceError> {
        let outputs = native
            .enum_outputs()?
            .into_iter()
            .enumerate()
            .map(|(index, output)| GraphicsOutput::new(index, output, native.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            desc: native.desc(),
            native,
            factory,
            ordinal,
            outputs,
            profile_support: Mutex::default(),
        })
    }

    pub fn description(&self) -> &str {
        self.desc.description.trim_end_matches(char::from(0))
    }

    pub fn vendor_id(&self) -> u32 {
        self.desc.vendor_id
    }

    pub fn device_id(&self) -> u32 {
        self.desc.device_id
    }

    pub fn dedicated_video_memory(&self) -> u64 {
        self.desc.dedicated_video_memory
    }

    pub fn is_default_adapter(&self) -> bool {
        self.ordinal == 0
    }

    /// Locally unique id of the adapter, stable until the next reboot
    pub fn adapter_uid(&self) -> String {
        self.desc.luid.1.to_string()
    }

    pub fn outputs(&self) -> &[GraphicsOutput] {
        &self.outputs
    }

    pub fn is_profile_supported(&self, profile: GraphicsProfile) -> bool {
        {
            let cache = self.profile_support.lock();
            if matches!(cache.maximum_supported, Some(max) if max >= profile) {
                return true;
            }
            if matches!(cache.minimum_unsupported, Some(min) if min <= profile) {
                return false;
            }
        }

        let supported = self.native.is_feature_level_supported(profile);

        let mut cache = self.profile_support.lock();
        if supported {
            cache.maximum_supported = cache.maximum_supported.max(Some(profile));
        } else {
            cache.minimum_unsupported = Some(match cache.minimum_unsupported {
                Some(min) => min.min(profile),
                None => profile,
            });
        }

        supported
    }

    pub fn native_adapter(&self) -> &Arc<dyn NativeAdapter> {
        &self.native
    }

    pub(crate) fn native_factory(&self) -> &Arc<dyn NativeFactory> {
        &self.factory
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::GraphicsAdapterFactory;
    use crate::null::{NullAdapter, NullFactory};
    use std::sync::Arc;
    use ze_core::logger::{register_sink_weak, MemorySink, Severity};
    use ze_gfx::backend::GraphicsProfile;

    #[test]
    fn enumerates_adapters_in_order() {
        let sink = MemorySink::new(Severity::Info);
        register_sink_weak(Arc::downgrade(&sink));

        let first = Arc::new(NullAdapter::new(
            "First\0\0",
            0x10de,
            GraphicsProfile::Level11_1,
        ));
        let second = Arc::new(NullAdapter::new(
            "Second",
            0x8086,
            GraphicsProfile::Level10_0,
        ));
        let factory =
            GraphicsAdapterFactory::new(Arc::new(NullFactory::new(vec![first, second]))).unwrap();

        let adapters = factory.adapters();
        assert_eq!(adapters.len(), 2);
        assert_eq!(adapters[0].description(), "First");
        assert!(adapters[0].is_default_adapter());
        assert!(!adapters[1].is_default_adapter());
        assert_eq!(adapters[1].vendor_id(), 0x8086);
        assert_eq!(adapters[0].adapter_uid(), "4660");
        assert_eq!(
            factory.default_adapter().unwrap().description(),
            "First"
        );
        assert!(sink.contains(Severity::Info, "Found adapter: Second"));
    }

    #[test]
    fn no_adapter() {
        let factory = GraphicsAdapterFactory::new(Arc::new(NullFactory::new(vec![]))).unwrap();
        assert!(factory.default_adapter().is_none());
    }

    #[test]
    fn profile_support_is_cached() {
        let native = Arc::new(NullAdapter::new("Adapter", 0x10de, GraphicsProfile::Level10_1));
        let factory =
            GraphicsAdapterFactory::new(Arc::new(NullFactory::new(vec![native.clone()]))).unwrap();
        let adapter = factory.default_adapter().unwrap();

        assert!(adapter.is_profile_supported(GraphicsProfile::Level10_1));
        assert_eq!(native.check_count(), 1);

        // Anything lower is known supported
        assert!(adapter.is_profile_supported(GraphicsProfile::Level9_3));
        assert_eq!(native.check_count(), 1);

        assert!(!adapter.is_profile_supported(GraphicsProfile::Level11_1));
        assert_eq!(native.check_count(), 2);

        // Anything higher is known unsupported
        assert!(!adapter.is_profile_supported(GraphicsProfile::Level12_0));
        assert_eq!(native.check_count(), 2);

        // Between the bounds the adapter is queried again
        assert!(!adapter.is_profile_supported(GraphicsProfile::Level11_0));
        assert_eq!(native.check_count(), 3);
        assert!(!adapter.is_profile_supported(GraphicsProfile::Level11_1));
        assert_eq!(native.check_count(), 3);
    }

    #[test]
    fn outputs_come_from_the_native_adapter() {
        let (factory, _) = NullFactory::with_default_adapter();
        let factory = GraphicsAdapterFactory::new(factory).unwrap();
        let adapter = factory.default_adapter().unwrap();
        assert_eq!(adapter.outputs().len(), 1);
        assert_eq!(adapter.outputs()[0].desktop_bounds().width, 1920);
    }
}
