use crate::adapter::{GraphicsAdapter, GraphicsAdapterFactory};
use crate::device::GraphicsDevice;
use crate::native::NativeFactory;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use ze_core::{ze_error, ze_info};
use ze_gfx::backend::{BackendError, DeviceCreationFlags, DeviceError, GraphicsDeviceDesc};

#[cfg(debug_assertions)]
const ENABLE_DEBUG_LAYERS: bool = true;

#[cfg(not(debug_assertions))]
const ENABLE_DEBUG_LAYERS: bool = false;

pub const BACKEND_NAME: &str = "Direct3D 11";

pub struct D3D11Backend {
    adapter_factory: GraphicsAdapterFactory,
    devices: Mutex<Vec<Weak<GraphicsDevice>>>,
}

impl D3D11Backend {
    /// Backend on the system DXGI factory
    pub fn new() -> Result<Arc<D3D11Backend>, BackendError> {
        cfg_if::cfg_if! {
            if #[cfg(windows)] {
                let factory = crate::d3d11::DxgiFactory::new().map_err(|error| {
                    ze_error!("Failed to create DXGI factory: {}", error);
                    BackendError::Unsupported
                })?;
                Self::with_native_factory(Arc::new(factory))
            } else {
                Err(BackendError::Unsupported)
            }
        }
    }

    pub fn with_native_factory(
        factory: Arc<dyn NativeFactory>,
    ) -> Result<Arc<D3D11Backend>, BackendError> {
        if cfg!(feature = "annotations") {
            ze_info!("Annotation events enabled");
        }

        let adapter_factory =
            GraphicsAdapterFactory::new(factory).map_err(|_| BackendError::Unsupported)?;
        if adapter_factory.adapters().is_empty() {
            return Err(BackendError::NoAdapterFound);
        }

        Ok(Arc::new(D3D11Backend {
            adapter_factory,
            devices: Default::default(),
        }))
    }

    pub fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    pub fn adapters(&self) -> &[Arc<GraphicsAdapter>] {
        self.adapter_factory.adapters()
    }

    pub fn create_device(
        &self,
        desc: &GraphicsDeviceDesc,
    ) -> Result<Arc<GraphicsDevice>, DeviceError> {
        let adapter = self
            .adapters()
            .get(desc.adapter_index)
            .cloned()
            .ok_or(DeviceError::NotFound)?;

        let mut desc = desc.clone();
        if ENABLE_DEBUG_LAYERS {
            desc.flags |= DeviceCreationFlags::Debug;
            ze_info!("Using D3D11 debug layer");
        }

        let device = GraphicsDevice::new(adapter, &desc)?;
        let mut devices = self.devices.lock();
        devices.retain(|device| device.strong_count() > 0);
        devices.push(Arc::downgrade(&device));
        Ok(device)
    }

    /// Devices created by this backend that are still alive
    pub fn live_device_count(&self) -> usize {
        self.devices
            .lock()
            .iter()
            .filter(|device| device.strong_count() > 0)
            .count()
    }
}

impl Drop for D3D11Backend {
    fn drop(&mut self) {
        let live_devices = self.live_device_count();
        if live_devices > 0 {
            ze_error!("{} device(s) outlive the D3D11 backend", live_devices);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{D3D11Backend, BACKEND_NAME, ENABLE_DEBUG_LAYERS};
    use crate::null::{NullAdapter, NullFactory};
    use std::sync::Arc;
    use ze_gfx::backend::{
        BackendError, DeviceCreationFlags, DeviceError, GraphicsDeviceDesc, GraphicsProfile,
    };

    #[test]
    fn no_adapter_is_an_error() {
        assert_eq!(
            D3D11Backend::with_native_factory(Arc::new(NullFactory::new(vec![]))).err(),
            Some(BackendError::NoAdapterFound)
        );
    }

    #[test]
    fn devices_use_the_requested_adapter() {
        let first = Arc::new(NullAdapter::new("First", 0x10de, GraphicsProfile::Level11_1));
        let second = Arc::new(NullAdapter::new("Second", 0x1002, GraphicsProfile::Level11_0));
        let backend = D3D11Backend::with_native_factory(Arc::new(NullFactory::new(vec![
            first.clone(),
            second.clone(),
        ])))
        .unwrap();
        assert_eq!(backend.name(), BACKEND_NAME);
        assert_eq!(backend.adapters().len(), 2);

        let device = backend
            .create_device(&GraphicsDeviceDesc {
                adapter_index: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(device.renderer_name(), "Second");
        assert!(first.last_device().is_none());

        let native = second.last_device().unwrap();
        assert!(native.creation_flags().contains(DeviceCreationFlags::BgraSupport));
        assert_eq!(
            native.creation_flags().contains(DeviceCreationFlags::Debug),
            ENABLE_DEBUG_LAYERS
        );
        assert_eq!(backend.live_device_count(), 1);

        drop(device);
        assert_eq!(backend.live_device_count(), 0);
    }

    #[test]
    fn missing_adapter_index() {
        let (factory, _) = NullFactory::with_default_adapter();
        let backend = D3D11Backend::with_native_factory(factory).unwrap();
        assert_eq!(
            backend
                .create_device(&GraphicsDeviceDesc {
                    adapter_index: 3,
                    ..Default::default()
                })
                .err(),
            Some(DeviceError::NotFound)
        );
    }
}
