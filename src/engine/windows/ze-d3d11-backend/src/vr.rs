//! Quad layer overlays composited by a VR runtime

use crate::device::command_list::CommandList;
use crate::device::texture::Texture;
use crate::device::GraphicsDevice;
use crate::native::{NativeDevice, NativeObject};
use std::fmt;
use std::sync::Arc;
use ze_core::maths::{Quaternion, Vec2f32, Vec3f32};
use ze_gfx::backend::DeviceError;

/// Quad layer API of a VR runtime session
pub trait QuadLayerSession {
    type Layer;

    /// Create a layer and its texture ring, returning the ring length
    fn create_quad_layer_textures(
        &self,
        device: &dyn NativeDevice,
        width: u32,
        height: u32,
        mip_levels: u32,
        sample_count: u32,
    ) -> Option<(Self::Layer, usize)>;

    fn quad_layer_texture(&self, layer: &Self::Layer, index: usize) -> Option<NativeObject>;

    fn set_quad_layer_params(
        &self,
        layer: &Self::Layer,
        position: &Vec3f32,
        rotation: &Quaternion,
        surface_size: &Vec2f32,
        follow_head_rotation: bool,
    );

    /// Ring texture the runtime composites next
    fn current_target_index(&self, layer: &Self::Layer) -> usize;

    fn last_error(&self) -> String;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VrError {
    /// Message reported by the VR runtime
    Session(String),
    Device(DeviceError),
}

impl fmt::Display for VrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VrError::Session(message) => write!(f, "VR session error: {}", message),
            VrError::Device(error) => write!(f, "device error: {}", error),
        }
    }
}

impl std::error::Error for VrError {}

impl From<DeviceError> for VrError {
    fn from(error: DeviceError) -> Self {
        VrError::Device(error)
    }
}

pub struct VrOverlay<S: QuadLayerSession> {
    session: Arc<S>,
    layer: S::Layer,
    textures: Vec<Texture>,
    pub position: Vec3f32,
    pub rotation: Quaternion,
    pub surface_size: Vec2f32,
    pub follow_head_rotation: bool,
}

impl<S: QuadLayerSession> VrOverlay<S> {
    pub fn new(
        session: Arc<S>,
        device: &Arc<GraphicsDevice>,
        width: u32,
        height: u32,
        mip_levels: u32,
        sample_count: u32,
    ) -> Result<Self, VrError> {
        let (layer, texture_count) = session
            .create_quad_layer_textures(
                device.native_device().as_ref(),
                width,
                height,
                mip_levels,
                sample_count,
            )
            .ok_or_else(|| VrError::Session(session.last_error()))?;

        let mut textures = Vec::with_capacity(texture_count);
        for index in 0..texture_count {
            let native = session
                .quad_layer_texture(&layer, index)
                .ok_or_else(|| VrError::Session(session.last_error()))?;
            textures.push(Texture::from_native(device, native, false)?);
        }

        Ok(Self {
            session,
            layer,
            textures,
            position: Vec3f32::default(),
            rotation: Quaternion::IDENTITY,
            surface_size: Vec2f32::new(1.0, 1.0),
            follow_head_rotation: false,
        })
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    /// Push the layer parameters and copy `texture` into the ring slot the runtime wants next
    pub fn update_surface(
        &self,
        command_list: &mut CommandList,
        texture: &Texture,
    ) -> Result<(), VrError> {
        self.session.set_quad_layer_params(
            &self.layer,
            &self.position,
            &self.rotation,
            &self.surface_size,
            self.follow_head_rotation,
        );

        let index = self.session.current_target_index(&self.layer);
        let target = self
            .textures
            .get(index)
            .ok_or(DeviceError::InvalidOperation)?;
        command_list.copy(texture, target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::device::command_list::CommandList;
    use crate::device::tests::test_device;
    use crate::device::texture::{native_texture_desc, Texture};
    use crate::native::{NativeDevice, NativeObject};
    use crate::null::ContextCommand;
    use crate::vr::{QuadLayerSession, VrError, VrOverlay};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use ze_core::maths::{Quaternion, Vec2f32, Vec3f32};
    use ze_gfx::backend::{DeviceError, GraphicsProfile};
    use ze_gfx::resource::{TextureDesc, TextureFlags};
    use ze_gfx::PixelFormat;

    #[derive(Default)]
    struct TestSession {
        fail_creation: bool,
        textures: Mutex<Vec<NativeObject>>,
        params: Mutex<Vec<(Vec3f32, bool)>>,
        target_index: AtomicUsize,
    }

    impl QuadLayerSession for TestSession {
        type Layer = u32;

        fn create_quad_layer_textures(
            &self,
            device: &dyn NativeDevice,
            width: u32,
            height: u32,
            mip_levels: u32,
            _sample_count: u32,
        ) -> Option<(u32, usize)> {
            if self.fail_creation {
                return None;
            }

            let mut desc = TextureDesc::new_2d(
                width,
                height,
                PixelFormat::R8G8B8A8Unorm,
                TextureFlags::ShaderResource.into(),
            );
            desc.mip_levels = mip_levels;
            let desc = native_texture_desc(GraphicsProfile::Level11_1, &desc).ok()?;

            let mut textures = self.textures.lock();
            for _ in 0..3 {
                textures.push(device.create_texture(&desc, &[]).ok()?);
            }
            Some((7, textures.len()))
        }

        fn quad_layer_texture(&self, layer: &u32, index: usize) -> Option<NativeObject> {
            assert_eq!(*layer, 7);
            self.textures.lock().get(index).cloned()
        }

        fn set_quad_layer_params(
            &self,
            _layer: &u32,
            position: &Vec3f32,
            _rotation: &Quaternion,
            _surface_size: &Vec2f32,
            follow_head_rotation: bool,
        ) {
            self.params.lock().push((*position, follow_head_rotation));
        }

        fn current_target_index(&self, _layer: &u32) -> usize {
            self.target_index.load(Ordering::SeqCst)
        }

        fn last_error(&self) -> String {
            "HMD lost".to_string()
        }
    }

    #[test]
    fn creation_failure_reports_session_error() {
        let (device, _) = test_device();
        let session = Arc::new(TestSession {
            fail_creation: true,
            ..Default::default()
        });
        assert_eq!(
            VrOverlay::new(session, &device, 256, 256, 1, 1).err(),
            Some(VrError::Session("HMD lost".to_string()))
        );
    }

    #[test]
    fn update_copies_into_current_target() {
        let (device, adapter) = test_device();
        let state = adapter.last_device().unwrap().context_state().clone();
        let session = Arc::new(TestSession::default());
        let mut overlay = VrOverlay::new(session.clone(), &device, 256, 128, 1, 1).unwrap();
        assert_eq!(overlay.textures().len(), 3);
        assert_eq!(overlay.textures()[0].height(), 128);
        assert_eq!(
            overlay.textures()[0].view_format(),
            PixelFormat::R8G8B8A8Unorm
        );

        let mut command_list: CommandList = device.create_command_list().unwrap();
        let source = Texture::new(
            &device,
            &TextureDesc::new_2d(
                256,
                128,
                PixelFormat::R8G8B8A8Unorm,
                TextureFlags::RenderTarget.into(),
            ),
            &[],
        )
        .unwrap();
        state.take_commands();

        overlay.position = Vec3f32::new(0.0, 1.0, -2.0);
        overlay.follow_head_rotation = true;
        session.target_index.store(2, Ordering::SeqCst);
        overlay.update_surface(&mut command_list, &source).unwrap();

        assert_eq!(
            session.params.lock().as_slice(),
            &[(Vec3f32::new(0.0, 1.0, -2.0), true)]
        );
        assert_eq!(
            state.take_commands(),
            vec![ContextCommand::CopyResource {
                destination: overlay.textures()[2].native_texture().clone(),
                source: source.native_texture().clone(),
            }]
        );

        session.target_index.store(3, Ordering::SeqCst);
        assert_eq!(
            overlay.update_surface(&mut command_list, &source),
            Err(VrError::Device(DeviceError::InvalidOperation))
        );
    }
}
