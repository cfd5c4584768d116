use crate::native::{NativeDevice, NativeObject};
use std::sync::Arc;
use ze_core::ObjectId;
use ze_gfx::backend::DeviceError;
use ze_gfx::cache::GraphicsCache;
use ze_gfx::pipeline::{
    BlendStateDesc, DepthStencilStateDesc, RasterizerStateDesc, ShaderBytecode, ShaderStage,
    SHADER_STAGE_COUNT,
};

/// Native shaders and fixed function states shared by every pipeline state of a device
pub struct DevicePipelineStateCache {
    device: Arc<dyn NativeDevice>,
    shaders: [GraphicsCache<ObjectId, NativeObject>; SHADER_STAGE_COUNT],
    blend_states: GraphicsCache<BlendStateDesc, NativeObject>,
    rasterizer_states: GraphicsCache<RasterizerStateDesc, NativeObject>,
    depth_stencil_states: GraphicsCache<DepthStencilStateDesc, NativeObject>,
}

impl DevicePipelineStateCache {
    pub fn new(device: Arc<dyn NativeDevice>) -> Self {
        Self {
            device,
            shaders: Default::default(),
            blend_states: GraphicsCache::new(),
            rasterizer_states: GraphicsCache::new(),
            depth_stencil_states: GraphicsCache::new(),
        }
    }

    fn shader_cache(
        &self,
        stage: ShaderStage,
    ) -> Result<&GraphicsCache<ObjectId, NativeObject>, DeviceError> {
        stage
            .index()
            .map(|index| &self.shaders[index])
            .ok_or(DeviceError::InvalidParameters)
    }

    pub fn acquire_shader(&self, bytecode: &ShaderBytecode) -> Result<NativeObject, DeviceError> {
        self.shader_cache(bytecode.stage)?
            .acquire(&bytecode.id, |_| {
                self.device.create_shader(bytecode.stage, &bytecode.data)
            })
    }

    pub fn release_shader(&self, stage: ShaderStage, shader: &NativeObject) -> bool {
        match self.shader_cache(stage) {
            Ok(cache) => cache.release(shader),
            Err(_) => false,
        }
    }

    pub fn acquire_blend_state(&self, desc: &BlendStateDesc) -> Result<NativeObject, DeviceError> {
        self.blend_states
            .acquire(desc, |desc| self.device.create_blend_state(desc))
    }

    pub fn release_blend_state(&self, state: &NativeObject) -> bool {
        self.blend_states.release(state)
    }

    pub fn acquire_rasterizer_state(
        &self,
        desc: &RasterizerStateDesc,
    ) -> Result<NativeObject, DeviceError> {
        self.rasterizer_states
            .acquire(desc, |desc| self.device.create_rasterizer_state(desc))
    }

    pub fn release_rasterizer_state(&self, state: &NativeObject) -> bool {
        self.rasterizer_states.release(state)
    }

    pub fn acquire_depth_stencil_state(
        &self,
        desc: &DepthStencilStateDesc,
    ) -> Result<NativeObject, DeviceError> {
        self.depth_stencil_states
            .acquire(desc, |desc| self.device.create_depth_stencil_state(desc))
    }

    pub fn release_depth_stencil_state(&self, state: &NativeObject) -> bool {
        self.depth_stencil_states.release(state)
    }

    pub fn shader_count(&self, stage: ShaderStage) -> usize {
        self.shader_cache(stage).map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn blend_state_count(&self) -> usize {
        self.blend_states.len()
    }

    pub fn rasterizer_state_count(&self) -> usize {
        self.rasterizer_states.len()
    }

    pub fn depth_stencil_state_count(&self) -> usize {
        self.depth_stencil_states.len()
    }

    pub fn dispose(&self) {
        for cache in &self.shaders {
            cache.dispose_all();
        }
        self.blend_states.dispose_all();
        self.rasterizer_states.dispose_all();
        self.depth_stencil_states.dispose_all();
    }
}

#[cfg(test)]
mod tests {
    use crate::null::{NullDevice, NullObjectClass, NullObjectKind};
    use crate::pipeline_manager::DevicePipelineStateCache;
    use std::sync::Arc;
    use ze_gfx::backend::{DeviceError, GraphicsProfile};
    use ze_gfx::pipeline::{BlendStateDesc, DepthStencilStateDesc, ShaderBytecode, ShaderStage};

    fn cache() -> (DevicePipelineStateCache, Arc<NullDevice>) {
        let device = Arc::new(NullDevice::new(GraphicsProfile::Level11_0));
        (DevicePipelineStateCache::new(device.clone()), device)
    }

    #[test]
    fn equal_bytecode_shares_the_shader() {
        let (cache, device) = cache();
        let first = ShaderBytecode::new(ShaderStage::Pixel, &[1, 2, 3]);
        let same = ShaderBytecode::new(ShaderStage::Pixel, &[1, 2, 3]);
        let other = ShaderBytecode::new(ShaderStage::Pixel, &[4, 5, 6]);

        let a = cache.acquire_shader(&first).unwrap();
        let b = cache.acquire_shader(&same).unwrap();
        let c = cache.acquire_shader(&other).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            device.created_count(|kind| matches!(kind, NullObjectKind::Shader(_))),
            2
        );

        assert!(!cache.release_shader(ShaderStage::Pixel, &a));
        assert!(cache.release_shader(ShaderStage::Pixel, &b));
        assert_eq!(cache.shader_count(ShaderStage::Pixel), 1);
    }

    #[test]
    fn stages_have_separate_caches() {
        let (cache, _device) = cache();
        let vertex = ShaderBytecode::new(ShaderStage::Vertex, &[9]);
        let compute = ShaderBytecode::new(ShaderStage::Compute, &[9]);

        let a = cache.acquire_shader(&vertex).unwrap();
        let b = cache.acquire_shader(&compute).unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.shader_count(ShaderStage::Vertex), 1);
        assert_eq!(cache.shader_count(ShaderStage::Compute), 1);

        // Wrong stage is not found
        assert!(!cache.release_shader(ShaderStage::Vertex, &b));
        assert!(!cache.release_shader(ShaderStage::None, &a));
    }

    #[test]
    fn failed_creation_is_not_cached() {
        let (cache, device) = cache();
        device.fail_next_creation(NullObjectClass::State);

        let desc = BlendStateDesc::alpha_blend();
        assert_eq!(
            cache.acquire_blend_state(&desc),
            Err(DeviceError::OutOfMemory)
        );
        assert_eq!(cache.blend_state_count(), 0);

        let state = cache.acquire_blend_state(&desc).unwrap();
        assert_eq!(cache.acquire_blend_state(&desc).unwrap(), state);
        assert_eq!(cache.blend_state_count(), 1);
    }

    #[test]
    fn dispose_empties_every_cache() {
        let (cache, _device) = cache();
        let state = cache
            .acquire_depth_stencil_state(&DepthStencilStateDesc::default())
            .unwrap();
        cache
            .acquire_rasterizer_state(&Default::default())
            .unwrap();

        cache.dispose();
        assert_eq!(cache.depth_stencil_state_count(), 0);
        assert_eq!(cache.rasterizer_state_count(), 0);
        assert!(!cache.release_depth_stencil_state(&state));
    }
}
