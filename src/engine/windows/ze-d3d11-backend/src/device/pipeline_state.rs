use crate::device::GraphicsDevice;
use crate::native::desc::StreamOutputDesc;
use crate::native::{NativeContext, NativeObject};
use crate::pipeline_manager::DevicePipelineStateCache;
use std::sync::Arc;
use ze_core::ObjectId;
use ze_gfx::backend::DeviceError;
use ze_gfx::pipeline::{
    EffectBytecode, PipelineStateDesc, PrimitiveType, ShaderStage, SHADER_STAGE_COUNT,
};

/// Every native object a draw needs, acquired from the device caches.
/// Partially built states release what they hold when dropped.
pub struct PipelineState {
    cache: Arc<DevicePipelineStateCache>,
    effect_id: Option<ObjectId>,
    shaders: [Option<NativeObject>; SHADER_STAGE_COUNT],
    /// Stream output geometry shaders are owned, not cached
    owns_geometry_shader: bool,
    blend_state: Option<NativeObject>,
    sample_mask: u32,
    rasterizer_state: Option<NativeObject>,
    depth_stencil_state: Option<NativeObject>,
    input_layout: Option<NativeObject>,
    primitive_type: PrimitiveType,
}

impl PipelineState {
    pub fn new(device: &GraphicsDevice, desc: &PipelineStateDesc) -> Result<Self, DeviceError> {
        let mut state = Self {
            cache: device.pipeline_state_cache(),
            effect_id: desc.effect.as_ref().map(|effect| effect.id),
            shaders: Default::default(),
            owns_geometry_shader: false,
            blend_state: None,
            sample_mask: desc.sample_mask,
            rasterizer_state: None,
            depth_stencil_state: None,
            input_layout: None,
            primitive_type: desc.primitive_type,
        };

        let mut input_signature = None;
        if let Some(effect) = &desc.effect {
            state.create_shaders(device, effect)?;
            input_signature = effect
                .stage(ShaderStage::Vertex)
                .map(|bytecode| bytecode.data.clone());
        }

        state.blend_state = Some(state.cache.acquire_blend_state(&desc.blend_state)?);
        state.rasterizer_state = Some(
            state
                .cache
                .acquire_rasterizer_state(&desc.rasterizer_state)?,
        );
        state.depth_stencil_state = Some(
            state
                .cache
                .acquire_depth_stencil_state(&desc.depth_stencil_state)?,
        );

        if let Some(input_elements) = &desc.input_elements {
            let signature = input_signature.ok_or(DeviceError::InvalidParameters)?;
            state.input_layout = Some(
                device
                    .native_device()
                    .create_input_layout(input_elements, &signature)?,
            );
        }

        Ok(state)
    }

    fn create_shaders(
        &mut self,
        device: &GraphicsDevice,
        effect: &EffectBytecode,
    ) -> Result<(), DeviceError> {
        for bytecode in &effect.stages {
            let index = bytecode
                .stage
                .index()
                .ok_or(DeviceError::InvalidParameters)?;

            if bytecode.stage == ShaderStage::Geometry && !effect.stream_output_elements.is_empty()
            {
                let stream_output = StreamOutputDesc {
                    elements: effect.stream_output_elements.clone(),
                    strides: effect.stream_output_strides.clone(),
                    rasterized_stream: effect.stream_output_rasterized_stream,
                };
                self.shaders[index] = Some(
                    device
                        .native_device()
                        .create_geometry_shader_with_stream_output(
                            &bytecode.data,
                            &stream_output,
                        )?,
                );
                self.owns_geometry_shader = true;
            } else {
                self.shaders[index] = Some(self.cache.acquire_shader(bytecode)?);
            }
        }

        Ok(())
    }

    pub fn effect_id(&self) -> Option<ObjectId> {
        self.effect_id
    }

    pub fn shader(&self, stage: ShaderStage) -> Option<&NativeObject> {
        stage.index().and_then(|index| self.shaders[index].as_ref())
    }

    pub fn sample_mask(&self) -> u32 {
        self.sample_mask
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    pub fn input_layout(&self) -> Option<&NativeObject> {
        self.input_layout.as_ref()
    }

    /// Bind the state, skipping everything `previous` already bound
    pub fn apply(&self, context: &mut dyn NativeContext, previous: Option<&PipelineState>) {
        let effect_changed = previous.map_or(true, |previous| previous.effect_id != self.effect_id);
        if effect_changed {
            for stage in ShaderStage::ALL {
                let shader = self.shader(stage);
                if previous.map_or(true, |previous| previous.shader(stage) != shader) {
                    context.set_shader(stage, shader);
                }
            }
        }

        if previous.map_or(true, |previous| {
            previous.blend_state != self.blend_state || previous.sample_mask != self.sample_mask
        }) {
            let (_, blend_factor, _) = context.om_get_blend_state();
            context.om_set_blend_state(self.blend_state.as_ref(), blend_factor, self.sample_mask);
        }

        if previous.map_or(true, |previous| {
            previous.rasterizer_state != self.rasterizer_state
        }) {
            context.rs_set_state(self.rasterizer_state.as_ref());
        }

        if previous.map_or(true, |previous| {
            previous.depth_stencil_state != self.depth_stencil_state
        }) {
            let (_, stencil_reference) = context.om_get_depth_stencil_state();
            context.om_set_depth_stencil_state(self.depth_stencil_state.as_ref(), stencil_reference);
        }

        if previous.map_or(true, |previous| previous.input_layout != self.input_layout) {
            context.ia_set_input_layout(self.input_layout.as_ref());
        }

        if previous.map_or(true, |previous| {
            previous.primitive_type != self.primitive_type
        }) {
            context.ia_set_primitive_topology(self.primitive_type);
        }
    }
}

impl Drop for PipelineState {
    fn drop(&mut self) {
        for stage in ShaderStage::ALL {
            let Some(index) = stage.index() else { continue };
            if let Some(shader) = self.shaders[index].take() {
                if !(stage == ShaderStage::Geometry && self.owns_geometry_shader) {
                    self.cache.release_shader(stage, &shader);
                }
            }
        }

        if let Some(state) = self.blend_state.take() {
            self.cache.release_blend_state(&state);
        }
        if let Some(state) = self.rasterizer_state.take() {
            self.cache.release_rasterizer_state(&state);
        }
        if let Some(state) = self.depth_stencil_state.take() {
            self.cache.release_depth_stencil_state(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::device::pipeline_state::PipelineState;
    use crate::device::tests::test_device;
    use crate::null::{ContextCommand, NullObjectClass, NullObjectKind};
    use std::sync::Arc;
    use ze_gfx::backend::DeviceError;
    use ze_gfx::pipeline::{
        BlendStateDesc, CullMode, EffectBytecode, InputElementDesc, PipelineStateDesc,
        PrimitiveType, ShaderBytecode, ShaderStage, StreamOutputElement,
    };
    use ze_gfx::PixelFormat;

    fn effect(vertex: &[u8], pixel: &[u8]) -> Arc<EffectBytecode> {
        Arc::new(EffectBytecode::new(vec![
            ShaderBytecode::new(ShaderStage::Vertex, vertex),
            ShaderBytecode::new(ShaderStage::Pixel, pixel),
        ]))
    }

    fn desc(effect: Arc<EffectBytecode>) -> PipelineStateDesc {
        PipelineStateDesc {
            effect: Some(effect),
            input_elements: Some(vec![InputElementDesc::new(
                "POSITION",
                0,
                PixelFormat::R32G32B32Float,
            )]),
            primitive_type: PrimitiveType::TriangleList,
            ..Default::default()
        }
    }

    #[test]
    fn states_share_cached_objects() {
        let (device, _) = test_device();
        let cache = device.pipeline_state_cache();

        let first = PipelineState::new(&device, &desc(effect(&[1], &[2]))).unwrap();
        let second = PipelineState::new(&device, &desc(effect(&[1], &[3]))).unwrap();
        assert_eq!(
            first.shader(ShaderStage::Vertex),
            second.shader(ShaderStage::Vertex)
        );
        assert_ne!(
            first.shader(ShaderStage::Pixel),
            second.shader(ShaderStage::Pixel)
        );
        assert!(first.shader(ShaderStage::Geometry).is_none());
        assert!(first.input_layout().is_some());
        assert_eq!(cache.shader_count(ShaderStage::Pixel), 2);
        assert_eq!(cache.blend_state_count(), 1);

        drop(first);
        assert_eq!(cache.shader_count(ShaderStage::Vertex), 1);
        assert_eq!(cache.shader_count(ShaderStage::Pixel), 1);
        drop(second);
        assert_eq!(cache.shader_count(ShaderStage::Vertex), 0);
        assert_eq!(cache.blend_state_count(), 0);
        assert_eq!(cache.rasterizer_state_count(), 0);
        assert_eq!(cache.depth_stencil_state_count(), 0);
    }

    #[test]
    fn failure_releases_acquired_entries() {
        let (device, adapter) = test_device();
        let cache = device.pipeline_state_cache();
        adapter
            .last_device()
            .unwrap()
            .fail_next_creation(NullObjectClass::InputLayout);

        assert_eq!(
            PipelineState::new(&device, &desc(effect(&[1], &[2]))).err(),
            Some(DeviceError::OutOfMemory)
        );
        assert_eq!(cache.shader_count(ShaderStage::Vertex), 0);
        assert_eq!(cache.shader_count(ShaderStage::Pixel), 0);
        assert_eq!(cache.blend_state_count(), 0);
        assert_eq!(cache.depth_stencil_state_count(), 0);
    }

    #[test]
    fn input_layout_needs_vertex_shader() {
        let (device, _) = test_device();
        let mut desc = desc(effect(&[1], &[2]));
        desc.effect = Some(Arc::new(EffectBytecode::new(vec![ShaderBytecode::new(
            ShaderStage::Pixel,
            &[2],
        )])));
        assert_eq!(
            PipelineState::new(&device, &desc).err(),
            Some(DeviceError::InvalidParameters)
        );
    }

    #[test]
    fn stream_output_bypasses_cache() {
        let (device, adapter) = test_device();
        let native = adapter.last_device().unwrap();
        let cache = device.pipeline_state_cache();

        let effect = EffectBytecode::new(vec![
            ShaderBytecode::new(ShaderStage::Vertex, &[1]),
            ShaderBytecode::new(ShaderStage::Geometry, &[4]),
        ])
        .with_stream_output(
            vec![StreamOutputElement {
                stream: 0,
                semantic_name: "POSITION".to_string(),
                semantic_index: 0,
                start_component: 0,
                component_count: 4,
                output_slot: 0,
            }],
            vec![16],
            -1,
        );
        let state = PipelineState::new(
            &device,
            &PipelineStateDesc {
                effect: Some(Arc::new(effect)),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(state.shader(ShaderStage::Geometry).is_some());
        assert_eq!(cache.shader_count(ShaderStage::Geometry), 0);
        assert_eq!(
            native.created_count(|kind| matches!(
                kind,
                NullObjectKind::StreamOutputGeometryShader(desc) if desc.strides == vec![16]
                    && desc.rasterized_stream == -1
            )),
            1
        );
        drop(state);
        assert_eq!(cache.shader_count(ShaderStage::Vertex), 0);
    }

    #[test]
    fn apply_only_sets_what_changed() {
        let (device, adapter) = test_device();
        let state = adapter.last_device().unwrap().context_state().clone();

        let first = PipelineState::new(&device, &desc(effect(&[1], &[2]))).unwrap();
        let mut second_desc = desc(effect(&[1], &[3]));
        second_desc.rasterizer_state.cull_mode = CullMode::None;
        let second = PipelineState::new(&device, &second_desc).unwrap();

        {
            let mut context = device.context();
            first.apply(&mut **context, None);
        }
        let commands = state.take_commands();
        assert_eq!(
            commands
                .iter()
                .filter(|command| matches!(command, ContextCommand::SetShader(..)))
                .count(),
            6
        );

        {
            let mut context = device.context();
            second.apply(&mut **context, Some(&first));
        }
        let commands = state.take_commands();
        assert_eq!(
            commands,
            vec![
                ContextCommand::SetShader(
                    ShaderStage::Pixel,
                    second.shader(ShaderStage::Pixel).cloned()
                ),
                ContextCommand::RsSetState(second.rasterizer_state.clone()),
                ContextCommand::IaSetInputLayout(second.input_layout.clone()),
            ]
        );

        // Same effect and states
        {
            let mut context = device.context();
            first.apply(&mut **context, Some(&first));
        }
        assert!(state.take_commands().is_empty());
    }

    #[test]
    fn blend_keeps_factor_and_checks_mask() {
        let (device, adapter) = test_device();
        let state = adapter.last_device().unwrap().context_state().clone();

        let opaque = PipelineState::new(&device, &PipelineStateDesc::default()).unwrap();
        let masked = PipelineState::new(
            &device,
            &PipelineStateDesc {
                sample_mask: 0x1,
                ..Default::default()
            },
        )
        .unwrap();
        let blended = PipelineState::new(
            &device,
            &PipelineStateDesc {
                blend_state: BlendStateDesc::alpha_blend(),
                ..Default::default()
            },
        )
        .unwrap();

        {
            let mut context = device.context();
            context.om_set_blend_state(None, [0.5; 4], u32::MAX);
            state.take_commands();
            masked.apply(&mut **context, Some(&opaque));
            blended.apply(&mut **context, Some(&masked));
        }

        assert_eq!(
            state.take_commands(),
            vec![
                ContextCommand::OmSetBlendState(masked.blend_state.clone(), [0.5; 4], 0x1),
                ContextCommand::OmSetBlendState(
                    blended.blend_state.clone(),
                    [0.5; 4],
                    u32::MAX
                ),
            ]
        );
    }
}
