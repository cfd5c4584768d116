use crate::adapter::GraphicsAdapter;
use crate::device::command_list::CommandList;
use crate::device::resource::GraphicsResource;
use crate::native::desc::{DeviceRemovedReason, NativeQueryKind};
use crate::native::{NativeContext, NativeDevice, NativeObject};
use crate::pipeline_manager::DevicePipelineStateCache;
use enumflags2::BitFlags;
use parking_lot::{Mutex, MutexGuard};
use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use ze_core::{ze_info, ze_warn};
use ze_gfx::backend::{
    DeviceCreationFlags, DeviceError, GraphicsDeviceDesc, GraphicsDeviceFeatures,
    GraphicsDeviceStatus, GraphicsProfile,
};
use ze_gfx::pipeline::{CompareFunction, PipelineStateDesc};

pub mod buffer;
pub mod command_list;
pub mod features;
pub mod pipeline_state;
pub mod presenter;
pub mod query_pool;
pub mod resource;
pub mod sampler;
pub mod texture;

pub const CONSTANT_BUFFER_DATA_PLACEMENT_ALIGNMENT: u32 = 16;

const INTEL_VENDOR_ID: u32 = 0x8086;

#[derive(Default)]
struct FrameQueries {
    /// Ended queries, oldest first
    disjoint: VecDeque<NativeObject>,
    in_flight: Vec<NativeObject>,
}

pub struct GraphicsDevice {
    adapter: Arc<GraphicsAdapter>,
    native_device: Arc<dyn NativeDevice>,
    context: Mutex<Box<dyn NativeContext>>,
    requested_profile: GraphicsProfile,
    shader_profile: Option<GraphicsProfile>,
    features: GraphicsDeviceFeatures,
    creation_flags: BitFlags<DeviceCreationFlags>,
    renderer_name: String,
    default_pipeline_state_desc: PipelineStateDesc,
    shared_data: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    main_command_list_taken: AtomicBool,
    simulate_reset: AtomicBool,
    buffer_memory: AtomicI64,
    texture_memory: AtomicI64,
    frame_queries: Mutex<FrameQueries>,
    frame_triangle_count: AtomicU64,
    frame_draw_calls: AtomicU64,
    timestamp_frequency: AtomicU64,
}

impl GraphicsDevice {
    /// Create a device on `adapter` with the first profile of `desc` that works
    pub fn new(
        adapter: Arc<GraphicsAdapter>,
        desc: &GraphicsDeviceDesc,
    ) -> Result<Arc<Self>, DeviceError> {
        let graphics_debugger_attached = adapter.native_factory().is_graphics_debugger_attached();

        let mut last_error = DeviceError::InvalidParameters;
        let mut created = None;
        for profile in &desc.profiles {
            let mut level = *profile;

            // Intel drivers do not handle 9.x levels properly
            if adapter.vendor_id() == INTEL_VENDOR_ID && level < GraphicsProfile::Level10_0 {
                ze_warn!("Profile {} is not reliable on Intel adapters, using 10_0", level);
                level = GraphicsProfile::Level10_0;
            }

            if graphics_debugger_attached && level < GraphicsProfile::Level11_0 {
                ze_warn!("Graphics debugger attached, raising profile {} to 11_0", level);
                level = GraphicsProfile::Level11_0;
            }

            match adapter.native_adapter().create_device(&[level], desc.flags) {
                Ok(handles) => {
                    created = Some((*profile, handles));
                    break;
                }
                Err(error) => {
                    ze_warn!("Failed to create a device with profile {}: {}", level, error);
                    last_error = error;
                }
            }
        }

        let (requested_profile, handles) = created.ok_or(last_error)?;

        let shader_profile = if adapter.vendor_id() == INTEL_VENDOR_ID
            && requested_profile < GraphicsProfile::Level10_0
        {
            Some(GraphicsProfile::Level10_0)
        } else {
            None
        };

        let features = features::query_features(handles.device.as_ref(), requested_profile)?;

        ze_info!(
            "Created device on {} (requested profile {}, current profile {})",
            adapter.description(),
            requested_profile,
            features.current_profile
        );

        let mut default_pipeline_state_desc = PipelineStateDesc::default();
        // Native state after ClearState uses Less
        default_pipeline_state_desc
            .depth_stencil_state
            .depth_buffer_function = CompareFunction::Less;

        Ok(Arc::new(Self {
            renderer_name: adapter.description().to_string(),
            adapter,
            native_device: handles.device,
            context: Mutex::new(handles.immediate_context),
            requested_profile,
            shader_profile,
            features,
            creation_flags: desc.flags,
            default_pipeline_state_desc,
            shared_data: Mutex::default(),
            main_command_list_taken: AtomicBool::new(false),
            simulate_reset: AtomicBool::new(false),
            buffer_memory: AtomicI64::new(0),
            texture_memory: AtomicI64::new(0),
            frame_queries: Mutex::default(),
            frame_triangle_count: AtomicU64::new(0),
            frame_draw_calls: AtomicU64::new(0),
            timestamp_frequency: AtomicU64::new(0),
        }))
    }

    pub fn adapter(&self) -> &Arc<GraphicsAdapter> {
        &self.adapter
    }

    pub fn native_device(&self) -> &Arc<dyn NativeDevice> {
        &self.native_device
    }

    pub(crate) fn context(&self) -> MutexGuard<'_, Box<dyn NativeContext>> {
        self.context.lock()
    }

    pub fn features(&self) -> &GraphicsDeviceFeatures {
        &self.features
    }

    pub fn requested_profile(&self) -> GraphicsProfile {
        self.requested_profile
    }

    /// Profile shaders must be compiled for
    pub fn shader_profile(&self) -> GraphicsProfile {
        self.shader_profile.unwrap_or(self.requested_profile)
    }

    pub fn current_profile(&self) -> GraphicsProfile {
        self.features.current_profile
    }

    pub fn renderer_name(&self) -> &str {
        &self.renderer_name
    }

    pub fn creation_flags(&self) -> BitFlags<DeviceCreationFlags> {
        self.creation_flags
    }

    pub fn is_debug_mode(&self) -> bool {
        self.creation_flags.contains(DeviceCreationFlags::Debug)
    }

    pub fn default_pipeline_state_desc(&self) -> &PipelineStateDesc {
        &self.default_pipeline_state_desc
    }

    /// Per device singleton of type `T`, created on first access
    pub fn get_or_create_shared_data<T, F>(&self, create: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce(&Self) -> T,
    {
        let mut shared_data = self.shared_data.lock();
        if let Some(data) = shared_data
            .get(&TypeId::of::<T>())
            .and_then(|data| data.clone().downcast::<T>().ok())
        {
            return data;
        }

        let data = Arc::new(create(self));
        shared_data.insert(TypeId::of::<T>(), data.clone());
        data
    }

    fn shared_data<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.shared_data
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|data| data.clone().downcast::<T>().ok())
    }

    pub fn pipeline_state_cache(&self) -> Arc<DevicePipelineStateCache> {
        self.get_or_create_shared_data(|device| {
            DevicePipelineStateCache::new(device.native_device.clone())
        })
    }

    /// The device has a single command list bound to the immediate context
    pub fn create_command_list(self: &Arc<Self>) -> Result<CommandList, DeviceError> {
        if self.main_command_list_taken.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::InvalidOperation);
        }

        CommandList::new(self.clone())
    }

    pub fn begin_frame(&self) -> Result<(), DeviceError> {
        self.frame_triangle_count.store(0, Ordering::Relaxed);
        self.frame_draw_calls.store(0, Ordering::Relaxed);

        let mut queries = self.frame_queries.lock();
        let mut context = self.context.lock();

        // Reuse the oldest query once the GPU is done with it
        let reusable = queries
            .disjoint
            .front()
            .and_then(|query| context.timestamp_disjoint_data(query));

        let query = match reusable {
            Some(data) => {
                self.timestamp_frequency
                    .store(data.frequency, Ordering::Relaxed);
                queries.disjoint.pop_front()
            }
            None => None,
        };

        let query = match query {
            Some(query) => query,
            None => self
                .native_device
                .create_query(NativeQueryKind::TimestampDisjoint)?,
        };

        context.begin_query(&query);
        queries.in_flight.push(query);
        Ok(())
    }

    pub fn end_frame(&self) -> Result<(), DeviceError> {
        let mut queries = self.frame_queries.lock();
        let query = queries
            .in_flight
            .pop()
            .ok_or(DeviceError::InvalidOperation)?;

        self.context.lock().end_query(&query);
        queries.disjoint.push_back(query);
        Ok(())
    }

    /// Tick frequency of timestamp queries, known once a frame query completed
    pub fn timestamp_frequency(&self) -> u64 {
        self.timestamp_frequency.load(Ordering::Relaxed)
    }

    pub fn frame_triangle_count(&self) -> u64 {
        self.frame_triangle_count.load(Ordering::Relaxed)
    }

    pub fn frame_draw_calls(&self) -> u64 {
        self.frame_draw_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn count_draw(&self, primitive_count: u64) {
        self.frame_draw_calls.fetch_add(1, Ordering::Relaxed);
        self.frame_triangle_count
            .fetch_add(primitive_count, Ordering::Relaxed);
    }

    pub fn graphics_device_status(&self) -> GraphicsDeviceStatus {
        if self.simulate_reset.swap(false, Ordering::SeqCst) {
            return GraphicsDeviceStatus::Reset;
        }

        match self.native_device.device_removed_reason() {
            None => GraphicsDeviceStatus::Normal,
            Some(DeviceRemovedReason::Removed) => GraphicsDeviceStatus::Removed,
            Some(DeviceRemovedReason::Reset) => GraphicsDeviceStatus::Reset,
            Some(DeviceRemovedReason::Hung) => GraphicsDeviceStatus::Hung,
            Some(DeviceRemovedReason::DriverInternalError) => GraphicsDeviceStatus::InternalError,
            Some(DeviceRemovedReason::InvalidCall) => GraphicsDeviceStatus::InvalidCall,
            Some(DeviceRemovedReason::Other) => GraphicsDeviceStatus::Reset,
        }
    }

    /// Report `Reset` on the next status query
    pub fn simulate_reset(&self) {
        self.simulate_reset.store(true, Ordering::SeqCst);
    }

    pub fn register_buffer_memory_usage(&self, delta: i64) {
        self.buffer_memory.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn register_texture_memory_usage(&self, delta: i64) {
        self.texture_memory.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn buffer_memory(&self) -> i64 {
        self.buffer_memory.load(Ordering::Relaxed)
    }

    pub fn texture_memory(&self) -> i64 {
        self.texture_memory.load(Ordering::Relaxed)
    }

    /// The next no-overwrite map of `resource` discards its content instead
    pub fn tag_resource(&self, resource: &dyn GraphicsResource) {
        resource.set_discard_next_map(true);
    }

    pub(crate) fn set_debug_name(&self, object: &NativeObject, name: &str) {
        if self.is_debug_mode() {
            self.native_device.set_debug_name(object, name);
        }
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        {
            let mut queries = self.frame_queries.lock();
            queries.disjoint.clear();
            queries.in_flight.clear();
        }

        {
            let mut context = self.context.lock();
            context.clear_state();
            context.flush();
        }

        if let Some(cache) = self.shared_data::<DevicePipelineStateCache>() {
            cache.dispose();
        }

        if self.is_debug_mode() {
            ze_info!("Reporting live objects of {}", self.renderer_name);
            self.native_device.report_live_objects();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::adapter::GraphicsAdapterFactory;
    use crate::device::buffer::Buffer;
    use crate::device::GraphicsDevice;
    use crate::native::desc::DeviceRemovedReason;
    use crate::null::{ContextCommand, NullAdapter, NullFactory, NullObjectKind};
    use crate::native::desc::NativeQueryKind;
    use std::sync::Arc;
    use ze_core::logger::{register_sink_weak, MemorySink, Severity};
    use ze_gfx::backend::{
        DeviceCreationFlags, DeviceError, GraphicsDeviceDesc, GraphicsDeviceStatus,
        GraphicsProfile,
    };
    use ze_gfx::pipeline::CompareFunction;
    use ze_gfx::resource::{BufferDesc, BufferFlags, GraphicsResourceUsage};

    fn device_on(
        adapter: NullAdapter,
        debugger: bool,
        desc: &GraphicsDeviceDesc,
    ) -> (Result<Arc<GraphicsDevice>, DeviceError>, Arc<NullAdapter>) {
        let adapter = Arc::new(adapter);
        let mut factory = NullFactory::new(vec![adapter.clone()]);
        factory.graphics_debugger_attached = debugger;
        let factory = GraphicsAdapterFactory::new(Arc::new(factory)).unwrap();
        (
            GraphicsDevice::new(factory.default_adapter().unwrap(), desc),
            adapter,
        )
    }

    pub(crate) fn test_device() -> (Arc<GraphicsDevice>, Arc<NullAdapter>) {
        test_device_at(GraphicsProfile::Level11_1)
    }

    /// Debug device on a null adapter limited to `level`
    pub(crate) fn test_device_at(
        level: GraphicsProfile,
    ) -> (Arc<GraphicsDevice>, Arc<NullAdapter>) {
        let (device, adapter) = device_on(
            NullAdapter::new("Test Adapter", 0x10de, level),
            false,
            &GraphicsDeviceDesc {
                profiles: vec![level],
                flags: DeviceCreationFlags::Debug.into(),
                ..Default::default()
            },
        );
        (device.unwrap(), adapter)
    }

    fn profiles(profiles: &[GraphicsProfile]) -> GraphicsDeviceDesc {
        GraphicsDeviceDesc {
            profiles: profiles.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn first_working_profile_wins() {
        let sink = MemorySink::new(Severity::Warn);
        register_sink_weak(Arc::downgrade(&sink));

        let (device, adapter) = device_on(
            NullAdapter::new("Fallback Adapter", 0x10de, GraphicsProfile::Level10_1),
            false,
            &profiles(&[
                GraphicsProfile::Level11_1,
                GraphicsProfile::Level11_0,
                GraphicsProfile::Level10_1,
            ]),
        );
        let device = device.unwrap();

        assert_eq!(device.requested_profile(), GraphicsProfile::Level10_1);
        assert_eq!(device.current_profile(), GraphicsProfile::Level10_1);
        assert_eq!(device.renderer_name(), "Fallback Adapter");
        assert_eq!(
            adapter.creation_attempts(),
            vec![
                vec![GraphicsProfile::Level11_1],
                vec![GraphicsProfile::Level11_0],
                vec![GraphicsProfile::Level10_1]
            ]
        );
        assert!(sink.contains(Severity::Warn, "Failed to create a device with profile 11_1"));
    }

    #[test]
    fn last_error_propagates() {
        let (device, adapter) = device_on(
            NullAdapter::new("Old Adapter", 0x10de, GraphicsProfile::Level9_3),
            false,
            &profiles(&[GraphicsProfile::Level11_0, GraphicsProfile::Level10_0]),
        );
        assert_eq!(device.err(), Some(DeviceError::Unsupported));
        assert_eq!(adapter.creation_attempts().len(), 2);
    }

    #[test]
    fn intel_adapters_start_at_10_0() {
        let (device, adapter) = device_on(
            NullAdapter::new("Intel Adapter", 0x8086, GraphicsProfile::Level11_0),
            false,
            &profiles(&[GraphicsProfile::Level9_1]),
        );
        let device = device.unwrap();

        assert_eq!(
            adapter.creation_attempts(),
            vec![vec![GraphicsProfile::Level10_0]]
        );
        assert_eq!(device.requested_profile(), GraphicsProfile::Level9_1);
        assert_eq!(device.shader_profile(), GraphicsProfile::Level10_0);
    }

    #[test]
    fn graphics_debugger_requires_11_0() {
        let (device, adapter) = device_on(
            NullAdapter::new("Adapter", 0x10de, GraphicsProfile::Level11_1),
            true,
            &profiles(&[GraphicsProfile::Level10_0]),
        );
        assert!(device.is_ok());
        assert_eq!(
            adapter.creation_attempts(),
            vec![vec![GraphicsProfile::Level11_0]]
        );
    }

    #[test]
    fn default_pipeline_uses_less() {
        let (device, _) = test_device();
        assert_eq!(
            device
                .default_pipeline_state_desc()
                .depth_stencil_state
                .depth_buffer_function,
            CompareFunction::Less
        );
    }

    #[test]
    fn shared_data_is_created_once() {
        let (device, _) = test_device();
        let first = device.get_or_create_shared_data(|_| 42u32);
        let second = device.get_or_create_shared_data(|_| 7u32);
        assert_eq!(*second, 42);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(
            &device.pipeline_state_cache(),
            &device.pipeline_state_cache()
        ));
    }

    #[test]
    fn single_command_list() {
        let (device, _) = test_device();
        let command_list = device.create_command_list();
        assert!(command_list.is_ok());
        assert_eq!(
            device.create_command_list().err(),
            Some(DeviceError::InvalidOperation)
        );
    }

    #[test]
    fn frame_queries_are_recycled() {
        let (device, adapter) = test_device();
        let native = adapter.last_device().unwrap();
        native.context_state().set_timestamp_frequency(10_000);

        device.begin_frame().unwrap();
        device.end_frame().unwrap();
        device.begin_frame().unwrap();
        device.end_frame().unwrap();

        let query_count = || {
            native.created_count(|kind| {
                *kind == NullObjectKind::Query(NativeQueryKind::TimestampDisjoint)
            })
        };
        // The first query was ready when the second frame began
        assert_eq!(query_count(), 1);
        assert_eq!(device.timestamp_frequency(), 10_000);

        native.context_state().set_queries_ready(false);
        device.begin_frame().unwrap();
        device.end_frame().unwrap();
        assert_eq!(query_count(), 2);
    }

    #[test]
    fn unmatched_end_frame() {
        let (device, _) = test_device();
        assert_eq!(device.end_frame(), Err(DeviceError::InvalidOperation));
    }

    #[test]
    fn device_status() {
        let (device, adapter) = test_device();
        let native = adapter.last_device().unwrap();
        assert_eq!(device.graphics_device_status(), GraphicsDeviceStatus::Normal);

        device.simulate_reset();
        assert_eq!(device.graphics_device_status(), GraphicsDeviceStatus::Reset);
        assert_eq!(device.graphics_device_status(), GraphicsDeviceStatus::Normal);

        for (reason, status) in [
            (DeviceRemovedReason::Removed, GraphicsDeviceStatus::Removed),
            (DeviceRemovedReason::Reset, GraphicsDeviceStatus::Reset),
            (DeviceRemovedReason::Hung, GraphicsDeviceStatus::Hung),
            (
                DeviceRemovedReason::DriverInternalError,
                GraphicsDeviceStatus::InternalError,
            ),
            (DeviceRemovedReason::InvalidCall, GraphicsDeviceStatus::InvalidCall),
            (DeviceRemovedReason::Other, GraphicsDeviceStatus::Reset),
        ] {
            native.set_removed_reason(Some(reason));
            assert_eq!(device.graphics_device_status(), status);
        }
    }

    #[test]
    fn tag_resource_marks_discard() {
        let (device, _) = test_device();
        let buffer = Buffer::new(
            &device,
            &BufferDesc::new(
                64,
                BufferFlags::VertexBuffer.into(),
                GraphicsResourceUsage::Dynamic,
            ),
            None,
        )
        .unwrap();

        use crate::device::resource::GraphicsResource;
        assert!(!buffer.discard_next_map());
        device.tag_resource(&buffer);
        assert!(buffer.discard_next_map());
    }

    #[test]
    fn destroy_clears_context_and_reports_in_debug() {
        let (device, adapter) = device_on(
            NullAdapter::new("Adapter", 0x10de, GraphicsProfile::Level11_1),
            false,
            &GraphicsDeviceDesc {
                flags: DeviceCreationFlags::Debug.into(),
                ..Default::default()
            },
        );
        let device = device.unwrap();
        let native = adapter.last_device().unwrap();
        assert!(device.is_debug_mode());

        let cache = device.pipeline_state_cache();
        cache
            .acquire_blend_state(&Default::default())
            .unwrap();
        drop(device);

        let commands = native.context_state().commands();
        assert_eq!(
            &commands[commands.len() - 2..],
            &[ContextCommand::ClearState, ContextCommand::Flush]
        );
        assert_eq!(cache.blend_state_count(), 0);
        assert_eq!(native.live_object_reports(), 1);
    }
}
