use crate::native::desc::CpuAccessFlags;
use crate::native::NativeObject;
use enumflags2::BitFlags;
use ze_gfx::resource::GraphicsResourceUsage;

/// Anything the command list can bind, copy or map
pub trait GraphicsResource: Send + Sync {
    fn native_resource(&self) -> &NativeObject;
    fn native_shader_resource_view(&self) -> Option<&NativeObject>;
    fn native_unordered_access_view(&self) -> Option<&NativeObject>;

    /// When set, the next `WriteNoOverwrite` map of the resource renames it instead
    fn discard_next_map(&self) -> bool;
    fn set_discard_next_map(&self, discard: bool);
}

pub(crate) fn cpu_access_flags(usage: GraphicsResourceUsage) -> BitFlags<CpuAccessFlags> {
    match usage {
        GraphicsResourceUsage::Dynamic => CpuAccessFlags::Write.into(),
        GraphicsResourceUsage::Staging => CpuAccessFlags::Read | CpuAccessFlags::Write,
        _ => BitFlags::empty(),
    }
}

#[cfg(test)]
mod tests {
    use crate::device::resource::cpu_access_flags;
    use crate::native::desc::CpuAccessFlags;
    use ze_gfx::resource::GraphicsResourceUsage;

    #[test]
    fn cpu_access_follows_usage() {
        assert!(cpu_access_flags(GraphicsResourceUsage::Default).is_empty());
        assert!(cpu_access_flags(GraphicsResourceUsage::Immutable).is_empty());
        assert_eq!(
            cpu_access_flags(GraphicsResourceUsage::Dynamic),
            CpuAccessFlags::Write
        );
        assert_eq!(
            cpu_access_flags(GraphicsResourceUsage::Staging),
            CpuAccessFlags::Read | CpuAccessFlags::Write
        );
    }
}
