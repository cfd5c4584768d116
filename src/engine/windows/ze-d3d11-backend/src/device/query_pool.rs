use crate::device::GraphicsDevice;
use crate::native::desc::NativeQueryKind;
use crate::native::NativeObject;
use std::sync::Arc;
use ze_gfx::backend::DeviceError;
use ze_gfx::resource::QueryType;

/// Fixed set of GPU queries read back together
pub struct QueryPool {
    device: Arc<GraphicsDevice>,
    query_type: QueryType,
    queries: Vec<NativeObject>,
}

impl QueryPool {
    pub fn new(
        device: &Arc<GraphicsDevice>,
        query_type: QueryType,
        count: u32,
    ) -> Result<Self, DeviceError> {
        let kind = match query_type {
            QueryType::Timestamp => NativeQueryKind::Timestamp,
            _ => return Err(DeviceError::Unsupported),
        };

        let queries = (0..count)
            .map(|_| device.native_device().create_query(kind))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            device: device.clone(),
            query_type,
            queries,
        })
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub(crate) fn query(&self, index: usize) -> Option<&NativeObject> {
        self.queries.get(index)
    }

    /// Fill `data` with one value per query.
    /// Returns false as soon as a query has no result yet, `data` is then partially written.
    pub fn try_get_data(&self, data: &mut [u64]) -> bool {
        let mut context = self.device.context();
        for (query, value) in self.queries.iter().zip(data.iter_mut()) {
            match context.timestamp_data(query) {
                Some(timestamp) => *value = timestamp,
                None => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::device::query_pool::QueryPool;
    use crate::device::tests::test_device;
    use ze_gfx::backend::DeviceError;
    use ze_gfx::resource::QueryType;

    #[test]
    fn only_timestamps() {
        let (device, _) = test_device();
        assert_eq!(
            QueryPool::new(&device, QueryType::Occlusion, 4).err(),
            Some(DeviceError::Unsupported)
        );

        let pool = QueryPool::new(&device, QueryType::Timestamp, 4).unwrap();
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.query_type(), QueryType::Timestamp);
    }

    #[test]
    fn data_needs_every_query() {
        let (device, adapter) = test_device();
        let state = adapter.last_device().unwrap().context_state().clone();
        let pool = QueryPool::new(&device, QueryType::Timestamp, 2).unwrap();

        let mut data = [0u64; 2];
        assert!(!pool.try_get_data(&mut data));

        device.context().end_query(pool.query(0).unwrap());
        assert!(!pool.try_get_data(&mut data));
        assert_ne!(data[0], 0);

        device.context().end_query(pool.query(1).unwrap());
        state.set_queries_ready(false);
        assert!(!pool.try_get_data(&mut data));

        state.set_queries_ready(true);
        assert!(pool.try_get_data(&mut data));
        assert_ne!(data[0], data[1]);
    }
}
