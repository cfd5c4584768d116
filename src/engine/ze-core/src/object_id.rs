use std::fmt;
use uuid::Uuid;

const CONTENT_NAMESPACE: Uuid = Uuid::from_u128(0x6d2c_6f1e_5a0b_4f53_9e0c_4a1d_7b3e_2f10);

/// Content-derived identifier: equal bytes always give the same id
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug, Default)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub fn from_content(data: &[u8]) -> Self {
        Self(Uuid::new_v5(&CONTENT_NAMESPACE, data))
    }

    /// Combine several ids, order matters
    pub fn combine<'a>(ids: impl IntoIterator<Item = &'a ObjectId>) -> Self {
        let mut bytes = Vec::new();
        for id in ids {
            bytes.extend_from_slice(id.0.as_bytes());
        }
        Self::from_content(&bytes)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::object_id::ObjectId;

    #[test]
    fn same_content_same_id() {
        let a = ObjectId::from_content(b"DXBC vertex");
        let b = ObjectId::from_content(&b"DXBC vertex".to_vec());
        assert_eq!(a, b);
        assert_ne!(a, ObjectId::from_content(b"DXBC pixel"));
        assert!(!a.is_empty());
        assert!(ObjectId::default().is_empty());
    }

    #[test]
    fn combine_is_order_sensitive() {
        let a = ObjectId::from_content(b"a");
        let b = ObjectId::from_content(b"b");
        assert_eq!(ObjectId::combine([&a, &b]), ObjectId::combine(&[a, b]));
        assert_ne!(ObjectId::combine([&a, &b]), ObjectId::combine([&b, &a]));
    }
}
