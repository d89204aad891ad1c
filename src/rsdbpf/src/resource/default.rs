use std::any::Any;

use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::Result;

/// Fallback wrapper for type ids with no registered factory: holds the
/// raw payload bytes and serializes them unchanged.
#[derive(Debug, Clone)]
pub struct DefaultResource {
    key: ResourceKey,
    bytes: Vec<u8>,
    dirty: bool,
}

impl DefaultResource {
    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "Default",
        create: |key, bytes| Ok(Box::new(DefaultResource::from_bytes(key, bytes)) as BoxResource),
        create_empty: |key| Box::new(DefaultResource::new_empty(key)) as BoxResource,
    };

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> DefaultResource {
        DefaultResource {
            key,
            bytes: bytes.to_vec(),
            dirty: false,
        }
    }

    pub fn new_empty(key: ResourceKey) -> DefaultResource {
        DefaultResource::from_bytes(key, &[])
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
        self.dirty = true;
    }
}

impl Resource for DefaultResource {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_round_trip() {
        let key = ResourceKey::new(0xFFFF_0000, 0, 7);
        let resource = DefaultResource::from_bytes(key, &[9, 8, 7]);
        assert!(!resource.is_dirty());
        assert_eq!(resource.serialize().unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn mutation_marks_dirty() {
        let mut resource = DefaultResource::new_empty(ResourceKey::new(1, 2, 3));
        resource.set_bytes(vec![1]);
        assert!(resource.is_dirty());
        assert_eq!(resource.serialize().unwrap(), vec![1]);
    }
}
