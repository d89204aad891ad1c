use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use super::{
    BoxResource, CasPart, CasPreset, DefaultResource, ImageResource, Modular, NameMap,
    ResourceKey, RleResource, SimData, SimOutfit, SkinTone, Template,
};
use crate::{Error, Result};

/// A parser/serializer pair for one resource type id.
///
/// Factories are plain function pointers, so they are stateless by
/// construction and two registrations of the same wrapper compare equal.
#[derive(Clone, Copy)]
pub struct ResourceFactory {
    /// Wrapper name for diagnostics, e.g. `"NameMap"`.
    pub name: &'static str,
    /// Parse a resource from its payload bytes. An empty span produces a
    /// default-initialized resource.
    pub create: fn(ResourceKey, &[u8]) -> Result<BoxResource>,
    /// Construct an empty resource without parsing.
    pub create_empty: fn(ResourceKey) -> BoxResource,
}

impl PartialEq for ResourceFactory {
    fn eq(&self, other: &ResourceFactory) -> bool {
        self.create as usize == other.create as usize
            && self.create_empty as usize == other.create_empty as usize
    }
}

impl std::fmt::Debug for ResourceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFactory")
            .field("name", &self.name)
            .finish()
    }
}

/// Mapping from 32-bit resource type ids to wrapper factories.
///
/// Unknown type ids fall back to [`DefaultResource`], which holds the raw
/// bytes and serializes them unchanged.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    factories: HashMap<u32, ResourceFactory>,
}

impl ResourceRegistry {
    /// An empty registry with no wrappers at all.
    pub fn new() -> ResourceRegistry {
        ResourceRegistry::default()
    }

    /// A registry pre-seeded with every built-in wrapper.
    pub fn with_builtins() -> ResourceRegistry {
        let mut registry = ResourceRegistry::new();
        for (type_id, factory) in builtin_factories() {
            registry
                .register(type_id, factory)
                .expect("built-in registrations cannot collide");
        }
        registry
    }

    /// Register `factory` for `type_id`.
    ///
    /// Registering the identical factory again is a no-op; registering a
    /// different factory for a taken id fails with
    /// [`Error::DuplicateTypeId`] and leaves the registry unchanged.
    pub fn register(&mut self, type_id: u32, factory: ResourceFactory) -> Result<()> {
        match self.factories.get(&type_id) {
            Some(existing) if *existing == factory => Ok(()),
            Some(_) => Err(Error::DuplicateTypeId(type_id)),
            None => {
                self.factories.insert(type_id, factory);
                Ok(())
            }
        }
    }

    pub fn factory(&self, type_id: u32) -> Option<&ResourceFactory> {
        self.factories.get(&type_id)
    }

    /// Dispatch `bytes` to the wrapper registered for `key.type_id`,
    /// falling back to [`DefaultResource`].
    pub fn create(&self, key: ResourceKey, bytes: &[u8]) -> Result<BoxResource> {
        match self.factory(key.type_id) {
            Some(factory) => (factory.create)(key, bytes),
            None => (DefaultResource::FACTORY.create)(key, bytes),
        }
    }

    /// Construct an empty resource for `key`, using the registered
    /// wrapper's defaults.
    pub fn create_empty(&self, key: ResourceKey) -> BoxResource {
        match self.factory(key.type_id) {
            Some(factory) => (factory.create_empty)(key),
            None => (DefaultResource::FACTORY.create_empty)(key),
        }
    }
}

fn builtin_factories() -> Vec<(u32, ResourceFactory)> {
    let mut list = Vec::new();
    list.push((NameMap::TYPE_ID, NameMap::FACTORY));
    for type_id in ImageResource::TYPE_IDS {
        list.push((*type_id, ImageResource::FACTORY));
    }
    for type_id in RleResource::TYPE_IDS {
        list.push((*type_id, RleResource::FACTORY));
    }
    list.push((SimData::TYPE_ID, SimData::FACTORY));
    list.push((CasPart::TYPE_ID, CasPart::FACTORY));
    list.push((SimOutfit::TYPE_ID, SimOutfit::FACTORY));
    list.push((SkinTone::TYPE_ID, SkinTone::FACTORY));
    list.push((Modular::TYPE_ID, Modular::FACTORY));
    list.push((Template::TYPE_ID, Template::FACTORY));
    list.push((CasPreset::TYPE_ID, CasPreset::FACTORY));
    list
}

static GLOBAL: Lazy<RwLock<ResourceRegistry>> =
    Lazy::new(|| RwLock::new(ResourceRegistry::with_builtins()));

/// The process-wide registry, pre-seeded with the built-in wrappers.
/// Safe for concurrent reads; registrations take the write lock.
pub fn global_registry() -> &'static RwLock<ResourceRegistry> {
    &GLOBAL
}

/// Register a wrapper in the process-wide registry.
pub fn register_global(type_id: u32, factory: ResourceFactory) -> Result<()> {
    global_registry()
        .write()
        .expect("resource registry poisoned")
        .register(type_id, factory)
}

/// Parse `bytes` through the process-wide registry.
pub fn create_resource(key: ResourceKey, bytes: &[u8]) -> Result<BoxResource> {
    global_registry()
        .read()
        .expect("resource registry poisoned")
        .create(key, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reregistering_the_same_factory_is_idempotent() {
        let mut registry = ResourceRegistry::with_builtins();
        registry.register(NameMap::TYPE_ID, NameMap::FACTORY).unwrap();
    }

    #[test]
    fn conflicting_registration_is_rejected() {
        let mut registry = ResourceRegistry::with_builtins();
        assert!(matches!(
            registry.register(NameMap::TYPE_ID, SimData::FACTORY),
            Err(Error::DuplicateTypeId(id)) if id == NameMap::TYPE_ID
        ));
    }

    #[test]
    fn unknown_type_falls_back_to_default() {
        let registry = ResourceRegistry::with_builtins();
        let key = ResourceKey::new(0x1234_5678, 0, 1);
        let resource = registry.create(key, &[1, 2, 3]).unwrap();
        assert_eq!(resource.serialize().unwrap(), vec![1, 2, 3]);
        assert!(resource.as_default_resource().is_some());
    }

    #[test]
    fn known_type_dispatches_to_wrapper() {
        let registry = ResourceRegistry::with_builtins();
        let key = ResourceKey::new(NameMap::TYPE_ID, 0, 1);
        let resource = registry.create(key, &[]).unwrap();
        assert!(resource.as_name_map().is_some());
    }
}
