use std::any::Any;

use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::binary::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// # Name map resource : 0x0166038C
///
/// Maps 64-bit instance hashes back to the names they were hashed from.
///
/// | Offset | Size | Field |
/// | ------ | ---- | ----- |
/// | 0      | 4    | version, always 1 |
/// | 4      | 4    | entry count |
/// | 8      | -    | entries |
///
/// Each entry:
///
/// | Size | Field |
/// | ---- | ----- |
/// | 8    | hash |
/// | 4    | name length in UTF-16 code units |
/// | 2·n  | name, UTF-16LE, no terminator |
///
/// Entries keep their on-disk order so an unmodified map round-trips
/// byte for byte.
#[derive(Debug, Clone)]
pub struct NameMap {
    key: ResourceKey,
    version: u32,
    entries: Vec<(u64, String)>,
    raw: Vec<u8>,
    dirty: bool,
}

const VERSION: u32 = 1;

impl NameMap {
    pub const TYPE_ID: u32 = 0x0166_038C;

    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "NameMap",
        create: |key, bytes| Ok(Box::new(NameMap::from_bytes(key, bytes)?) as BoxResource),
        create_empty: |key| Box::new(NameMap::new_empty(key)) as BoxResource,
    };

    pub fn new_empty(key: ResourceKey) -> NameMap {
        NameMap {
            key,
            version: VERSION,
            entries: Vec::new(),
            raw: Vec::new(),
            dirty: false,
        }
    }

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> Result<NameMap> {
        if bytes.is_empty() {
            return Ok(NameMap::new_empty(key));
        }

        let mut reader = ByteReader::new(bytes);
        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(Error::invalid("name map version", version, 0));
        }
        let count = reader.read_i32()?;
        if count < 0 {
            return Err(Error::invalid("name map count", count as u32, 4));
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let hash = reader.read_u64()?;
            let length = reader.read_i32()?;
            if length < 0 {
                return Err(Error::invalid(
                    "name length",
                    length as u32,
                    reader.position() as u64 - 4,
                ));
            }
            let name = reader.read_utf16(length as usize)?;
            entries.push((hash, name));
        }

        Ok(NameMap {
            key,
            version,
            entries,
            raw: bytes.to_vec(),
            dirty: false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, hash: u64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(h, _)| *h == hash)
            .map(|(_, name)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> {
        self.entries.iter().map(|(h, name)| (*h, name.as_str()))
    }

    /// Insert or replace the name for `hash`.
    pub fn insert(&mut self, hash: u64, name: impl Into<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(h, _)| *h == hash) {
            Some(entry) => entry.1 = name,
            None => self.entries.push((hash, name)),
        }
        self.dirty = true;
    }

    pub fn remove(&mut self, hash: u64) -> Option<String> {
        let index = self.entries.iter().position(|(h, _)| *h == hash)?;
        self.dirty = true;
        Some(self.entries.remove(index).1)
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_u32(self.version);
        writer.write_i32(self.entries.len() as i32);
        for (hash, name) in &self.entries {
            writer.write_u64(*hash);
            writer.write_i32(name.encode_utf16().count() as i32);
            writer.write_utf16(name);
        }
        writer.into_bytes()
    }
}

impl Resource for NameMap {
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
        if !self.dirty && !self.raw.is_empty() {
            return Ok(self.raw.clone());
        }
        Ok(self.encode())
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

    fn key() -> ResourceKey {
        ResourceKey::new(NameMap::TYPE_ID, 0, 1)
    }

    #[test]
    fn empty_input_installs_defaults() {
        let map = NameMap::from_bytes(key(), &[]).unwrap();
        assert!(map.is_empty());
        let expected = [1u32.to_le_bytes(), 0u32.to_le_bytes()].concat();
        assert_eq!(map.serialize().unwrap(), expected);
    }

    #[test]
    fn known_entry_layout() {
        let mut map = NameMap::new_empty(key());
        map.insert(0xDEAD_BEEF_CAFE_BABE, "name");
        let bytes = map.serialize().unwrap();
        // version + count + hash + length + 4 UTF-16 code units.
        assert_eq!(bytes.len(), 4 + 4 + 8 + 4 + 8);
        assert_eq!(&bytes[0..4], &1u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..16], &0xDEAD_BEEF_CAFE_BABEu64.to_le_bytes());
        assert_eq!(&bytes[16..20], &4u32.to_le_bytes());
        assert_eq!(&bytes[20..], &[b'n', 0, b'a', 0, b'm', 0, b'e', 0]);
    }

    #[test]
    fn unmodified_map_round_trips_exactly() {
        let mut map = NameMap::new_empty(key());
        map.insert(1, "alpha");
        map.insert(2, "beta");
        let bytes = map.serialize().unwrap();
        let reparsed = NameMap::from_bytes(key(), &bytes).unwrap();
        assert_eq!(reparsed.serialize().unwrap(), bytes);
        assert_eq!(reparsed.get(2), Some("beta"));
    }

    #[test]
    fn mutation_toggles_dirty() {
        let mut map = NameMap::from_bytes(key(), &NameMap::new_empty(key()).encode()).unwrap();
        assert!(!map.is_dirty());
        map.insert(5, "five");
        assert!(map.is_dirty());
    }

    #[test]
    fn bad_version_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            NameMap::from_bytes(key(), &bytes),
            Err(Error::InvalidFormat { field: "name map version", value: 2, .. })
        ));
    }
}
