use std::any::Any;

use super::{read_tgi_list, write_tgi_list, TgiBlock, TgiOrder};
use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::binary::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// # User CAS Preset resource : 0xEAA32ADD
///
/// A saved slider configuration: a named set of modifier weights plus the
/// TGI references the preset depends on.
#[derive(Debug, Clone)]
pub struct CasPreset {
    key: ResourceKey,
    raw: Vec<u8>,
    dirty: bool,

    pub version: u32,
    pub age_gender: u32,
    pub name: String,
    /// Uninterpreted; preserved across a round trip.
    pub flags: u32,
    pub modifiers: Vec<PresetModifier>,
    pub tgis: Vec<TgiBlock>,
}

/// One applied modifier: the sculpt/slider hash and its weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetModifier {
    pub modifier_hash: u64,
    pub weight: f32,
}

impl CasPreset {
    pub const TYPE_ID: u32 = 0xEAA3_2ADD;

    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "CasPreset",
        create: |key, bytes| Ok(Box::new(CasPreset::from_bytes(key, bytes)?) as BoxResource),
        create_empty: |key| Box::new(CasPreset::new_empty(key)) as BoxResource,
    };

    pub fn new_empty(key: ResourceKey) -> CasPreset {
        CasPreset {
            key,
            raw: Vec::new(),
            dirty: false,
            version: 1,
            age_gender: 0,
            name: String::new(),
            flags: 0,
            modifiers: Vec::new(),
            tgis: Vec::new(),
        }
    }

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> Result<CasPreset> {
        if bytes.is_empty() {
            return Ok(CasPreset::new_empty(key));
        }

        let mut reader = ByteReader::new(bytes);
        let version = reader.read_u32()?;
        if version != 1 {
            return Err(Error::invalid("preset version", version, 0));
        }
        let age_gender = reader.read_u32()?;
        let name_length = reader.read_u32()?;
        let name = reader.read_utf16(name_length as usize)?;
        let flags = reader.read_u32()?;

        let modifier_count = reader.read_u32()?;
        let mut modifiers = Vec::with_capacity(modifier_count as usize);
        for _ in 0..modifier_count {
            modifiers.push(PresetModifier {
                modifier_hash: reader.read_u64()?,
                weight: reader.read_f32()?,
            });
        }

        let tgi_count = reader.read_u8()?;
        let tgis = read_tgi_list(&mut reader, tgi_count as usize, TgiOrder::Tgi)?;

        Ok(CasPreset {
            key,
            raw: bytes.to_vec(),
            dirty: false,
            version,
            age_gender,
            name,
            flags,
            modifiers,
            tgis,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_u32(self.version);
        writer.write_u32(self.age_gender);
        writer.write_u32(self.name.encode_utf16().count() as u32);
        writer.write_utf16(&self.name);
        writer.write_u32(self.flags);
        writer.write_u32(self.modifiers.len() as u32);
        for modifier in &self.modifiers {
            writer.write_u64(modifier.modifier_hash);
            writer.write_f32(modifier.weight);
        }
        writer.write_u8(self.tgis.len() as u8);
        write_tgi_list(&mut writer, &self.tgis, TgiOrder::Tgi);
        writer.into_bytes()
    }
}

impl Resource for CasPreset {
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
    use crate::binary::fnv64;

    fn key() -> ResourceKey {
        ResourceKey::new(CasPreset::TYPE_ID, 0, 0x8)
    }

    #[test]
    fn round_trip() {
        let mut preset = CasPreset::new_empty(key());
        preset.age_gender = 0x0000_1008;
        preset.name = "My Sim".to_string();
        preset.flags = 0xA5;
        preset.modifiers.push(PresetModifier {
            modifier_hash: fnv64("jaw_width"),
            weight: 0.65,
        });
        preset.tgis.push(TgiBlock::new(0x0354_796A, 0, 0xD00D));
        preset.mark_dirty();

        let bytes = preset.serialize().unwrap();
        let reparsed = CasPreset::from_bytes(key(), &bytes).unwrap();
        assert_eq!(reparsed.name, "My Sim");
        assert_eq!(reparsed.modifiers, preset.modifiers);
        assert_eq!(reparsed.tgis, preset.tgis);
        assert_eq!(reparsed.flags, 0xA5);
        assert_eq!(reparsed.serialize().unwrap(), bytes);
    }

    #[test]
    fn clean_resource_replays_source_bytes() {
        let mut preset = CasPreset::new_empty(key());
        preset.name = "x".to_string();
        preset.mark_dirty();
        let bytes = preset.serialize().unwrap();
        let reparsed = CasPreset::from_bytes(key(), &bytes).unwrap();
        assert!(!reparsed.is_dirty());
        assert_eq!(reparsed.serialize().unwrap(), bytes);
    }
}
