use std::any::Any;

use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::binary::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// # Template (complate) resource : 0x6017E896
///
/// Named groups of hashed key/value properties used as CAS composition
/// templates.
///
/// | Field | Size |
/// | ----- | ---- |
/// | version | 4 |
/// | name length, name (UTF-16LE) | 4 + 2·n |
/// | group count, groups | 4 + … |
///
/// Each group is a hash, an entry count and that many 8-byte key/value
/// pairs.
#[derive(Debug, Clone)]
pub struct Template {
    key: ResourceKey,
    raw: Vec<u8>,
    dirty: bool,

    pub version: u32,
    pub name: String,
    pub groups: Vec<TemplateGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateGroup {
    pub group_hash: u32,
    pub entries: Vec<TemplateEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateEntry {
    pub key_hash: u32,
    pub value: u32,
}

const VERSION: u32 = 3;

impl Template {
    pub const TYPE_ID: u32 = 0x6017_E896;

    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "Template",
        create: |key, bytes| Ok(Box::new(Template::from_bytes(key, bytes)?) as BoxResource),
        create_empty: |key| Box::new(Template::new_empty(key)) as BoxResource,
    };

    pub fn new_empty(key: ResourceKey) -> Template {
        Template {
            key,
            raw: Vec::new(),
            dirty: false,
            version: VERSION,
            name: String::new(),
            groups: Vec::new(),
        }
    }

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> Result<Template> {
        if bytes.is_empty() {
            return Ok(Template::new_empty(key));
        }

        let mut reader = ByteReader::new(bytes);
        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(Error::invalid("template version", version, 0));
        }
        let name_length = reader.read_u32()?;
        let name = reader.read_utf16(name_length as usize)?;

        let group_count = reader.read_u32()?;
        let mut groups = Vec::with_capacity(group_count as usize);
        for _ in 0..group_count {
            let group_hash = reader.read_u32()?;
            let entry_count = reader.read_u32()?;
            let mut entries = Vec::with_capacity(entry_count as usize);
            for _ in 0..entry_count {
                entries.push(TemplateEntry {
                    key_hash: reader.read_u32()?,
                    value: reader.read_u32()?,
                });
            }
            groups.push(TemplateGroup {
                group_hash,
                entries,
            });
        }

        Ok(Template {
            key,
            raw: bytes.to_vec(),
            dirty: false,
            version,
            name,
            groups,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_u32(self.version);
        writer.write_u32(self.name.encode_utf16().count() as u32);
        writer.write_utf16(&self.name);
        writer.write_u32(self.groups.len() as u32);
        for group in &self.groups {
            writer.write_u32(group.group_hash);
            writer.write_u32(group.entries.len() as u32);
            for entry in &group.entries {
                writer.write_u32(entry.key_hash);
                writer.write_u32(entry.value);
            }
        }
        writer.into_bytes()
    }
}

impl Resource for Template {
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
