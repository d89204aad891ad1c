use std::any::Any;

use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::binary::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// # Skin Tone resource : 0x0354796A
///
/// Fixed-layout record. The flag-list value width is version-gated:
/// 16-bit through version 6, 32-bit afterwards.
///
/// | Field | Size |
/// | ----- | ---- |
/// | version | 4 |
/// | overlay count, overlays | 4 + 12·n |
/// | flag count, flags | 4 + (4 or 6)·n |
/// | makeup opacity | 4 |
/// | sort order | 4 |
/// | secondary opacity | 4 |
/// | unknown1 | 2 |
#[derive(Debug, Clone)]
pub struct SkinTone {
    key: ResourceKey,
    raw: Vec<u8>,
    dirty: bool,

    pub version: u32,
    pub overlays: Vec<SkinToneOverlay>,
    pub flags: Vec<SkinToneFlag>,
    pub makeup_opacity: f32,
    pub sort_order: f32,
    pub secondary_opacity: f32,
    pub unknown1: u16,
}

/// Age/gender-gated overlay reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinToneOverlay {
    pub age_gender: u32,
    pub instance: u64,
}

/// Categorized flag value. The value is held as u32 in memory; versions
/// up to 6 store it as u16 on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinToneFlag {
    pub category: u16,
    pub value: u32,
}

impl SkinTone {
    pub const TYPE_ID: u32 = 0x0354_796A;

    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "SkinTone",
        create: |key, bytes| Ok(Box::new(SkinTone::from_bytes(key, bytes)?) as BoxResource),
        create_empty: |key| Box::new(SkinTone::new_empty(key)) as BoxResource,
    };

    pub fn new_empty(key: ResourceKey) -> SkinTone {
        SkinTone {
            key,
            raw: Vec::new(),
            dirty: false,
            version: 7,
            overlays: Vec::new(),
            flags: Vec::new(),
            makeup_opacity: 0.0,
            sort_order: 0.0,
            secondary_opacity: 0.0,
            unknown1: 0,
        }
    }

    fn wide_flags(version: u32) -> bool {
        version > 6
    }

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> Result<SkinTone> {
        if bytes.is_empty() {
            return Ok(SkinTone::new_empty(key));
        }

        let mut reader = ByteReader::new(bytes);
        let version = reader.read_u32()?;
        if version == 0 {
            return Err(Error::invalid("skin tone version", version, 0));
        }

        let overlay_count = reader.read_u32()?;
        let mut overlays = Vec::with_capacity(overlay_count as usize);
        for _ in 0..overlay_count {
            overlays.push(SkinToneOverlay {
                age_gender: reader.read_u32()?,
                instance: reader.read_u64()?,
            });
        }

        let flag_count = reader.read_u32()?;
        let mut flags = Vec::with_capacity(flag_count as usize);
        for _ in 0..flag_count {
            let category = reader.read_u16()?;
            let value = if Self::wide_flags(version) {
                reader.read_u32()?
            } else {
                reader.read_u16()? as u32
            };
            flags.push(SkinToneFlag { category, value });
        }

        let makeup_opacity = reader.read_f32()?;
        let sort_order = reader.read_f32()?;
        let secondary_opacity = reader.read_f32()?;
        let unknown1 = reader.read_u16()?;

        Ok(SkinTone {
            key,
            raw: bytes.to_vec(),
            dirty: false,
            version,
            overlays,
            flags,
            makeup_opacity,
            sort_order,
            secondary_opacity,
            unknown1,
        })
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::new();
        writer.write_u32(self.version);

        writer.write_u32(self.overlays.len() as u32);
        for overlay in &self.overlays {
            writer.write_u32(overlay.age_gender);
            writer.write_u64(overlay.instance);
        }

        writer.write_u32(self.flags.len() as u32);
        for flag in &self.flags {
            writer.write_u16(flag.category);
            if Self::wide_flags(self.version) {
                writer.write_u32(flag.value);
            } else {
                if flag.value > u16::MAX as u32 {
                    return Err(Error::invalid("flag value", flag.value, 0));
                }
                writer.write_u16(flag.value as u16);
            }
        }

        writer.write_f32(self.makeup_opacity);
        writer.write_f32(self.sort_order);
        writer.write_f32(self.secondary_opacity);
        writer.write_u16(self.unknown1);

        Ok(writer.into_bytes())
    }
}

impl Resource for SkinTone {
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
        self.encode()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
