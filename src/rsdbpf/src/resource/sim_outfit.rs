use std::any::Any;

use super::{read_tgi_list, write_tgi_list, TgiBlock, TgiOrder};
use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::binary::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// # Sim Outfit resource : 0x025ED6F4
///
/// Outfit data with variable-length sub-records and a trailing TGI list.
/// Two format quirks to preserve on both read and write:
///
/// * the trailing list stores its blocks as instance, group, type
///   instead of the conventional TGI order,
/// * the header field holds the TGI list position plus 8.
///
/// The unknown blocks are opaque: their payloads are carried through
/// byte-for-byte and never interpreted.
#[derive(Debug, Clone)]
pub struct SimOutfit {
    key: ResourceKey,
    raw: Vec<u8>,
    dirty: bool,

    pub version: u32,
    pub age_gender: u32,
    pub unknown1: u64,
    /// Indices into the trailing TGI list for sculpt resources.
    pub sculpts: Vec<u8>,
    pub slider_references: Vec<SliderReference>,
    pub unknown_blocks: Vec<UnknownBlock>,
    pub tgis: Vec<TgiBlock>,
}

/// One slider hash with its category and applied weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderReference {
    pub slider_hash: u32,
    pub category: u16,
    pub value: f32,
}

/// An uninterpreted tagged byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBlock {
    pub kind: u32,
    pub data: Vec<u8>,
}

impl SimOutfit {
    pub const TYPE_ID: u32 = 0x025E_D6F4;

    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "SimOutfit",
        create: |key, bytes| Ok(Box::new(SimOutfit::from_bytes(key, bytes)?) as BoxResource),
        create_empty: |key| Box::new(SimOutfit::new_empty(key)) as BoxResource,
    };

    pub fn new_empty(key: ResourceKey) -> SimOutfit {
        SimOutfit {
            key,
            raw: Vec::new(),
            dirty: false,
            version: 1,
            age_gender: 0,
            unknown1: 0,
            sculpts: Vec::new(),
            slider_references: Vec::new(),
            unknown_blocks: Vec::new(),
            tgis: Vec::new(),
        }
    }

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> Result<SimOutfit> {
        if bytes.is_empty() {
            return Ok(SimOutfit::new_empty(key));
        }

        let mut reader = ByteReader::new(bytes);
        let version = reader.read_u32()?;
        let stored_tgi_offset = reader.read_u32()?;
        let age_gender = reader.read_u32()?;
        let unknown1 = reader.read_u64()?;

        let sculpt_count = reader.read_u8()?;
        let mut sculpts = Vec::with_capacity(sculpt_count as usize);
        for _ in 0..sculpt_count {
            sculpts.push(reader.read_u8()?);
        }

        let slider_count = reader.read_u32()?;
        let mut slider_references = Vec::with_capacity(slider_count as usize);
        for _ in 0..slider_count {
            slider_references.push(SliderReference {
                slider_hash: reader.read_u32()?,
                category: reader.read_u16()?,
                value: reader.read_f32()?,
            });
        }

        let block_count = reader.read_u32()?;
        let mut unknown_blocks = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            let kind = reader.read_u32()?;
            let length = reader.read_u32()?;
            unknown_blocks.push(UnknownBlock {
                kind,
                data: reader.take(length as usize)?.to_vec(),
            });
        }

        // The header holds the list position plus 8, unlike CAS Part
        // which subtracts. Both quirks are load-bearing.
        let tgi_position = reader.position() as u32;
        if stored_tgi_offset != tgi_position + 8 {
            return Err(Error::invalid("TGI offset", stored_tgi_offset, 4));
        }
        let tgi_count = reader.read_u8()?;
        let tgis = read_tgi_list(&mut reader, tgi_count as usize, TgiOrder::Igt)?;

        Ok(SimOutfit {
            key,
            raw: bytes.to_vec(),
            dirty: false,
            version,
            age_gender,
            unknown1,
            sculpts,
            slider_references,
            unknown_blocks,
            tgis,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_u32(self.version);
        let tgi_offset_slot = writer.reserve_u32();
        writer.write_u32(self.age_gender);
        writer.write_u64(self.unknown1);

        writer.write_u8(self.sculpts.len() as u8);
        for sculpt in &self.sculpts {
            writer.write_u8(*sculpt);
        }

        writer.write_u32(self.slider_references.len() as u32);
        for slider in &self.slider_references {
            writer.write_u32(slider.slider_hash);
            writer.write_u16(slider.category);
            writer.write_f32(slider.value);
        }

        writer.write_u32(self.unknown_blocks.len() as u32);
        for block in &self.unknown_blocks {
            writer.write_u32(block.kind);
            writer.write_u32(block.data.len() as u32);
            writer.write_bytes(&block.data);
        }

        let tgi_position = writer.position() as u32;
        writer.patch_u32(tgi_offset_slot, tgi_position + 8);
        writer.write_u8(self.tgis.len() as u8);
        write_tgi_list(&mut writer, &self.tgis, TgiOrder::Igt);

        writer.into_bytes()
    }
}

impl Resource for SimOutfit {
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
        ResourceKey::new(SimOutfit::TYPE_ID, 0, 0x99)
    }

    fn sample() -> SimOutfit {
        let mut outfit = SimOutfit::new_empty(key());
        outfit.age_gender = 0x0000_2010;
        outfit.sculpts = vec![0, 2];
        outfit.slider_references.push(SliderReference {
            slider_hash: 0xCAFE_F00D,
            category: 2,
            value: -0.5,
        });
        outfit.unknown_blocks.push(UnknownBlock {
            kind: 7,
            data: vec![1, 2, 3, 4, 5],
        });
        outfit.tgis = vec![
            TgiBlock::new(0x034A_EECB, 0, 0x1111),
            TgiBlock::new(0x0354_796A, 0, 0x2222),
            TgiBlock::new(0x3453_CF95, 0, 0x3333),
        ];
        outfit.mark_dirty();
        outfit
    }

    #[test]
    fn round_trip() {
        let outfit = sample();
        let bytes = outfit.serialize().unwrap();
        let reparsed = SimOutfit::from_bytes(key(), &bytes).unwrap();
        assert_eq!(reparsed.sculpts, vec![0, 2]);
        assert_eq!(reparsed.slider_references, outfit.slider_references);
        assert_eq!(reparsed.unknown_blocks, outfit.unknown_blocks);
        assert_eq!(reparsed.tgis, outfit.tgis);
        assert_eq!(reparsed.serialize().unwrap(), bytes);
    }

    #[test]
    fn tgi_list_is_instance_group_type_on_disk() {
        let bytes = sample().serialize().unwrap();
        let stored = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let tgi_position = (stored - 8) as usize;
        // Count byte, then the first block starts with its instance.
        assert_eq!(bytes[tgi_position], 3);
        let first = &bytes[tgi_position + 1..tgi_position + 17];
        assert_eq!(&first[0..8], &0x1111u64.to_le_bytes());
        assert_eq!(&first[12..16], &0x034A_EECBu32.to_le_bytes());
    }

    #[test]
    fn stale_tgi_offset_rejected() {
        let mut bytes = sample().serialize().unwrap();
        bytes[4..8].copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(
            SimOutfit::from_bytes(key(), &bytes),
            Err(Error::InvalidFormat { field: "TGI offset", .. })
        ));
    }

    #[test]
    fn empty_input_installs_defaults() {
        let outfit = SimOutfit::from_bytes(key(), &[]).unwrap();
        assert!(outfit.tgis.is_empty());
        assert!(!outfit.is_dirty());
    }
}
