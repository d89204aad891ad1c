use std::any::Any;

use super::{read_tgi_list, write_tgi_list, TgiBlock, TgiOrder};
use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::binary::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// # Modular resource : 0xCF9A4ACE
///
/// A bare reference record: a version, a TGI offset (stored as the list
/// position minus 8) and the counted TGI list itself.
#[derive(Debug, Clone)]
pub struct Modular {
    key: ResourceKey,
    raw: Vec<u8>,
    dirty: bool,
    pub version: u32,
    pub tgis: Vec<TgiBlock>,
}

impl Modular {
    pub const TYPE_ID: u32 = 0xCF9A_4ACE;

    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "Modular",
        create: |key, bytes| Ok(Box::new(Modular::from_bytes(key, bytes)?) as BoxResource),
        create_empty: |key| Box::new(Modular::new_empty(key)) as BoxResource,
    };

    pub fn new_empty(key: ResourceKey) -> Modular {
        Modular {
            key,
            raw: Vec::new(),
            dirty: false,
            version: 1,
            tgis: Vec::new(),
        }
    }

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> Result<Modular> {
        if bytes.is_empty() {
            return Ok(Modular::new_empty(key));
        }

        let mut reader = ByteReader::new(bytes);
        let version = reader.read_u32()?;
        let stored_tgi_offset = reader.read_u32()?;
        let tgi_position = reader.position() as u32;
        if stored_tgi_offset != tgi_position - 8 {
            return Err(Error::invalid("TGI offset", stored_tgi_offset, 4));
        }
        let tgi_count = reader.read_u8()?;
        let tgis = read_tgi_list(&mut reader, tgi_count as usize, TgiOrder::Tgi)?;

        Ok(Modular {
            key,
            raw: bytes.to_vec(),
            dirty: false,
            version,
            tgis,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_u32(self.version);
        let slot = writer.reserve_u32();
        let tgi_position = writer.position() as u32;
        writer.patch_u32(slot, tgi_position - 8);
        writer.write_u8(self.tgis.len() as u8);
        write_tgi_list(&mut writer, &self.tgis, TgiOrder::Tgi);
        writer.into_bytes()
    }
}

impl Resource for Modular {
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
        ResourceKey::new(Modular::TYPE_ID, 0, 0x77)
    }

    #[test]
    fn round_trip() {
        let mut modular = Modular::new_empty(key());
        modular.tgis.push(TgiBlock::new(0x034A_EECB, 0, 0xFEED));
        modular.mark_dirty();
        let bytes = modular.serialize().unwrap();
        let reparsed = Modular::from_bytes(key(), &bytes).unwrap();
        assert_eq!(reparsed.tgis, modular.tgis);
        assert_eq!(reparsed.serialize().unwrap(), bytes);
    }

    #[test]
    fn stale_offset_rejected() {
        let mut modular = Modular::new_empty(key());
        modular.mark_dirty();
        let mut bytes = modular.serialize().unwrap();
        bytes[4..8].copy_from_slice(&9u32.to_le_bytes());
        assert!(matches!(
            Modular::from_bytes(key(), &bytes),
            Err(Error::InvalidFormat { field: "TGI offset", .. })
        ));
    }
}
