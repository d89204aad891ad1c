use std::any::Any;

use super::{read_tgi_list, write_tgi_list, TgiBlock, TgiOrder};
use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::binary::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// # CAS Part resource : 0x034AEECB, versions 27 and 28
///
/// A large flat record followed by embedded sub-records and a trailing
/// TGI block list. Quirks that must survive a round trip exactly:
///
/// * the name is big-endian UTF-16 (the only big-endian string anywhere),
/// * the header stores the TGI list position minus 8,
/// * `unused3` exists on disk only when `unused2 > 0`,
/// * `voice_effect_hash` exists only from version 28 on.
///
/// Scalars named `unused*` are preserved verbatim and never interpreted.
#[derive(Debug, Clone)]
pub struct CasPart {
    key: ResourceKey,
    raw: Vec<u8>,
    dirty: bool,

    pub version: u32,
    pub num_presets: u32,
    pub name: String,
    pub sort_priority: f32,
    pub secondary_sort_index: u16,
    pub property_id: u32,
    pub aural_material_hash: u32,
    pub flags: Vec<PartFlag>,
    pub exclude_part_flags: u64,
    pub exclude_modifier_region_flags: u64,
    pub simoleon_price: u32,
    pub part_title_key: u32,
    pub part_description_key: u32,
    pub unique_texture_space: bool,
    pub body_type: i32,
    pub unused1: i32,
    pub age_gender: u32,
    pub unused2: u8,
    pub unused3: Option<u8>,
    pub swatch_colors: Vec<SwatchColor>,
    pub buff_res_key: u8,
    pub variant_thumb_key: u8,
    pub voice_effect_hash: Option<u64>,
    pub naked_key: u8,
    pub parent_key: u8,
    pub sort_layer: i32,
    pub lods: Vec<LodBlock>,
    pub slot_keys: Vec<u8>,
    pub diffuse_key: u8,
    pub shadow_key: u8,
    pub composition_method: u8,
    pub region_map_key: u8,
    pub overrides: Vec<PartOverride>,
    pub normal_map_key: u8,
    pub specular_map_key: u8,
    pub shared_uv_map_space: u32,
    pub tgis: Vec<TgiBlock>,
}

/// One categorized flag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartFlag {
    pub category: u16,
    pub value: u32,
}

/// ARGB swatch color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwatchColor(pub u32);

/// Per-LOD render data: a level, an uninterpreted u32, asset records and
/// indices into the trailing TGI list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LodBlock {
    pub level: u8,
    pub unused: u32,
    pub assets: Vec<LodAsset>,
    pub lod_keys: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LodAsset {
    pub sorting: u32,
    pub specular: u32,
    pub cast_shadow: u32,
}

/// Region/layer override pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartOverride {
    pub region: u8,
    pub layer: f32,
}

impl CasPart {
    pub const TYPE_ID: u32 = 0x034A_EECB;

    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "CasPart",
        create: |key, bytes| Ok(Box::new(CasPart::from_bytes(key, bytes)?) as BoxResource),
        create_empty: |key| Box::new(CasPart::new_empty(key)) as BoxResource,
    };

    pub fn new_empty(key: ResourceKey) -> CasPart {
        CasPart {
            key,
            raw: Vec::new(),
            dirty: false,
            version: 28,
            num_presets: 0,
            name: String::new(),
            sort_priority: 0.0,
            secondary_sort_index: 0,
            property_id: 0,
            aural_material_hash: 0,
            flags: Vec::new(),
            exclude_part_flags: 0,
            exclude_modifier_region_flags: 0,
            simoleon_price: 0,
            part_title_key: 0,
            part_description_key: 0,
            unique_texture_space: false,
            body_type: 0,
            unused1: 0,
            age_gender: 0,
            unused2: 0,
            unused3: None,
            swatch_colors: Vec::new(),
            buff_res_key: 0,
            variant_thumb_key: 0,
            voice_effect_hash: Some(0),
            naked_key: 0,
            parent_key: 0,
            sort_layer: 0,
            lods: Vec::new(),
            slot_keys: Vec::new(),
            diffuse_key: 0,
            shadow_key: 0,
            composition_method: 0,
            region_map_key: 0,
            overrides: Vec::new(),
            normal_map_key: 0,
            specular_map_key: 0,
            shared_uv_map_space: 0,
            tgis: Vec::new(),
        }
    }

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> Result<CasPart> {
        if bytes.is_empty() {
            return Ok(CasPart::new_empty(key));
        }

        let mut reader = ByteReader::new(bytes);
        let version = reader.read_u32()?;
        if !(27..=28).contains(&version) {
            return Err(Error::invalid("CAS part version", version, 0));
        }
        let stored_tgi_offset = reader.read_u32()?;
        let num_presets = reader.read_u32()?;
        let name = reader.read_utf16_be()?;
        let sort_priority = reader.read_f32()?;
        let secondary_sort_index = reader.read_u16()?;
        let property_id = reader.read_u32()?;
        let aural_material_hash = reader.read_u32()?;

        let flag_count = reader.read_u32()?;
        let mut flags = Vec::with_capacity(flag_count as usize);
        for _ in 0..flag_count {
            flags.push(PartFlag {
                category: reader.read_u16()?,
                value: reader.read_u32()?,
            });
        }

        let exclude_part_flags = reader.read_u64()?;
        let exclude_modifier_region_flags = reader.read_u64()?;
        let simoleon_price = reader.read_u32()?;
        let part_title_key = reader.read_u32()?;
        let part_description_key = reader.read_u32()?;
        let unique_texture_space = reader.read_u8()? != 0;
        let body_type = reader.read_i32()?;
        let unused1 = reader.read_i32()?;
        let age_gender = reader.read_u32()?;
        let unused2 = reader.read_u8()?;
        let unused3 = if unused2 > 0 {
            Some(reader.read_u8()?)
        } else {
            None
        };

        let swatch_count = reader.read_u8()?;
        let mut swatch_colors = Vec::with_capacity(swatch_count as usize);
        for _ in 0..swatch_count {
            swatch_colors.push(SwatchColor(reader.read_u32()?));
        }

        let buff_res_key = reader.read_u8()?;
        let variant_thumb_key = reader.read_u8()?;
        let voice_effect_hash = if version >= 28 {
            Some(reader.read_u64()?)
        } else {
            None
        };
        let naked_key = reader.read_u8()?;
        let parent_key = reader.read_u8()?;
        let sort_layer = reader.read_i32()?;

        let lod_count = reader.read_u8()?;
        let mut lods = Vec::with_capacity(lod_count as usize);
        for _ in 0..lod_count {
            lods.push(Self::read_lod(&mut reader)?);
        }

        let slot_count = reader.read_u8()?;
        let mut slot_keys = Vec::with_capacity(slot_count as usize);
        for _ in 0..slot_count {
            slot_keys.push(reader.read_u8()?);
        }

        let diffuse_key = reader.read_u8()?;
        let shadow_key = reader.read_u8()?;
        let composition_method = reader.read_u8()?;
        let region_map_key = reader.read_u8()?;

        let override_count = reader.read_u8()?;
        let mut overrides = Vec::with_capacity(override_count as usize);
        for _ in 0..override_count {
            overrides.push(PartOverride {
                region: reader.read_u8()?,
                layer: reader.read_f32()?,
            });
        }

        let normal_map_key = reader.read_u8()?;
        let specular_map_key = reader.read_u8()?;
        let shared_uv_map_space = reader.read_u32()?;

        // The header records the TGI list position minus 8.
        let tgi_position = reader.position() as u32;
        if stored_tgi_offset != tgi_position - 8 {
            return Err(Error::invalid("TGI offset", stored_tgi_offset, 4));
        }
        let tgi_count = reader.read_u8()?;
        let tgis = read_tgi_list(&mut reader, tgi_count as usize, TgiOrder::Tgi)?;

        Ok(CasPart {
            key,
            raw: bytes.to_vec(),
            dirty: false,
            version,
            num_presets,
            name,
            sort_priority,
            secondary_sort_index,
            property_id,
            aural_material_hash,
            flags,
            exclude_part_flags,
            exclude_modifier_region_flags,
            simoleon_price,
            part_title_key,
            part_description_key,
            unique_texture_space,
            body_type,
            unused1,
            age_gender,
            unused2,
            unused3,
            swatch_colors,
            buff_res_key,
            variant_thumb_key,
            voice_effect_hash,
            naked_key,
            parent_key,
            sort_layer,
            lods,
            slot_keys,
            diffuse_key,
            shadow_key,
            composition_method,
            region_map_key,
            overrides,
            normal_map_key,
            specular_map_key,
            shared_uv_map_space,
            tgis,
        })
    }

    fn read_lod(reader: &mut ByteReader<'_>) -> Result<LodBlock> {
        let level = reader.read_u8()?;
        let unused = reader.read_u32()?;
        let asset_count = reader.read_u8()?;
        let mut assets = Vec::with_capacity(asset_count as usize);
        for _ in 0..asset_count {
            assets.push(LodAsset {
                sorting: reader.read_u32()?,
                specular: reader.read_u32()?,
                cast_shadow: reader.read_u32()?,
            });
        }
        let key_count = reader.read_u8()?;
        let mut lod_keys = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            lod_keys.push(reader.read_u8()?);
        }
        Ok(LodBlock {
            level,
            unused,
            assets,
            lod_keys,
        })
    }

    fn encode(&self) -> Result<Vec<u8>> {
        if !(27..=28).contains(&self.version) {
            return Err(Error::invalid("CAS part version", self.version, 0));
        }

        let mut writer = ByteWriter::new();
        writer.write_u32(self.version);
        let tgi_offset_slot = writer.reserve_u32();
        writer.write_u32(self.num_presets);
        writer.write_utf16_be(&self.name);
        writer.write_f32(self.sort_priority);
        writer.write_u16(self.secondary_sort_index);
        writer.write_u32(self.property_id);
        writer.write_u32(self.aural_material_hash);

        writer.write_u32(self.flags.len() as u32);
        for flag in &self.flags {
            writer.write_u16(flag.category);
            writer.write_u32(flag.value);
        }

        writer.write_u64(self.exclude_part_flags);
        writer.write_u64(self.exclude_modifier_region_flags);
        writer.write_u32(self.simoleon_price);
        writer.write_u32(self.part_title_key);
        writer.write_u32(self.part_description_key);
        writer.write_u8(self.unique_texture_space as u8);
        writer.write_i32(self.body_type);
        writer.write_i32(self.unused1);
        writer.write_u32(self.age_gender);
        writer.write_u8(self.unused2);
        if self.unused2 > 0 {
            // Conditional presence is part of the format; a record whose
            // unused2 was read as zero never had the byte.
            writer.write_u8(self.unused3.unwrap_or(0));
        }

        writer.write_u8(self.swatch_colors.len() as u8);
        for color in &self.swatch_colors {
            writer.write_u32(color.0);
        }

        writer.write_u8(self.buff_res_key);
        writer.write_u8(self.variant_thumb_key);
        if self.version >= 28 {
            writer.write_u64(self.voice_effect_hash.unwrap_or(0));
        }
        writer.write_u8(self.naked_key);
        writer.write_u8(self.parent_key);
        writer.write_i32(self.sort_layer);

        writer.write_u8(self.lods.len() as u8);
        for lod in &self.lods {
            writer.write_u8(lod.level);
            writer.write_u32(lod.unused);
            writer.write_u8(lod.assets.len() as u8);
            for asset in &lod.assets {
                writer.write_u32(asset.sorting);
                writer.write_u32(asset.specular);
                writer.write_u32(asset.cast_shadow);
            }
            writer.write_u8(lod.lod_keys.len() as u8);
            for key in &lod.lod_keys {
                writer.write_u8(*key);
            }
        }

        writer.write_u8(self.slot_keys.len() as u8);
        for key in &self.slot_keys {
            writer.write_u8(*key);
        }

        writer.write_u8(self.diffuse_key);
        writer.write_u8(self.shadow_key);
        writer.write_u8(self.composition_method);
        writer.write_u8(self.region_map_key);

        writer.write_u8(self.overrides.len() as u8);
        for part_override in &self.overrides {
            writer.write_u8(part_override.region);
            writer.write_f32(part_override.layer);
        }

        writer.write_u8(self.normal_map_key);
        writer.write_u8(self.specular_map_key);
        writer.write_u32(self.shared_uv_map_space);

        let tgi_position = writer.position() as u32;
        writer.patch_u32(tgi_offset_slot, tgi_position - 8);
        writer.write_u8(self.tgis.len() as u8);
        write_tgi_list(&mut writer, &self.tgis, TgiOrder::Tgi);

        Ok(writer.into_bytes())
    }
}

impl Resource for CasPart {
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
