use std::any::Any;
use std::collections::HashMap;

use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::binary::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// # SimData resource : 0x545AC67A
///
/// Schema-described tables of raw row data. On-disk layout, all offsets
/// relative to their own slot position with `0x80000000` as null:
///
/// | Offset | Size | Field |
/// | ------ | ---- | ----- |
/// | 0      | 4    | magic "DATA" |
/// | 4      | 4    | version, 0x100 or 0x101 |
/// | 8      | 4    | table-entry offset |
/// | 12     | 4    | table count |
/// | 16     | 4    | schema-entry offset |
/// | 20     | 4    | schema count |
/// | 24     | 8    | padding |
///
/// Table entries (28 bytes each), then the 16-byte-aligned row data
/// blocks, then schema entries (24 bytes each), then per-schema field
/// tables (20 bytes each), then the name pool: NUL-terminated ASCII
/// strings in the order (all schemas' fields, schema names, table names).
///
/// Serialization is two-phase: phase one writes every structure with zero
/// placeholders in the offset slots while recording slot positions, phase
/// two patches the slots once all targets are placed. No cross-reference
/// sizes are ever computed up front.
#[derive(Debug, Clone)]
pub struct SimData {
    key: ResourceKey,
    version: u32,
    schemas: Vec<SimDataSchema>,
    tables: Vec<SimDataTable>,
    raw: Vec<u8>,
    dirty: bool,
}

const MAGIC: u32 = 0x4154_4144; // "DATA"

const TABLE_ENTRY_SIZE: usize = 28;
const SCHEMA_ENTRY_SIZE: usize = 24;
const FIELD_ENTRY_SIZE: usize = 20;

/// Field type tags with their fixed in-row widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimDataFieldType {
    Bool,
    Char8,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    String8,
    HashedString8,
    Object,
    Vector,
    Float2,
    Float3,
    Float4,
}

impl SimDataFieldType {
    pub fn from_u32(value: u32, position: u64) -> Result<SimDataFieldType> {
        Ok(match value {
            0 => SimDataFieldType::Bool,
            1 => SimDataFieldType::Char8,
            2 => SimDataFieldType::Int8,
            3 => SimDataFieldType::UInt8,
            4 => SimDataFieldType::Int16,
            5 => SimDataFieldType::UInt16,
            6 => SimDataFieldType::Int32,
            7 => SimDataFieldType::UInt32,
            8 => SimDataFieldType::Int64,
            9 => SimDataFieldType::UInt64,
            10 => SimDataFieldType::Float,
            11 => SimDataFieldType::String8,
            12 => SimDataFieldType::HashedString8,
            13 => SimDataFieldType::Object,
            14 => SimDataFieldType::Vector,
            15 => SimDataFieldType::Float2,
            16 => SimDataFieldType::Float3,
            17 => SimDataFieldType::Float4,
            other => return Err(Error::invalid("field type", other, position)),
        })
    }

    pub fn to_u32(self) -> u32 {
        match self {
            SimDataFieldType::Bool => 0,
            SimDataFieldType::Char8 => 1,
            SimDataFieldType::Int8 => 2,
            SimDataFieldType::UInt8 => 3,
            SimDataFieldType::Int16 => 4,
            SimDataFieldType::UInt16 => 5,
            SimDataFieldType::Int32 => 6,
            SimDataFieldType::UInt32 => 7,
            SimDataFieldType::Int64 => 8,
            SimDataFieldType::UInt64 => 9,
            SimDataFieldType::Float => 10,
            SimDataFieldType::String8 => 11,
            SimDataFieldType::HashedString8 => 12,
            SimDataFieldType::Object => 13,
            SimDataFieldType::Vector => 14,
            SimDataFieldType::Float2 => 15,
            SimDataFieldType::Float3 => 16,
            SimDataFieldType::Float4 => 17,
        }
    }

    /// In-row width in bytes.
    pub fn width(self) -> usize {
        match self {
            SimDataFieldType::Bool
            | SimDataFieldType::Char8
            | SimDataFieldType::Int8
            | SimDataFieldType::UInt8 => 1,
            SimDataFieldType::Int16 | SimDataFieldType::UInt16 => 2,
            SimDataFieldType::Int32
            | SimDataFieldType::UInt32
            | SimDataFieldType::Float
            | SimDataFieldType::String8
            | SimDataFieldType::Object => 4,
            SimDataFieldType::Int64
            | SimDataFieldType::UInt64
            | SimDataFieldType::HashedString8
            | SimDataFieldType::Vector
            | SimDataFieldType::Float2 => 8,
            SimDataFieldType::Float3 => 12,
            SimDataFieldType::Float4 => 16,
        }
    }
}

/// One column of a schema: 20-byte entry of name offset, name hash, type
/// tag, offset within a row, and an uninterpreted trailing offset that is
/// preserved verbatim.
#[derive(Debug, Clone)]
pub struct SimDataField {
    pub name: String,
    pub name_hash: u32,
    pub field_type: SimDataFieldType,
    pub offset: u32,
    pub unknown_offset: u32,
}

/// A structure definition: 24-byte entry of name offset, name hash, an
/// uninterpreted u32, the per-row byte size, and the field table.
#[derive(Debug, Clone)]
pub struct SimDataSchema {
    pub name: String,
    pub name_hash: u32,
    pub unknown: u32,
    pub row_size: u32,
    pub fields: Vec<SimDataField>,
}

/// A run of rows backed by contiguous raw bytes: 28-byte entry of name
/// offset, name hash, schema offset, two uninterpreted u32s, the row data
/// offset, and the row count. `schema` indexes [`SimData::schemas`].
#[derive(Debug, Clone)]
pub struct SimDataTable {
    pub name: String,
    pub name_hash: u32,
    pub schema: usize,
    pub unknown1: u32,
    pub unknown2: u32,
    pub row_count: u32,
    pub rows: Vec<u8>,
}

impl SimData {
    pub const TYPE_ID: u32 = 0x545A_C67A;

    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "SimData",
        create: |key, bytes| Ok(Box::new(SimData::from_bytes(key, bytes)?) as BoxResource),
        create_empty: |key| Box::new(SimData::new_empty(key)) as BoxResource,
    };

    pub fn new_empty(key: ResourceKey) -> SimData {
        SimData {
            key,
            version: 0x100,
            schemas: Vec::new(),
            tables: Vec::new(),
            raw: Vec::new(),
            dirty: false,
        }
    }

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> Result<SimData> {
        if bytes.is_empty() {
            return Ok(SimData::new_empty(key));
        }

        let mut reader = ByteReader::new(bytes);
        let magic = reader.read_u32()?;
        if magic != MAGIC {
            return Err(Error::invalid("SimData magic", magic, 0));
        }
        let version = reader.read_u32()?;
        if !(0x100..=0x101).contains(&version) {
            return Err(Error::invalid("SimData version", version, 4));
        }
        let table_offset = reader.read_offset()?;
        let table_count = reader.read_u32()?;
        let schema_offset = reader.read_offset()?;
        let schema_count = reader.read_u32()?;

        // Schemas first: table entries reference them by entry position.
        let mut schemas = Vec::with_capacity(schema_count as usize);
        let mut schema_positions = HashMap::new();
        if let Some(start) = schema_offset {
            for i in 0..schema_count as usize {
                let position = start + i * SCHEMA_ENTRY_SIZE;
                schema_positions.insert(position, i);
                reader.seek(position)?;
                schemas.push(Self::read_schema(&mut reader)?);
            }
        } else if schema_count != 0 {
            return Err(Error::invalid("schema offset", crate::binary::NULL_OFFSET, 16));
        }

        let mut tables = Vec::with_capacity(table_count as usize);
        if let Some(start) = table_offset {
            for i in 0..table_count as usize {
                reader.seek(start + i * TABLE_ENTRY_SIZE)?;
                tables.push(Self::read_table(&mut reader, &schema_positions, &schemas)?);
            }
        } else if table_count != 0 {
            return Err(Error::invalid("table offset", crate::binary::NULL_OFFSET, 8));
        }

        Ok(SimData {
            key,
            version,
            schemas,
            tables,
            raw: bytes.to_vec(),
            dirty: false,
        })
    }

    fn read_schema(reader: &mut ByteReader<'_>) -> Result<SimDataSchema> {
        let name_offset = reader.read_offset()?;
        let name_hash = reader.read_u32()?;
        let unknown = reader.read_u32()?;
        let row_size = reader.read_u32()?;
        let field_table_offset = reader.read_offset()?;
        let field_count = reader.read_u32()?;

        let name = match name_offset {
            Some(position) => reader.cstring_at(position)?,
            None => String::new(),
        };

        let mut fields = Vec::with_capacity(field_count as usize);
        if let Some(start) = field_table_offset {
            for i in 0..field_count as usize {
                reader.seek(start + i * FIELD_ENTRY_SIZE)?;
                fields.push(Self::read_field(reader)?);
            }
        }

        Ok(SimDataSchema {
            name,
            name_hash,
            unknown,
            row_size,
            fields,
        })
    }

    fn read_field(reader: &mut ByteReader<'_>) -> Result<SimDataField> {
        let name_offset = reader.read_offset()?;
        let name_hash = reader.read_u32()?;
        let type_position = reader.position() as u64;
        let field_type = SimDataFieldType::from_u32(reader.read_u32()?, type_position)?;
        let offset = reader.read_u32()?;
        let unknown_offset = reader.read_u32()?;

        let name = match name_offset {
            Some(position) => reader.cstring_at(position)?,
            None => String::new(),
        };

        Ok(SimDataField {
            name,
            name_hash,
            field_type,
            offset,
            unknown_offset,
        })
    }

    fn read_table(
        reader: &mut ByteReader<'_>,
        schema_positions: &HashMap<usize, usize>,
        schemas: &[SimDataSchema],
    ) -> Result<SimDataTable> {
        let name_offset = reader.read_offset()?;
        let name_hash = reader.read_u32()?;
        let schema_slot = reader.position() as u64;
        let schema_offset = reader.read_offset()?;
        let unknown1 = reader.read_u32()?;
        let unknown2 = reader.read_u32()?;
        let row_offset = reader.read_offset()?;
        let row_count = reader.read_u32()?;

        let schema_position = schema_offset
            .ok_or_else(|| Error::invalid("schema offset", crate::binary::NULL_OFFSET, schema_slot))?;
        let schema = *schema_positions.get(&schema_position).ok_or(Error::invalid(
            "schema offset",
            schema_position as u32,
            schema_slot,
        ))?;

        let name = match name_offset {
            Some(position) => reader.cstring_at(position)?,
            None => String::new(),
        };

        let row_bytes = row_count as usize * schemas[schema].row_size as usize;
        let rows = match row_offset {
            Some(start) => {
                reader.seek(start)?;
                reader.take(row_bytes)?.to_vec()
            }
            None if row_bytes == 0 => Vec::new(),
            None => {
                return Err(Error::invalid(
                    "row data offset",
                    crate::binary::NULL_OFFSET,
                    schema_slot + 12,
                ))
            }
        };

        Ok(SimDataTable {
            name,
            name_hash,
            schema,
            unknown1,
            unknown2,
            row_count,
            rows,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn schemas(&self) -> &[SimDataSchema] {
        &self.schemas
    }

    pub fn tables(&self) -> &[SimDataTable] {
        &self.tables
    }

    /// Mutable access to the schemas; marks the resource dirty.
    pub fn schemas_mut(&mut self) -> &mut Vec<SimDataSchema> {
        self.dirty = true;
        &mut self.schemas
    }

    /// Mutable access to the tables; marks the resource dirty.
    pub fn tables_mut(&mut self) -> &mut Vec<SimDataTable> {
        self.dirty = true;
        &mut self.tables
    }

    fn encode(&self) -> Result<Vec<u8>> {
        for table in &self.tables {
            if table.schema >= self.schemas.len() {
                return Err(Error::corrupted(format!(
                    "table '{}' references schema {} of {}",
                    table.name,
                    table.schema,
                    self.schemas.len()
                )));
            }
        }

        let mut writer = ByteWriter::new();

        // Phase one: emit everything with placeholder offsets, recording
        // each slot's absolute position.
        writer.write_u32(MAGIC);
        writer.write_u32(self.version);
        let table_offset_slot = writer.reserve_u32();
        writer.write_u32(self.tables.len() as u32);
        let schema_offset_slot = writer.reserve_u32();
        writer.write_u32(self.schemas.len() as u32);
        writer.write_u64(0); // padding

        let table_entries_start = writer.position();
        let mut table_slots = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            let name_slot = writer.reserve_u32();
            writer.write_u32(table.name_hash);
            let schema_slot = writer.reserve_u32();
            writer.write_u32(table.unknown1);
            writer.write_u32(table.unknown2);
            let rows_slot = writer.reserve_u32();
            writer.write_u32(table.row_count);
            table_slots.push((name_slot, schema_slot, rows_slot));
        }

        let mut row_positions = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            writer.align(16);
            row_positions.push(writer.position());
            writer.write_bytes(&table.rows);
        }

        let schema_entries_start = writer.position();
        let mut schema_slots = Vec::with_capacity(self.schemas.len());
        let mut schema_positions = Vec::with_capacity(self.schemas.len());
        for schema in &self.schemas {
            schema_positions.push(writer.position());
            let name_slot = writer.reserve_u32();
            writer.write_u32(schema.name_hash);
            writer.write_u32(schema.unknown);
            writer.write_u32(schema.row_size);
            let fields_slot = writer.reserve_u32();
            writer.write_u32(schema.fields.len() as u32);
            schema_slots.push((name_slot, fields_slot));
        }

        let mut field_table_positions = Vec::with_capacity(self.schemas.len());
        let mut field_slots = Vec::new();
        for schema in &self.schemas {
            field_table_positions.push(writer.position());
            for field in &schema.fields {
                let name_slot = writer.reserve_u32();
                writer.write_u32(field.name_hash);
                writer.write_u32(field.field_type.to_u32());
                writer.write_u32(field.offset);
                writer.write_u32(field.unknown_offset);
                field_slots.push(name_slot);
            }
        }

        // Name pool: fields of all schemas, then schema names, then table
        // names.
        let mut name_positions = Vec::new();
        for schema in &self.schemas {
            for field in &schema.fields {
                name_positions.push(writer.position());
                writer.write_cstring(&field.name);
            }
        }
        let mut schema_name_positions = Vec::with_capacity(self.schemas.len());
        for schema in &self.schemas {
            schema_name_positions.push(writer.position());
            writer.write_cstring(&schema.name);
        }
        let mut table_name_positions = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            table_name_positions.push(writer.position());
            writer.write_cstring(&table.name);
        }

        // Phase two: patch every recorded slot.
        writer.patch_offset(
            table_offset_slot,
            (!self.tables.is_empty()).then_some(table_entries_start),
        );
        writer.patch_offset(
            schema_offset_slot,
            (!self.schemas.is_empty()).then_some(schema_entries_start),
        );

        for (i, (name_slot, schema_slot, rows_slot)) in table_slots.iter().enumerate() {
            let table = &self.tables[i];
            writer.patch_offset(*name_slot, Some(table_name_positions[i]));
            writer.patch_offset(*schema_slot, Some(schema_positions[table.schema]));
            writer.patch_offset(
                *rows_slot,
                (!table.rows.is_empty()).then_some(row_positions[i]),
            );
        }

        for (i, (name_slot, fields_slot)) in schema_slots.iter().enumerate() {
            writer.patch_offset(*name_slot, Some(schema_name_positions[i]));
            writer.patch_offset(
                *fields_slot,
                (!self.schemas[i].fields.is_empty()).then_some(field_table_positions[i]),
            );
        }

        for (slot, position) in field_slots.iter().zip(&name_positions) {
            writer.patch_offset(*slot, Some(*position));
        }

        Ok(writer.into_bytes())
    }
}

impl Resource for SimData {
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
