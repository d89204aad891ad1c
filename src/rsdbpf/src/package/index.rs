use super::entry::{EntryId, ResourceIndexEntry, FILE_SIZE_HIGH_BIT};
use super::flags::IndexTypeFlags;
use crate::binary::{ByteReader, ByteWriter};
use crate::{ResourceKey, Result};

/// # Index blob
///
/// | Field | Size |
/// | ----- | ---- |
/// | index type flags | 4 |
/// | shared field values | 4 per set flag bit |
/// | entries | `index_count` × [`IndexTypeFlags::entry_size`] |
///
/// Per entry, skipping the fields hoisted into the header:
///
/// | Field | Size |
/// | ----- | ---- |
/// | type | 4 |
/// | group | 4 |
/// | instance (high half) | 4 |
/// | instance (low half) | 4 |
/// | chunk offset | 4 |
/// | file size, bit 31 always set | 4 |
/// | memory size | 4 |
/// | compression type | 2 |
/// | unknown2, always 1 | 2 |
pub(crate) fn read_index(
    blob: &[u8],
    index_count: u32,
) -> Result<(IndexTypeFlags, Vec<ResourceIndexEntry>)> {
    let mut reader = ByteReader::new(blob);
    let flags = IndexTypeFlags::from(reader.read_u32()?);

    let shared_type = flags
        .check_flag(IndexTypeFlags::CONSTANT_TYPE)
        .then(|| reader.read_u32())
        .transpose()?;
    let shared_group = flags
        .check_flag(IndexTypeFlags::CONSTANT_GROUP)
        .then(|| reader.read_u32())
        .transpose()?;
    let shared_instance_high = flags
        .check_flag(IndexTypeFlags::CONSTANT_INSTANCE_HIGH)
        .then(|| reader.read_u32())
        .transpose()?;

    let mut entries = Vec::with_capacity(index_count as usize);
    for i in 0..index_count as usize {
        let type_id = match shared_type {
            Some(value) => value,
            None => reader.read_u32()?,
        };
        let group = match shared_group {
            Some(value) => value,
            None => reader.read_u32()?,
        };
        let instance_high = match shared_instance_high {
            Some(value) => value,
            None => reader.read_u32()?,
        };
        let instance_low = reader.read_u32()?;
        let chunk_offset = reader.read_u32()?;
        let file_size = reader.read_u32()? & !FILE_SIZE_HIGH_BIT;
        let memory_size = reader.read_u32()?;
        let compression_type = reader.read_u16()?;
        let unknown2 = reader.read_u16()?;

        entries.push(ResourceIndexEntry {
            id: EntryId(i),
            key: ResourceKey::from_halves(type_id, group, instance_high, instance_low),
            chunk_offset,
            file_size,
            memory_size,
            compression_type,
            unknown2,
            deleted: false,
            dirty: false,
            cache: None,
        });
    }

    Ok((flags, entries))
}

/// Pick index type flags for a set of live entries: bit `k` is set iff
/// every entry shares that field's value.
pub(crate) fn elect_flags(entries: &[&ResourceIndexEntry]) -> IndexTypeFlags {
    let Some(first) = entries.first() else {
        return IndexTypeFlags::default();
    };

    let mut flags = 0u32;
    if entries.iter().all(|e| e.key.type_id == first.key.type_id) {
        flags |= IndexTypeFlags::CONSTANT_TYPE;
    }
    if entries.iter().all(|e| e.key.group == first.key.group) {
        flags |= IndexTypeFlags::CONSTANT_GROUP;
    }
    if entries
        .iter()
        .all(|e| e.key.instance_high() == first.key.instance_high())
    {
        flags |= IndexTypeFlags::CONSTANT_INSTANCE_HIGH;
    }
    IndexTypeFlags::from(flags)
}

/// `unused_bits` carries the non-field bits of the flag word the index
/// was loaded with; they mean nothing here but are preserved on write.
pub(crate) fn write_index(
    entries: &[&ResourceIndexEntry],
    unused_bits: u32,
) -> (IndexTypeFlags, Vec<u8>) {
    let flags = IndexTypeFlags::from(elect_flags(entries).raw() | (unused_bits & !0x7));
    let mut writer = ByteWriter::new();
    writer.write_u32(flags.raw());

    if let Some(first) = entries.first() {
        if flags.check_flag(IndexTypeFlags::CONSTANT_TYPE) {
            writer.write_u32(first.key.type_id);
        }
        if flags.check_flag(IndexTypeFlags::CONSTANT_GROUP) {
            writer.write_u32(first.key.group);
        }
        if flags.check_flag(IndexTypeFlags::CONSTANT_INSTANCE_HIGH) {
            writer.write_u32(first.key.instance_high());
        }
    }

    for entry in entries {
        if !flags.check_flag(IndexTypeFlags::CONSTANT_TYPE) {
            writer.write_u32(entry.key.type_id);
        }
        if !flags.check_flag(IndexTypeFlags::CONSTANT_GROUP) {
            writer.write_u32(entry.key.group);
        }
        if !flags.check_flag(IndexTypeFlags::CONSTANT_INSTANCE_HIGH) {
            writer.write_u32(entry.key.instance_high());
        }
        writer.write_u32(entry.key.instance_low());
        writer.write_u32(entry.chunk_offset);
        writer.write_u32(entry.file_size | FILE_SIZE_HIGH_BIT);
        writer.write_u32(entry.memory_size);
        writer.write_u16(entry.compression_type);
        writer.write_u16(entry.unknown2);
    }

    (flags, writer.into_bytes())
}
