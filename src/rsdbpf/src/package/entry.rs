use crate::ResourceKey;

/// `chunk_offset` value of an entry whose payload has never been written
/// to disk.
pub const UNWRITTEN_CHUNK_OFFSET: u32 = 0xFFFF_FFFF;

/// Historical "always set" bit carried in the on-disk `file_size`; masked
/// off on read, set again on write.
pub const FILE_SIZE_HIGH_BIT: u32 = 0x8000_0000;

/// Handle to one entry of an open package.
///
/// Handles are positions in the package's backing sequence and stay valid
/// until the entry list is rebuilt; a save rebuild fires the package's
/// index-invalidated notification, after which holders must re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(pub(crate) usize);

/// Identifies and locates one payload inside a package.
///
/// Lifecycle across a save: an entry starts `Pristine` (as decoded from
/// the index), becomes `Read` once its payload is cached, `Modified` when
/// replaced or newly added, and `Written` after a save places it in the
/// output. Pristine entries are written by direct byte copy from the
/// source stream, preserving bit identity for untouched payloads.
#[derive(Debug, Clone)]
pub struct ResourceIndexEntry {
    pub(crate) id: EntryId,
    pub(crate) key: ResourceKey,
    pub(crate) chunk_offset: u32,
    pub(crate) file_size: u32,
    pub(crate) memory_size: u32,
    pub(crate) compression_type: u16,
    pub(crate) unknown2: u16,
    pub(crate) deleted: bool,
    pub(crate) dirty: bool,
    /// Inflated payload, populated lazily on first read or eagerly for
    /// added/replaced entries.
    pub(crate) cache: Option<Vec<u8>>,
}

impl ResourceIndexEntry {
    /// A freshly added entry: unwritten, dirty, payload held in memory.
    pub(crate) fn added(id: EntryId, key: ResourceKey, bytes: Vec<u8>) -> ResourceIndexEntry {
        let size = bytes.len() as u32;
        ResourceIndexEntry {
            id,
            key,
            chunk_offset: UNWRITTEN_CHUNK_OFFSET,
            file_size: size,
            memory_size: size,
            compression_type: 0,
            unknown2: 1,
            deleted: false,
            dirty: true,
            cache: Some(bytes),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    pub fn chunk_offset(&self) -> u32 {
        self.chunk_offset
    }

    /// On-disk payload size, high bit already masked off.
    pub fn file_size(&self) -> u32 {
        self.file_size
    }

    /// Inflated payload size.
    pub fn memory_size(&self) -> u32 {
        self.memory_size
    }

    pub fn compression_type(&self) -> u16 {
        self.compression_type
    }

    pub fn unknown2(&self) -> u16 {
        self.unknown2
    }

    pub fn is_compressed(&self) -> bool {
        self.compression_type != 0
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True for entries that have never been placed in an archive.
    pub fn is_unwritten(&self) -> bool {
        self.chunk_offset == UNWRITTEN_CHUNK_OFFSET
    }

    /// On-disk tombstone left by other tools: a real index entry with no
    /// payload. Preserved byte-for-byte on save unless explicitly
    /// deleted.
    pub fn is_deleted_marker(&self) -> bool {
        self.file_size == 1 && self.memory_size == 0xFFFF_FFFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_entries_start_unwritten_and_dirty() {
        let entry = ResourceIndexEntry::added(
            EntryId(0),
            ResourceKey::new(1, 2, 3),
            vec![0xAA; 10],
        );
        assert!(entry.is_unwritten());
        assert!(entry.is_dirty());
        assert!(!entry.is_compressed());
        assert_eq!(entry.memory_size(), 10);
        assert_eq!(entry.unknown2(), 1);
    }

    #[test]
    fn deleted_marker_detection() {
        let mut entry = ResourceIndexEntry::added(EntryId(0), ResourceKey::new(1, 2, 3), vec![]);
        entry.file_size = 1;
        entry.memory_size = 0xFFFF_FFFF;
        assert!(entry.is_deleted_marker());
    }
}
