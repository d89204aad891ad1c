use std::fs::OpenOptions;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::compression;
use super::config::PackageConfig;
use super::entry::{EntryId, ResourceIndexEntry};
use super::header::{PackageHeader, HEADER_SIZE};
use super::index;
use crate::resource::{create_resource, BoxResource};
use crate::{CancelToken, Error, ResourceKey, Result};

/// The stream a package was opened from. Owned for the package's
/// lifetime; dropped with it.
#[derive(Debug)]
pub(crate) enum PackageSource {
    File(std::fs::File),
    Memory(Cursor<Vec<u8>>),
}

impl PackageSource {
    pub(crate) fn len(&mut self) -> Result<u64> {
        Ok(match self {
            PackageSource::File(file) => file.metadata()?.len(),
            PackageSource::Memory(cursor) => cursor.get_ref().len() as u64,
        })
    }

    pub(crate) fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; length];
        match self {
            PackageSource::File(file) => {
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut buffer)?;
            }
            PackageSource::Memory(cursor) => {
                cursor.seek(SeekFrom::Start(offset))?;
                cursor.read_exact(&mut buffer)?;
            }
        }
        Ok(buffer)
    }
}

/// An open DBPF v2.1 archive.
///
/// Single-writer, multi-reader per instance: the package is `Send` but
/// not internally synchronized, so concurrent mutation from several
/// threads is the caller's responsibility to serialize.
///
/// Entry handles ([`EntryId`]) stay valid until the entry list is rebuilt
/// by a successful save, which fires the index-invalidated notification.
pub struct Package {
    pub(crate) config: PackageConfig,
    pub(crate) header: PackageHeader,
    pub(crate) entries: Vec<ResourceIndexEntry>,
    pub(crate) source: Option<PackageSource>,
    pub(crate) path: Option<PathBuf>,
    pub(crate) writable: bool,
    pub(crate) dirty: bool,
    /// Non-field bits of the index flag word, carried across saves.
    pub(crate) index_flags_unused: u32,
    pub(crate) observers: Vec<Box<dyn FnMut() + Send>>,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("path", &self.path)
            .field("writable", &self.writable)
            .field("dirty", &self.dirty)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl Package {
    /// Open an archive from disk.
    pub fn open(path: impl AsRef<Path>, writable: bool) -> Result<Package> {
        Package::open_with(
            path,
            writable,
            PackageConfig::default(),
            &CancelToken::new(),
        )
    }

    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Package> {
        Package::open(path, false)
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        writable: bool,
        config: PackageConfig,
        token: &CancelToken,
    ) -> Result<Package> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(writable).open(path)?;
        let mut package = Package::load(PackageSource::File(file), config, token)?;
        package.path = Some(path.to_path_buf());
        package.writable = writable;
        Ok(package)
    }

    /// Open an archive held in memory. The package is writable; use
    /// [`Package::save_as`] or [`Package::save_to_stream`] to persist it.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Package> {
        Package::from_bytes_with(bytes, PackageConfig::default(), &CancelToken::new())
    }

    pub fn from_bytes_with(
        bytes: Vec<u8>,
        config: PackageConfig,
        token: &CancelToken,
    ) -> Result<Package> {
        let mut package = Package::load(PackageSource::Memory(Cursor::new(bytes)), config, token)?;
        package.writable = true;
        Ok(package)
    }

    /// A new, empty, writable package with no backing file.
    pub fn create_new() -> Package {
        Package::create_new_with(PackageConfig::default())
    }

    pub fn create_new_with(config: PackageConfig) -> Package {
        Package {
            config,
            header: PackageHeader::default(),
            entries: Vec::new(),
            source: None,
            path: None,
            writable: true,
            dirty: true,
            index_flags_unused: 0,
            observers: Vec::new(),
        }
    }

    fn load(
        mut source: PackageSource,
        config: PackageConfig,
        token: &CancelToken,
    ) -> Result<Package> {
        token.check()?;
        let file_length = source.len()?;
        if file_length < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEnd {
                needed: HEADER_SIZE,
                available: file_length as usize,
            });
        }

        let header_bytes: [u8; HEADER_SIZE] =
            source.read_at(0, HEADER_SIZE)?.try_into().unwrap();
        let header = PackageHeader::from(&header_bytes)?;

        if header.index_count > config.max_resource_count {
            return Err(Error::SizeLimitExceeded {
                kind: "index count",
                value: header.index_count as u64,
                limit: config.max_resource_count as u64,
            });
        }
        if header.index_size > config.max_resource_size {
            return Err(Error::SizeLimitExceeded {
                kind: "index",
                value: header.index_size as u64,
                limit: config.max_resource_size as u64,
            });
        }

        let index_position = header.effective_index_position();
        if index_position as u64 + header.index_size as u64 > file_length {
            return Err(Error::invalid("index position", index_position, 64));
        }

        token.check()?;
        let (index_flags, entries) = if header.index_count == 0 && header.index_size == 0 {
            (Default::default(), Vec::new())
        } else {
            let blob = source.read_at(index_position as u64, header.index_size as usize)?;
            index::read_index(&blob, header.index_count)?
        };

        let mut package = Package {
            config,
            header,
            entries,
            source: Some(source),
            path: None,
            writable: false,
            dirty: false,
            index_flags_unused: index_flags.raw() & !0x7,
            observers: Vec::new(),
        };
        package.notify_index_invalidated();
        Ok(package)
    }

    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Live entries in insertion order. Tombstones are skipped; they stay
    /// in the backing sequence until the next save.
    pub fn entries(&self) -> impl Iterator<Item = &ResourceIndexEntry> {
        self.entries.iter().filter(|entry| !entry.deleted)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow an entry by handle.
    ///
    /// Panics if the handle predates the last index rebuild; subscribe
    /// through [`Package::on_index_invalidated`] to know when to re-fetch.
    pub fn entry(&self, id: EntryId) -> &ResourceIndexEntry {
        &self.entries[id.0]
    }

    /// Linear scan for the first live entry with `key`.
    ///
    /// Iteration order is part of the interface, so no lookup table is
    /// maintained; callers needing faster lookup layer their own.
    pub fn find(&self, key: ResourceKey) -> Option<&ResourceIndexEntry> {
        self.entries().find(|entry| entry.key == key)
    }

    /// Lazy sequence of live entries matching `predicate`.
    pub fn find_all<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a ResourceIndexEntry>
    where
        P: Fn(&ResourceIndexEntry) -> bool + 'a,
    {
        self.entries().filter(move |entry| predicate(entry))
    }

    /// Materialize an entry's inflated payload, caching it on the entry.
    pub fn payload(&mut self, id: EntryId) -> Result<&[u8]> {
        self.payload_cancellable(id, &CancelToken::new())
    }

    pub fn payload_cancellable(&mut self, id: EntryId, token: &CancelToken) -> Result<&[u8]> {
        if self.entries[id.0].deleted {
            return Err(Error::NotFound(self.entries[id.0].key));
        }

        if self.entries[id.0].cache.is_none() {
            let bytes = self.materialize(id.0, token)?;
            self.entries[id.0].cache = Some(bytes);
        }
        Ok(self.entries[id.0].cache.as_deref().unwrap_or_default())
    }

    fn materialize(&mut self, index: usize, token: &CancelToken) -> Result<Vec<u8>> {
        let entry = &self.entries[index];
        if entry.is_unwritten() || entry.is_deleted_marker() {
            return Ok(Vec::new());
        }

        let limit = self.config.max_resource_size;
        if entry.file_size > limit || entry.memory_size > limit {
            return Err(Error::SizeLimitExceeded {
                kind: "resource",
                value: entry.file_size.max(entry.memory_size) as u64,
                limit: limit as u64,
            });
        }

        token.check()?;
        let key = entry.key;
        let (offset, file_size, memory_size, compressed) = (
            entry.chunk_offset as u64,
            entry.file_size as usize,
            entry.memory_size as usize,
            entry.is_compressed(),
        );
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return Err(Error::NotFound(key)),
        };
        let raw = source.read_at(offset, file_size)?;

        if compressed {
            compression::inflate(&raw, memory_size)
        } else {
            Ok(raw)
        }
    }

    /// Read an entry's on-disk bytes without inflating. Used by the save
    /// path to copy pristine payloads bit-for-bit.
    pub(crate) fn read_raw(&mut self, index: usize) -> Result<Vec<u8>> {
        let key = self.entries[index].key;
        let (offset, file_size) = (
            self.entries[index].chunk_offset as u64,
            self.entries[index].file_size as usize,
        );
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return Err(Error::NotFound(key)),
        };
        source.read_at(offset, file_size)
    }

    /// Parse an entry's payload through the process-wide wrapper
    /// registry.
    pub fn resource(&mut self, id: EntryId) -> Result<BoxResource> {
        let key = self.entries[id.0].key;
        let bytes = self.payload(id)?.to_vec();
        create_resource(key, &bytes)
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(Error::ReadOnly)
        }
    }

    fn check_payload_size(&self, size: usize) -> Result<()> {
        if size as u64 > self.config.max_resource_size as u64 {
            return Err(Error::SizeLimitExceeded {
                kind: "resource",
                value: size as u64,
                limit: self.config.max_resource_size as u64,
            });
        }
        Ok(())
    }

    /// Append a new entry holding `bytes`.
    ///
    /// With `reject_duplicates`, an existing live entry under the same
    /// key fails with [`Error::DuplicateKey`] and the package is
    /// unchanged.
    pub fn add(
        &mut self,
        key: ResourceKey,
        bytes: Vec<u8>,
        reject_duplicates: bool,
    ) -> Result<EntryId> {
        self.ensure_writable()?;
        self.check_payload_size(bytes.len())?;
        if self.entries.len() as u64 >= self.config.max_resource_count as u64 {
            return Err(Error::SizeLimitExceeded {
                kind: "index count",
                value: self.entries.len() as u64 + 1,
                limit: self.config.max_resource_count as u64,
            });
        }
        if reject_duplicates && self.find(key).is_some() {
            return Err(Error::DuplicateKey(key));
        }

        let id = EntryId(self.entries.len());
        self.entries
            .push(ResourceIndexEntry::added(id, key, bytes));
        self.dirty = true;
        Ok(id)
    }

    /// Replace an entry's payload in place.
    pub fn replace(&mut self, id: EntryId, bytes: Vec<u8>) -> Result<()> {
        self.ensure_writable()?;
        self.check_payload_size(bytes.len())?;
        let entry = &mut self.entries[id.0];
        if entry.deleted {
            return Err(Error::NotFound(entry.key));
        }
        entry.memory_size = bytes.len() as u32;
        entry.file_size = bytes.len() as u32;
        entry.cache = Some(bytes);
        entry.dirty = true;
        self.dirty = true;
        Ok(())
    }

    /// Tombstone an entry. It vanishes from lookups and iteration but
    /// stays in the backing sequence until the next save drops it.
    pub fn delete(&mut self, id: EntryId) -> Result<()> {
        self.ensure_writable()?;
        let entry = &mut self.entries[id.0];
        if entry.deleted {
            return Err(Error::NotFound(entry.key));
        }
        entry.deleted = true;
        self.dirty = true;
        Ok(())
    }

    /// Subscribe to entry-list rebuilds. Fired after a load and after
    /// every successful save; previously held [`EntryId`]s are invalid
    /// once the callback runs.
    pub fn on_index_invalidated(&mut self, callback: impl FnMut() + Send + 'static) {
        self.observers.push(Box::new(callback));
    }

    pub(crate) fn notify_index_invalidated(&mut self) {
        for observer in &mut self.observers {
            observer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_new_is_empty_and_dirty() {
        let package = Package::create_new();
        assert!(package.is_empty());
        assert!(package.is_dirty());
        assert!(package.is_writable());
        assert!(package.path().is_none());
    }

    #[test]
    fn add_find_payload() {
        let mut package = Package::create_new();
        let key = ResourceKey::new(0x1234, 5, 6);
        let id = package.add(key, vec![1, 2, 3], true).unwrap();
        assert_eq!(package.find(key).unwrap().id(), id);
        assert_eq!(package.payload(id).unwrap(), &[1, 2, 3]);
        assert_eq!(package.len(), 1);
    }

    #[test]
    fn duplicate_key_rejected_without_side_effects() {
        let mut package = Package::create_new();
        let key = ResourceKey::new(1, 2, 3);
        package.add(key, vec![1], true).unwrap();
        assert!(matches!(
            package.add(key, vec![2], true),
            Err(Error::DuplicateKey(k)) if k == key
        ));
        assert_eq!(package.len(), 1);
        // Without rejection the duplicate is appended.
        package.add(key, vec![2], false).unwrap();
        assert_eq!(package.len(), 2);
    }

    #[test]
    fn deleted_entries_invisible_to_lookups() {
        let mut package = Package::create_new();
        let key = ResourceKey::new(1, 2, 3);
        let id = package.add(key, vec![1], true).unwrap();
        package.delete(id).unwrap();
        assert!(package.find(key).is_none());
        assert_eq!(package.entries().count(), 0);
        assert!(matches!(package.payload(id), Err(Error::NotFound(_))));
    }

    #[test]
    fn replace_updates_cache_and_sizes() {
        let mut package = Package::create_new();
        let id = package
            .add(ResourceKey::new(1, 2, 3), vec![1], true)
            .unwrap();
        package.replace(id, vec![9, 9, 9, 9]).unwrap();
        let entry = package.entry(id);
        assert_eq!(entry.memory_size(), 4);
        assert!(entry.is_dirty());
        assert_eq!(package.payload(id).unwrap(), &[9, 9, 9, 9]);
    }

    #[test]
    fn oversized_payload_rejected() {
        let mut config = PackageConfig::default();
        config.max_resource_size = 8;
        let mut package = Package::create_new_with(config);
        assert!(matches!(
            package.add(ResourceKey::new(1, 0, 0), vec![0; 9], true),
            Err(Error::SizeLimitExceeded { kind: "resource", value: 9, limit: 8 })
        ));
    }

    #[test]
    fn find_all_filters_lazily() {
        let mut package = Package::create_new();
        for i in 0..4u64 {
            package
                .add(ResourceKey::new((i % 2) as u32, 0, i), vec![], false)
                .unwrap();
        }
        let even: Vec<_> = package.find_all(|e| e.key().type_id == 0).collect();
        assert_eq!(even.len(), 2);
    }
}
