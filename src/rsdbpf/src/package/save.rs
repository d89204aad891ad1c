use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::compression;
use super::entry::{EntryId, ResourceIndexEntry};
use super::header::{PackageHeader, HEADER_SIZE};
use super::index;
use super::package::{Package, PackageSource};
use crate::{CancelToken, Error, Result};

impl Package {
    /// Save in place over the backing file.
    ///
    /// Protocol: write the complete new archive to a sibling temp file,
    /// take a best-effort lock on the original, copy the temp contents
    /// over the original from offset 0, truncate to the new length,
    /// flush, unlock, delete the temp file. Up to and including the lock
    /// the original is untouched; a failure during the copy-back leaves
    /// it partially written (the protocol is not fully crash-safe), with
    /// the in-memory package still intact and usable either way.
    pub fn save(&mut self) -> Result<()> {
        self.save_cancellable(&CancelToken::new())
    }

    pub fn save_cancellable(&mut self, token: &CancelToken) -> Result<()> {
        self.ensure_writable()?;
        let path = self.path.clone().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "package has no backing file; use save_as or save_to_stream",
            ))
        })?;

        let temp_path = sibling_temp_path(&path);
        let outcome = self.save_over(&temp_path, token);
        match outcome {
            Ok((entries, header)) => {
                if let Err(error) = fs::remove_file(&temp_path) {
                    log::warn!("leaving temp file {}: {error}", temp_path.display());
                }
                self.adopt(entries, header);
                Ok(())
            }
            Err(error) => {
                // Roll back: the temp file goes, in-memory entries and
                // caches stay as they were.
                let _ = fs::remove_file(&temp_path);
                Err(error)
            }
        }
    }

    fn save_over(
        &mut self,
        temp_path: &Path,
        token: &CancelToken,
    ) -> Result<(Vec<ResourceIndexEntry>, PackageHeader)> {
        token.check()?;
        let mut temp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        let (entries, header) = self.write_archive(&mut temp, token)?;
        temp.sync_all()?;

        // Last point at which cancellation leaves the original file
        // bit-identical to its pre-save state.
        token.check()?;

        let enforce_lock = self.config.enforce_file_lock_on_save;
        let original = match self.source.as_mut() {
            Some(PackageSource::File(file)) => file,
            _ => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "in-place save requires a file-backed package",
                )))
            }
        };

        let locked = if enforce_lock {
            lock_best_effort(original)?
        } else {
            false
        };

        let copy_back = (|| -> Result<()> {
            temp.seek(SeekFrom::Start(0))?;
            original.seek(SeekFrom::Start(0))?;
            let copied = io::copy(&mut temp, original)?;
            original.set_len(copied)?;
            original.sync_all()?;
            Ok(())
        })();
        if locked {
            let _ = original.unlock();
        }
        copy_back?;

        Ok((entries, header))
    }

    /// Write the archive to a new path, then rebind the package to it.
    /// No locking and no truncation protocol; the target is written
    /// directly.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.save_as_cancellable(path, &CancelToken::new())
    }

    pub fn save_as_cancellable(
        &mut self,
        path: impl AsRef<Path>,
        token: &CancelToken,
    ) -> Result<()> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let (entries, header) = self.write_archive(&mut file, token)?;
        file.sync_all()?;

        self.source = Some(PackageSource::File(file));
        self.path = Some(path.to_path_buf());
        self.writable = true;
        self.adopt(entries, header);
        Ok(())
    }

    /// Serialize the current state into `stream` without touching the
    /// package: entries keep their offsets into the original source and
    /// no notification fires.
    pub fn save_to_stream<W: Write + Seek>(&mut self, stream: &mut W) -> Result<()> {
        self.save_to_stream_cancellable(stream, &CancelToken::new())
    }

    pub fn save_to_stream_cancellable<W: Write + Seek>(
        &mut self,
        stream: &mut W,
        token: &CancelToken,
    ) -> Result<()> {
        self.write_archive(stream, token)?;
        Ok(())
    }

    /// Emit header, payloads and index, returning the rebuilt entry
    /// table and header describing the written stream.
    ///
    /// Pristine entries are copied byte-for-byte from the source stream;
    /// dirty entries are re-deflated when the original payload was
    /// compressed and compression is being preserved. On-disk deleted
    /// markers keep their index fields verbatim and contribute no chunk.
    fn write_archive<W: Write + Seek>(
        &mut self,
        out: &mut W,
        token: &CancelToken,
    ) -> Result<(Vec<ResourceIndexEntry>, PackageHeader)> {
        out.write_all(&[0u8; HEADER_SIZE])?;

        let live: Vec<usize> = (0..self.entries.len())
            .filter(|&i| !self.entries[i].deleted)
            .collect();

        let mut new_entries: Vec<ResourceIndexEntry> = Vec::with_capacity(live.len());
        for source_index in live {
            token.check()?;
            let entry = self.entries[source_index].clone();
            let id = EntryId(new_entries.len());

            if entry.is_deleted_marker() && !entry.dirty {
                new_entries.push(ResourceIndexEntry {
                    id,
                    dirty: false,
                    ..entry
                });
                continue;
            }

            let chunk_offset = out.stream_position()?;
            if chunk_offset > u32::MAX as u64 {
                return Err(Error::SizeLimitExceeded {
                    kind: "archive",
                    value: chunk_offset,
                    limit: u32::MAX as u64,
                });
            }

            let (disk_bytes, memory_size, compression_type) = if entry.dirty {
                let payload = entry.cache.clone().unwrap_or_default();
                let memory_size = payload.len() as u32;
                if self.config.preserve_compression_on_save && entry.is_compressed() {
                    let deflated = compression::deflate(&payload)?;
                    (deflated, memory_size, entry.compression_type)
                } else {
                    (payload, memory_size, 0)
                }
            } else if !entry.is_unwritten() {
                (self.read_raw(source_index)?, entry.memory_size, entry.compression_type)
            } else {
                let payload = entry.cache.clone().unwrap_or_default();
                let memory_size = payload.len() as u32;
                (payload, memory_size, 0)
            };

            out.write_all(&disk_bytes)?;
            new_entries.push(ResourceIndexEntry {
                id,
                key: entry.key,
                chunk_offset: chunk_offset as u32,
                file_size: disk_bytes.len() as u32,
                memory_size,
                compression_type,
                unknown2: entry.unknown2,
                deleted: false,
                dirty: false,
                // Caches populated by earlier reads stay valid.
                cache: entry.cache,
            });
        }

        let index_position = out.stream_position()?;
        if index_position > u32::MAX as u64 {
            return Err(Error::SizeLimitExceeded {
                kind: "archive",
                value: index_position,
                limit: u32::MAX as u64,
            });
        }
        let refs: Vec<&ResourceIndexEntry> = new_entries.iter().collect();
        let (_, blob) = index::write_index(&refs, self.index_flags_unused);
        out.write_all(&blob)?;

        let header = PackageHeader {
            user_version_major: self.header.user_version_major,
            user_version_minor: self.header.user_version_minor,
            created: self.header.created,
            updated: self.header.updated,
            index_count: new_entries.len() as u32,
            index_position_legacy: 0,
            index_size: blob.len() as u32,
            index_position: index_position as u32,
        };
        out.seek(SeekFrom::Start(0))?;
        out.write_all(&header.write())?;
        out.seek(SeekFrom::End(0))?;
        out.flush()?;

        Ok((new_entries, header))
    }

    /// Swap in the rebuilt entry table after a successful save and tell
    /// handle holders their [`EntryId`]s are stale.
    fn adopt(&mut self, entries: Vec<ResourceIndexEntry>, header: PackageHeader) {
        self.entries = entries;
        self.header = header;
        self.dirty = false;
        self.notify_index_invalidated();
    }
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Best-effort advisory lock standing in for a byte-range lock on the
/// 96-byte header; std offers whole-file locks only. An unsupported
/// platform or filesystem is not an error.
fn lock_best_effort(file: &File) -> Result<bool> {
    match file.try_lock() {
        Ok(()) => Ok(true),
        Err(TryLockError::WouldBlock) => Err(Error::Busy),
        Err(TryLockError::Error(error)) if error.kind() == io::ErrorKind::Unsupported => {
            debug!("file locking unsupported here; saving without a lock");
            Ok(false)
        }
        Err(TryLockError::Error(error)) => Err(Error::Io(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceKey;
    use std::io::Cursor;

    fn build_package() -> Package {
        let mut package = Package::create_new();
        package
            .add(ResourceKey::new(0x0166_038C, 0, 1), b"alpha".to_vec(), true)
            .unwrap();
        package
            .add(ResourceKey::new(0x545A_C67A, 0, 2), b"beta-beta".to_vec(), true)
            .unwrap();
        package
    }

    fn to_bytes(package: &mut Package) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        package.save_to_stream(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn written_stream_reopens_with_same_entries() {
        let mut package = build_package();
        let bytes = to_bytes(&mut package);
        let mut reopened = Package::from_bytes(bytes).unwrap();
        assert_eq!(reopened.len(), 2);
        let keys: Vec<_> = reopened.entries().map(|e| e.key()).collect();
        assert_eq!(keys[0], ResourceKey::new(0x0166_038C, 0, 1));
        let id = reopened.find(keys[1]).unwrap().id();
        assert_eq!(reopened.payload(id).unwrap(), b"beta-beta");
    }

    #[test]
    fn first_chunk_lands_right_after_the_header() {
        let mut package = build_package();
        let bytes = to_bytes(&mut package);
        let reopened = Package::from_bytes(bytes).unwrap();
        let first = reopened.entries().next().unwrap();
        assert_eq!(first.chunk_offset(), HEADER_SIZE as u32);
        assert_eq!(first.file_size(), 5);
        assert_eq!(first.memory_size(), 5);
    }

    #[test]
    fn unmutated_round_trip_is_bit_identical() {
        let mut package = build_package();
        let first = to_bytes(&mut package);
        let mut reopened = Package::from_bytes(first.clone()).unwrap();
        let second = to_bytes(&mut reopened);
        assert_eq!(first, second);
    }

    #[test]
    fn deleted_entries_dropped_on_save() {
        let mut package = build_package();
        let id = package.find(ResourceKey::new(0x0166_038C, 0, 1)).unwrap().id();
        package.delete(id).unwrap();
        let bytes = to_bytes(&mut package);
        let reopened = Package::from_bytes(bytes).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.find(ResourceKey::new(0x0166_038C, 0, 1)).is_none());
    }

    #[test]
    fn save_to_stream_does_not_invalidate_handles() {
        let mut package = build_package();
        let id = package.find(ResourceKey::new(0x545A_C67A, 0, 2)).unwrap().id();
        let _ = to_bytes(&mut package);
        // Handles and dirty state survive a stream serialization.
        assert!(package.is_dirty());
        assert_eq!(package.payload(id).unwrap(), b"beta-beta");
    }
}
