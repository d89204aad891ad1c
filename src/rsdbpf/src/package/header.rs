use crate::{Error, Result};

/// # DBPF v2.1 header (96 bytes)
///
/// All fields little-endian. Bytes not listed are zero and preserved.
///
/// | Offset | Size | Field |
/// | ------ | ---- | ----- |
/// | 0      | 4    | magic "DBPF" |
/// | 4      | 4    | major version, always 2 |
/// | 8      | 4    | minor version, always 1 |
/// | 12     | 8    | user version (major, minor) |
/// | 24     | 8    | creation / update timestamps |
/// | 36     | 4    | index entry count |
/// | 40     | 4    | index position (legacy) |
/// | 44     | 4    | index size in bytes |
/// | 60     | 4    | constant 3 |
/// | 64     | 4    | index position (preferred, used when non-zero) |
pub const HEADER_SIZE: usize = 96;

pub const MAGIC: [u8; 4] = *b"DBPF";
pub const MAJOR_VERSION: u32 = 2;
pub const MINOR_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackageHeader {
    pub user_version_major: u32,
    pub user_version_minor: u32,
    pub created: u32,
    pub updated: u32,
    pub index_count: u32,
    pub index_position_legacy: u32,
    pub index_size: u32,
    pub index_position: u32,
}

impl PackageHeader {
    pub fn from(slice: &[u8; 96]) -> Result<PackageHeader> {
        let field = |start: usize| u32::from_le_bytes(slice[start..start + 4].try_into().unwrap());

        if slice[0..4] != MAGIC {
            return Err(Error::invalid("package magic", field(0), 0));
        }
        let major = field(4);
        if major != MAJOR_VERSION {
            return Err(Error::invalid("major version", major, 4));
        }
        let minor = field(8);
        if minor != MINOR_VERSION {
            return Err(Error::invalid("minor version", minor, 8));
        }

        Ok(PackageHeader {
            user_version_major: field(12),
            user_version_minor: field(16),
            created: field(24),
            updated: field(28),
            index_count: field(36),
            index_position_legacy: field(40),
            index_size: field(44),
            index_position: field(64),
        })
    }

    /// The preferred field at offset 64 wins when non-zero; older writers
    /// only filled the legacy field at offset 40.
    pub fn effective_index_position(&self) -> u32 {
        if self.index_position != 0 {
            self.index_position
        } else {
            self.index_position_legacy
        }
    }

    pub fn write(&self) -> [u8; 96] {
        let mut bytes = [0u8; 96];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4..8].copy_from_slice(&MAJOR_VERSION.to_le_bytes());
        bytes[8..12].copy_from_slice(&MINOR_VERSION.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.user_version_major.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.user_version_minor.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.created.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.updated.to_le_bytes());
        bytes[36..40].copy_from_slice(&self.index_count.to_le_bytes());
        bytes[40..44].copy_from_slice(&self.index_position_legacy.to_le_bytes());
        bytes[44..48].copy_from_slice(&self.index_size.to_le_bytes());
        bytes[60..64].copy_from_slice(&3u32.to_le_bytes());
        bytes[64..68].copy_from_slice(&self.index_position.to_le_bytes());
        bytes
    }
}
