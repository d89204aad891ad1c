use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The closed error taxonomy of the library.
///
/// Every failure carries enough context (field name, byte position, limit
/// value) to be reported verbatim. Errors are returned, never recovered
/// from internally; there are no retries.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying read/write failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A magic, version, or enum field had an illegal value.
    #[error("invalid {field} 0x{value:X} at offset {position}")]
    InvalidFormat {
        field: &'static str,
        value: u64,
        position: u64,
    },

    /// A parser or reader ran out of input.
    #[error("unexpected end of data: needed {needed} bytes, {available} available")]
    UnexpectedEnd { needed: usize, available: usize },

    /// Index, resource, or decompressed payload exceeded a configured limit.
    #[error("{kind} size {value} exceeds limit {limit}")]
    SizeLimitExceeded {
        kind: &'static str,
        value: u64,
        limit: u64,
    },

    /// A live entry with the same key already exists.
    #[error("duplicate resource key {0}")]
    DuplicateKey(crate::ResourceKey),

    /// A different factory is already registered for this type id.
    #[error("duplicate wrapper registration for type 0x{0:08X}")]
    DuplicateTypeId(u32),

    /// Mutation attempted on a read-only package.
    #[error("package is read-only")]
    ReadOnly,

    /// Requested entry or key is absent.
    #[error("resource {0} not found")]
    NotFound(crate::ResourceKey),

    /// Decompression or a codec detected inconsistent internal structure.
    #[error("corrupted data: {0}")]
    CorruptedData(String),

    /// A file-level lock could not be acquired.
    #[error("file is locked by another writer")]
    Busy,

    /// Operation aborted by a cancellation signal.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn invalid(field: &'static str, value: impl Into<u64>, position: u64) -> Error {
        Error::InvalidFormat {
            field,
            value: value.into(),
            position,
        }
    }

    pub(crate) fn corrupted(message: impl Into<String>) -> Error {
        Error::CorruptedData(message.into())
    }
}
