/// Tunable limits and behaviors of a [`crate::Package`].
///
/// There is no environment or file configuration; callers pass a value
/// here or take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageConfig {
    /// Upper bound on the index entry count accepted from a header.
    pub max_resource_count: u32,
    /// Upper bound on any on-disk or inflated payload, and on the index
    /// blob itself.
    pub max_resource_size: u32,
    /// Keep each entry's compression state across a save instead of
    /// writing everything uncompressed. Global, not per entry.
    pub preserve_compression_on_save: bool,
    /// Take a best-effort file lock for the in-place save protocol.
    /// Platforms without lock support skip it silently.
    pub enforce_file_lock_on_save: bool,
}

impl Default for PackageConfig {
    fn default() -> PackageConfig {
        PackageConfig {
            max_resource_count: 1 << 20,
            max_resource_size: 0x7FFF_FFFF,
            preserve_compression_on_save: true,
            enforce_file_lock_on_save: true,
        }
    }
}
