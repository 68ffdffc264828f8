//! Cache behavior settings, grounded on `settings.py`'s module-level
//! constants. Unlike the Python original these are loaded once into a
//! struct rather than read as bare globals, but the names and defaults are
//! kept identical so an operator who knows the old deployment can map
//! config keys directly.

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Files at or above this size (bytes) go through the content-addressed
    /// transfer path instead of a direct HTTP GET/PUT.
    pub cacheclient3_size_threshold: u64,
    /// Seconds a cached file's mtime is trusted before a fresh stat is
    /// issued for an already-open file.
    pub mtime_refresh_threshold: u64,
    /// Seconds a metadata cache entry (file or directory listing) is
    /// trusted before it is considered stale.
    pub mtime_metadata_refresh_threshold: u64,
    /// Path prefixes exempted from the normal staleness check: metadata
    /// under one of these is cached for a full day instead.
    pub no_recheck_metadata_patterns: Vec<String>,
    /// Whether SET_INFO writes and CLOSE-after-write push the file back to
    /// the backend immediately (`true`) or defer to the background queue.
    pub enable_write_through: bool,
    /// Whether advisory mtime "touch" is forwarded to the backend at all.
    pub enable_touch_files: bool,
    /// Per-request timeout for `list_dir.json`, which can be slow against
    /// very large directories.
    pub list_dir_timeout_secs: u64,
    /// Local on-disk root the placeholder files live under.
    pub shares_root: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            cacheclient3_size_threshold: 1024 * 1024,
            mtime_refresh_threshold: 5,
            mtime_metadata_refresh_threshold: 15,
            no_recheck_metadata_patterns: Vec::new(),
            enable_write_through: true,
            enable_touch_files: false,
            list_dir_timeout_secs: 50,
            shares_root: "/home/data/smbshares/".to_string(),
        }
    }
}
