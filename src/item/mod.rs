//! Item Store: per-key payload directories
//!
//! Every key owns one directory `<root>/<key>/` whose entries are item
//! files named by their allocation index (`1`, `2`, ...). File content is
//! the raw payload; reads are capped at [`READ_SIZE`] bytes, writes are
//! not capped.

use crate::errors::Result;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Maximum number of bytes returned when reading an item back.
///
/// Payloads larger than this are truncated on read, not on write. Fixed
/// protocol limit.
pub const READ_SIZE: usize = 65535;

/// Item storage rooted at the database directory.
#[derive(Debug, Clone)]
pub struct ItemStore {
    root: PathBuf,
}

impl ItemStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Directory holding one key's item files
    pub fn key_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Path of one item file
    pub fn item_path(&self, key: &str, index: u64) -> PathBuf {
        self.key_dir(key).join(index.to_string())
    }

    pub fn dir_exists(&self, key: &str) -> bool {
        self.key_dir(key).is_dir()
    }

    /// Create the key's directory (mode 0755 on Unix). No-op if present.
    pub fn ensure_dir(&self, key: &str) -> Result<()> {
        let dir = self.key_dir(key);
        if dir.is_dir() {
            return Ok(());
        }
        create_dir_0755(&dir)?;
        Ok(())
    }

    pub fn exists(&self, key: &str, index: u64) -> bool {
        self.item_path(key, index).is_file()
    }

    /// Write one payload. The caller advances the counters only after this
    /// succeeds, so a failed write leaves no index corruption behind.
    pub fn write(&self, key: &str, index: u64, payload: &[u8]) -> Result<()> {
        fs::write(self.item_path(key, index), payload)?;
        Ok(())
    }

    /// Read one payload back, truncated at [`READ_SIZE`] bytes.
    pub fn read(&self, key: &str, index: u64) -> Result<Vec<u8>> {
        let file = File::open(self.item_path(key, index))?;
        let mut payload = Vec::new();
        file.take(READ_SIZE as u64).read_to_end(&mut payload)?;
        Ok(payload)
    }

    pub fn delete(&self, key: &str, index: u64) -> Result<()> {
        fs::remove_file(self.item_path(key, index))?;
        Ok(())
    }

    /// Delete every item file and the key directory itself.
    ///
    /// Tolerates a missing directory: a crashed push can leave a control
    /// file with no directory behind it.
    pub fn clear(&self, key: &str) -> Result<()> {
        let dir = self.key_dir(key);
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            fs::remove_file(entry.path())?;
        }
        fs::remove_dir(&dir)?;
        Ok(())
    }
}

/// Create a directory (and missing parents) with mode 0755 on Unix.
pub(crate) fn create_dir_0755(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
        fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)?;
        // mode() is filtered through the umask; pin the final bits
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755))
    }

    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}
