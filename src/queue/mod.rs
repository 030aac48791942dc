//! Queue Engine: push/pop/remove orchestration
//!
//! Owns the per-key open handle cache and brackets every mutating
//! operation with the lock coordinator. The on-disk state is the source
//! of truth; the cache only exists so repeated operations on one key do
//! not reopen its control file, and it is rebuilt from disk on every
//! construction.

use crate::control::{self, ControlField};
use crate::errors::{FileQueueError, Result};
use crate::item::{create_dir_0755, ItemStore};
use crate::lock::{self, RetryPolicy};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the control directory under the database root.
pub const CONFIG_DIRNAME: &str = ".file-queue";

/// Extension of per-key control files.
const KEY_FILE_EXTENSION: &str = "key";

/// Cached open state for one key.
#[derive(Debug)]
struct KeyHandle {
    keyfile: PathBuf,
    file: File,
}

/// Persistent file-backed keyed queue.
///
/// Every key is an independent queue with its own control file, item
/// directory and advisory lock. Pop order is most-recently-pushed first
/// (LIFO): the pop cursor starts at the last push's index and only moves
/// downward.
///
/// Multiple processes may share one database root; operations on the same
/// key serialize on the key's control-file lock, operations on different
/// keys never contend.
///
/// # Example
///
/// ```no_run
/// use file_queue::FileQueue;
///
/// let mut queue = FileQueue::new("/var/lib/myapp/queue").unwrap();
/// queue.push("jobs", b"payload").unwrap();
/// assert_eq!(queue.pop("jobs").unwrap(), Some(b"payload".to_vec()));
/// ```
#[derive(Debug)]
pub struct FileQueue {
    database_root: PathBuf,
    config_path: PathBuf,
    items: ItemStore,
    cache_keys: HashMap<String, KeyHandle>,
    push_retry: RetryPolicy,
    pop_retry: RetryPolicy,
}

impl FileQueue {
    /// Open (creating if absent) a queue database at `database_root`.
    ///
    /// Creates the root and control directories when missing and pre-opens
    /// a handle for every key already present on disk. Fails only on a
    /// missing root path or on I/O errors; an empty directory is a valid
    /// empty database.
    pub fn new(database_root: impl Into<PathBuf>) -> Result<Self> {
        let database_root = database_root.into();
        if database_root.as_os_str().is_empty() {
            return Err(FileQueueError::Config(
                "databaseRoot must be set".to_string(),
            ));
        }

        if !database_root.is_dir() {
            create_dir_0755(&database_root)?;
        }

        let config_path = database_root.join(CONFIG_DIRNAME);
        if !config_path.is_dir() {
            create_dir_0755(&config_path)?;
        }

        let mut queue = Self {
            items: ItemStore::new(database_root.clone()),
            database_root,
            config_path,
            cache_keys: HashMap::new(),
            push_retry: RetryPolicy::push_default(),
            pop_retry: RetryPolicy::pop_default(),
        };
        queue.init_keys()?;

        Ok(queue)
    }

    /// Replace the default lock retry policies.
    pub fn with_retry_policy(mut self, push: RetryPolicy, pop: RetryPolicy) -> Self {
        self.push_retry = push;
        self.pop_retry = pop;
        self
    }

    /// Seed the handle cache from the control directory.
    ///
    /// A control file that cannot be opened is skipped with a warning so
    /// one damaged key never blocks the whole database from opening.
    fn init_keys(&mut self) -> Result<()> {
        for entry in fs::read_dir(&self.config_path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(KEY_FILE_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match OpenOptions::new().read(true).write(true).open(&path) {
                Ok(file) => {
                    self.cache_keys.insert(
                        key.to_string(),
                        KeyHandle {
                            keyfile: path.clone(),
                            file,
                        },
                    );
                }
                Err(e) => {
                    warn!(key, error = %e, "skipping unopenable control file");
                }
            }
        }
        debug!(
            keys = self.cache_keys.len(),
            root = %self.database_root.display(),
            "opened queue database"
        );
        Ok(())
    }

    /// Database root directory.
    pub fn database_root(&self) -> &Path {
        &self.database_root
    }

    /// Whether a control file exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.keyfile_path(key).is_file()
    }

    /// Keys currently known to the handle cache, sorted.
    ///
    /// After construction this is every key on disk; keys created by
    /// other processes afterwards appear only once touched here.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.cache_keys.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Append a payload to `key`, creating the key on first push.
    ///
    /// Allocates index `increment + 1`, writes the item file, then
    /// advances `key-increment`, `key-popindex` and `key-count` under the
    /// key's lock. A failed item write propagates as `Err` and leaves all
    /// counters untouched.
    pub fn push(&mut self, key: &str, payload: &[u8]) -> Result<()> {
        Self::validate_key(key)?;
        self.context_key(key)?;

        let items = &self.items;
        let policy = &self.push_retry;
        let entry = cached_handle(&mut self.cache_keys, key)?;

        lock::with_exclusive_lock(&mut entry.file, policy, |file| {
            if !items.dir_exists(key) {
                items.ensure_dir(key)?;
                control::write_field(file, ControlField::Increment, 0)?;
                control::write_field(file, ControlField::Count, 0)?;
            }

            let record = control::read_record(file)?;
            let index = record.next_increment();

            items.write(key, index, payload)?;

            control::write_field(file, ControlField::Increment, index)?;
            control::write_field(file, ControlField::PopIndex, index)?;
            control::write_field(file, ControlField::Count, record.count_or_zero() + 1)?;

            debug!(key, index, "pushed item");
            Ok(())
        })
    }

    /// Pop the most recently available item from `key`.
    ///
    /// Scans item indices downward from `key-popindex` until a file is
    /// found. Returns `Ok(None)` without taking the lock when the key has
    /// no control file or no item directory, and `Ok(None)` without
    /// touching any counter when the scan finds nothing.
    pub fn pop(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        Self::validate_key(key)?;

        if !self.contains(key) || !self.items.dir_exists(key) {
            return Ok(None);
        }
        self.context_key(key)?;

        let items = &self.items;
        let policy = &self.pop_retry;
        let entry = cached_handle(&mut self.cache_keys, key)?;

        lock::with_exclusive_lock(&mut entry.file, policy, |file| {
            let record = control::read_record(file)?;
            let mut index = record.pop_index.unwrap_or(0);

            while index > 0 {
                if items.exists(key, index) {
                    let payload = items.read(key, index)?;
                    items.delete(key, index)?;
                    control::write_field(file, ControlField::PopIndex, index - 1)?;
                    control::write_field(
                        file,
                        ControlField::Count,
                        record.count_or_zero().saturating_sub(1),
                    )?;
                    debug!(key, index, "popped item");
                    return Ok(Some(payload));
                }
                index -= 1;
            }

            Ok(None)
        })
    }

    /// Number of items currently stored under `key`, 0 for unknown keys.
    pub fn count(&mut self, key: &str) -> Result<u64> {
        Self::validate_key(key)?;

        if !self.contains(key) {
            return Ok(0);
        }
        self.context_key(key)?;

        let entry = cached_handle(&mut self.cache_keys, key)?;
        let record = control::read_record(&mut entry.file)?;
        Ok(record.count_or_zero())
    }

    /// Delete `key` entirely: every item file, the item directory and the
    /// control file. Returns `Ok(false)` when the key is unknown.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        Self::validate_key(key)?;

        if !self.contains(key) {
            return Ok(false);
        }

        // Evict first so the descriptor closes (releasing any lock)
        // before its control file is unlinked
        let keyfile = match self.cache_keys.remove(key) {
            Some(handle) => handle.keyfile,
            None => self.keyfile_path(key),
        };

        self.items.clear(key)?;
        fs::remove_file(&keyfile)?;

        debug!(key, "removed queue key");
        Ok(true)
    }

    /// Apply [`remove`](Self::remove) to every key in the handle cache.
    ///
    /// Keys created by other processes after this instance was constructed
    /// are not in the cache and are left untouched.
    pub fn remove_all(&mut self) -> Result<()> {
        for key in self.keys() {
            self.remove(&key)?;
        }
        Ok(())
    }

    /// Resolve the key's cached handle, opening (and creating with mode
    /// 0755 on Unix) the control file on first contact.
    fn context_key(&mut self, key: &str) -> Result<()> {
        if self.cache_keys.contains_key(key) {
            return Ok(());
        }

        // create_new never truncates: if another process created the
        // control file first, reopen theirs instead
        let keyfile = self.keyfile_path(key);
        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&keyfile)
        {
            Ok(file) => {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(&keyfile, fs::Permissions::from_mode(0o755))?;
                }
                file
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                OpenOptions::new().read(true).write(true).open(&keyfile)?
            }
            Err(e) => return Err(e.into()),
        };
        self.cache_keys
            .insert(key.to_string(), KeyHandle { keyfile, file });
        Ok(())
    }

    fn keyfile_path(&self, key: &str) -> PathBuf {
        self.config_path
            .join(format!("{}.{}", key, KEY_FILE_EXTENSION))
    }

    /// Keys double as directory and file names, so anything that escapes
    /// the database root or collides with the control directory is
    /// rejected up front.
    fn validate_key(key: &str) -> Result<()> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\'])
            && key != CONFIG_DIRNAME;
        if valid {
            Ok(())
        } else {
            Err(FileQueueError::InvalidKey(key.to_string()))
        }
    }
}

impl Drop for FileQueue {
    fn drop(&mut self) {
        // Handles close on drop; log the teardown for traceability
        debug!(
            keys = self.cache_keys.len(),
            root = %self.database_root.display(),
            "closing queue database"
        );
    }
}

/// Fetch the cached handle populated by `context_key`.
fn cached_handle<'a>(
    cache_keys: &'a mut HashMap<String, KeyHandle>,
    key: &str,
) -> Result<&'a mut KeyHandle> {
    cache_keys
        .get_mut(key)
        .ok_or_else(|| FileQueueError::Path(format!("no cached handle for key: {}", key)))
}
