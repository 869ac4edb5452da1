//! Atomic JSON file operations.
//!
//! Writes go to a temporary sibling file that is fsynced and renamed over the
//! target, so readers never observe a half-written file.

use fitrack_core::error::{FitrackError, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A handle to a JSON file that is replaced atomically on every save.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Serializes `data` and atomically replaces the file with it.
    ///
    /// Concurrent writers from other processes are serialized with an
    /// exclusive lock on a sibling `.lock` file.
    pub fn save(&self, data: &T) -> Result<()> {
        self.ensure_parent()?;
        let _lock = FileLock::acquire(&self.path)?;
        self.replace(data)
    }

    /// Read-modify-write under the exclusive lock.
    ///
    /// The file is reloaded after the lock is taken, so a change made by
    /// another process since this handle last read the file is kept. Nothing
    /// is written if `change` fails.
    ///
    /// # Returns
    ///
    /// The data as saved, together with the value returned by `change`.
    pub fn update<R>(&self, change: impl FnOnce(&mut T) -> Result<R>) -> Result<(T, R)>
    where
        T: Default,
    {
        self.ensure_parent()?;
        let _lock = FileLock::acquire(&self.path)?;

        let mut data = self.load()?.unwrap_or_default();
        let result = change(&mut data)?;
        self.replace(&data)?;
        Ok((data, result))
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Writes a temp file and renames it over the target. Caller holds the lock.
    fn replace(&self, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| FitrackError::io(format!("{:?} has no file name", self.path)))?;

        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(self.path.with_file_name(tmp_name))
    }
}

/// Exclusive lock held for the duration of a save.
///
/// The `.lock` file is never removed, so every process locks the same inode.
struct FileLock {
    #[allow(dead_code)]
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        use fs2::FileExt;

        let lock_path = path.with_extension("lock");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        file.lock_exclusive()
            .map_err(|e| FitrackError::io(format!("Failed to acquire lock: {}", e)))?;

        Ok(FileLock { file })
    }
}
