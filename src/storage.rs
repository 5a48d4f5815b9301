//! Durable JSON stores with atomic whole-file replacement

use crate::errors::{BotResult, StorageError};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// One JSON document holding a single value of `T`.
///
/// Writes go to a temporary file in the same directory which is fsynced and
/// then renamed over the target, so a crash mid-write leaves either the old
/// or the new document on disk.
#[derive(Clone, Debug)]
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored value, or `T::default()` when absent or malformed
    pub fn load_or_default(&self) -> T {
        match self.load() {
            Ok(Some(value)) => value,
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "Store absent, starting empty");
                T::default()
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Store unreadable, starting empty");
                T::default()
            }
        }
    }

    /// Read the stored value; `Ok(None)` if the file does not exist
    pub fn load(&self) -> BotResult<Option<T>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadFailed(format!("{}: {}", self.path.display(), e)).into())
            }
        };

        let value = serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::CorruptedData(format!("{}: {}", self.path.display(), e))
        })?;

        Ok(Some(value))
    }

    /// Atomically replace the stored value
    pub fn save(&self, value: &T) -> BotResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let bytes = serde_json::to_vec_pretty(value).map_err(|e| {
            StorageError::WriteFailed(format!("Failed to encode {}: {}", self.path.display(), e))
        })?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| {
            StorageError::WriteFailed(format!("Failed to replace {}: {}", self.path.display(), e.error))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_default() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<HashMap<String, u64>> = JsonStore::new(dir.path().join("money.json"));

        assert!(store.load().unwrap().is_none());
        assert!(store.load_or_default().is_empty());
    }

    #[test]
    fn test_corrupt_file_reads_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("giveaway.json");
        fs::write(&path, b"[\"alice\", ").unwrap();

        let store: JsonStore<Vec<String>> = JsonStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(crate::errors::BotError::Storage(StorageError::CorruptedData(_)))
        ));
        assert!(store.load_or_default().is_empty());
    }

    #[test]
    fn test_save_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Vec<String>> = JsonStore::new(dir.path().join("nested/entries.json"));

        store.save(&vec!["alice".to_string(), "alice".to_string(), "bob".to_string()]).unwrap();
        store.save(&vec!["carol".to_string()]).unwrap();

        assert_eq!(store.load_or_default(), vec!["carol".to_string()]);

        // no temp files left behind next to the target
        let leftovers = fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_scalar_store() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<u8> = JsonStore::new(dir.path().join("bullet.json"));

        assert_eq!(store.load_or_default(), 0);
        store.save(&4).unwrap();
        assert_eq!(store.load_or_default(), 4);
    }
}
