//! File-backed store: one file per key under a base directory
//!
//! ```text
//! ~/.local/share/flowdeck/storage/
//! ├── app_logs
//! ├── auth_token
//! └── custom_endpoints
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{KeyValueStore, StorageError, validate_key};

/// Durable store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|source| StorageError::CreateDir {
            path: base_path.clone(),
            source,
        })?;
        debug!(?base_path, "FileStore::open: opened store");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        debug!(?path, len = value.len(), "FileStore::set: writing value");

        // Write-then-rename keeps readers from seeing a half-written value
        let tmp_path = self.base_path.join(format!(".{key}.tmp"));
        fs::write(&tmp_path, value)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        debug!(?path, "FileStore::remove: called");
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_directory() {
        let temp = tempdir().unwrap();
        let nested = temp.path().join("a").join("b");
        let store = FileStore::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.base_path(), nested.as_path());
    }

    #[test]
    fn test_open_over_a_file_fails_with_storage_error() {
        let temp = tempdir().unwrap();
        let blocker = temp.path().join("storage");
        fs::write(&blocker, "not a directory").unwrap();

        match FileStore::open(&blocker) {
            Err(StorageError::CreateDir { path, .. }) => assert_eq!(path, blocker),
            other => panic!("expected CreateDir error, got {:?}", other.map(|s| s.base_path().to_path_buf())),
        }
    }

    #[test]
    fn test_values_survive_reopen() {
        let temp = tempdir().unwrap();
        {
            let store = FileStore::open(temp.path()).unwrap();
            store.set("auth_token", "abc").unwrap();
        }

        let store = FileStore::open(temp.path()).unwrap();
        assert_eq!(store.get("auth_token").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_missing_and_removed_keys() {
        let temp = tempdir().unwrap();
        let store = FileStore::open(temp.path()).unwrap();

        assert!(store.get("last_email").unwrap().is_none());
        store.set("last_email", "a@b.com").unwrap();
        store.remove("last_email").unwrap();
        assert!(store.get("last_email").unwrap().is_none());
        store.remove("last_email").unwrap();
    }

    #[test]
    fn test_rejects_path_traversal() {
        let temp = tempdir().unwrap();
        let store = FileStore::open(temp.path()).unwrap();
        let err = store.set("../escape", "x").unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
    }
}
