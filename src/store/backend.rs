use crate::error::{Result, ScanError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// String key-value storage, the shape of a browser's local storage.
///
/// Values are opaque strings; the profile store keeps one JSON blob under a
/// single key and always reads and writes it whole.
pub trait KeyValueStorage: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage. Clones share the same underlying map, so a test can
/// keep a handle and inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed storage: one `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                ScanError::storage(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            info!("Created storage directory: {}", dir.display());
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.item_path(key);
        match fs::read_to_string(&path) {
            Ok(value) => {
                debug!("Read {} bytes from {}", value.len(), path.display());
                Ok(Some(value))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ScanError::storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.item_path(key);
        let tmp_path = self.dir.join(format!("{}.json.tmp", key));

        // Write then rename so a crash never leaves a half-written blob
        fs::write(&tmp_path, value).map_err(|e| {
            ScanError::storage(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            ScanError::storage(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_storage_shares_state_between_clones() {
        let mut storage = MemoryStorage::new();
        let observer = storage.clone();

        storage.set_item("k", "v").unwrap();

        assert_eq!(observer.raw("k").as_deref(), Some("v"));
        assert_eq!(storage.get_item("missing").unwrap(), None);
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(dir.path().join("data")).unwrap();

        assert_eq!(storage.get_item("barcodeUsers").unwrap(), None);

        storage.set_item("barcodeUsers", "{\"a\":1}").unwrap();
        assert_eq!(
            storage.get_item("barcodeUsers").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert!(dir.path().join("data/barcodeUsers.json").exists());
        assert!(!dir.path().join("data/barcodeUsers.json.tmp").exists());
    }

    #[test]
    fn test_file_storage_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(dir.path()).unwrap();

        storage.set_item("k", "first").unwrap();
        storage.set_item("k", "second").unwrap();

        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("second"));
    }
}
