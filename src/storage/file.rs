use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{KeyValueStore, StorageError};

/// JSON-object file acting as a key-value slot.
///
/// Every write rewrites the whole file through a temp file and a rename, so
/// a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(entries)?;
        let temp_path = self.path.with_extension(format!("tmp.{}", std::process::id()));

        let result = (|| -> std::io::Result<()> {
            let mut options = std::fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            // Session data is user-private.
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
            drop(file);

            #[cfg(windows)]
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            std::fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = result {
            let _ = std::fs::remove_file(&temp_path);
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write storage file");
            return Err(e.into());
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_all(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> (FileStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("news_digest_storage_{}", name));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        (FileStore::new(dir.join("storage.json")), dir)
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let (store, dir) = temp_store("missing");
        assert_eq!(store.get("authState").unwrap(), None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_set_survives_new_instance() {
        let (store, dir) = temp_store("reopen");
        store.set("authState", r#"{"isSignedIn":false}"#).unwrap();

        let reopened = FileStore::new(store.path());
        assert_eq!(
            reopened.get("authState").unwrap().as_deref(),
            Some(r#"{"isSignedIn":false}"#)
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_remove_keeps_other_keys() {
        let (store, dir) = temp_store("remove");
        store.set("authState", "a").unwrap();
        store.set("theme", "dark").unwrap();

        store.remove("authState").unwrap();
        assert_eq!(store.get("authState").unwrap(), None);
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_garbage_file_is_format_error() {
        let (store, dir) = temp_store("garbage");
        std::fs::write(store.path(), "not json {{").unwrap();

        let err = store.get("authState").unwrap_err();
        assert!(matches!(err, StorageError::Format(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_user_private() {
        use std::os::unix::fs::PermissionsExt;

        let (store, dir) = temp_store("perms");
        store.set("authState", "x").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        std::fs::remove_dir_all(&dir).ok();
    }
}
