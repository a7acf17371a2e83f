//! Durable store backed by a single JSON file
//!
//! The whole store is one JSON object of string values. Every read goes to
//! disk so that several contexts, or several processes, sharing the file see
//! each other's writes. Writers do not coordinate across processes; the last
//! writer wins.

use super::{KeyValueStore, StorageScope};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use stockroom_core::{storage_error, ErrorContext, StockroomResult};
use tracing::{debug, warn};

type Entries = BTreeMap<String, String>;

pub struct FileStore {
    path: PathBuf,
    // serialises read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store at `path`
    ///
    /// Nothing touches the disk until the first write, which creates the file
    /// and any missing parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        debug!("Durable store at {}", path.display());

        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn failure_context(&self, operation: &str) -> ErrorContext {
        ErrorContext::new("file_store")
            .with_operation(operation)
            .with_detail("path", self.path.display())
    }

    /// Current entries
    ///
    /// A missing, empty or corrupt file reads as empty. Any other read
    /// failure is returned, so writers never replace data they could not see.
    fn load(&self) -> std::io::Result<Entries> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e),
        };

        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }

        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    "Durable store {} is corrupt, treating as empty: {}",
                    self.path.display(),
                    e
                );
                Ok(Entries::new())
            }
        }
    }

    fn persist(&self, entries: &Entries, operation: &str, key: &str) -> StockroomResult<()> {
        let json = serde_json::to_string_pretty(entries)?;

        // write-then-rename so readers never observe a half-written file
        let tmp = self.path.with_extension("json.tmp");
        let written = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
            _ => Ok(()),
        }
        .and_then(|_| std::fs::write(&tmp, json))
        .and_then(|_| std::fs::rename(&tmp, &self.path));

        written.map_err(|e| {
            storage_error!(
                format!("Failed to write {}: {}", self.path.display(), e),
                key,
                e,
                self.failure_context(operation)
                    .with_suggestion("Check that the data directory is writable")
            )
        })
    }

    fn update<F>(&self, operation: &str, key: &str, f: F) -> StockroomResult<()>
    where
        F: FnOnce(&mut Entries) -> bool,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load().map_err(|e| {
            storage_error!(
                format!("Failed to read {}: {}", self.path.display(), e),
                key,
                e,
                self.failure_context(operation)
                    .with_suggestion("Check the permissions of the durable store file")
            )
        })?;

        if f(&mut entries) {
            self.persist(&entries, operation, key)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore").field("path", &self.path).finish()
    }
}

impl KeyValueStore for FileStore {
    fn scope(&self) -> StorageScope {
        StorageScope::Durable
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.load() {
            Ok(mut entries) => entries.remove(key),
            Err(e) => {
                warn!("Durable store {} unreadable: {}", self.path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> StockroomResult<()> {
        self.update("set", key, |entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> StockroomResult<()> {
        self.update("remove", key, |entries| entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::StockroomError;
    use tempfile::TempDir;

    #[test]
    fn two_handles_share_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store").join("local-storage.json");

        let first = FileStore::open(&path);
        let second = FileStore::open(&path);

        first.set("auth", "{\"token\":\"t\"}").unwrap();
        assert_eq!(second.get("auth").as_deref(), Some("{\"token\":\"t\"}"));

        second.remove("auth").unwrap();
        assert!(first.get("auth").is_none());
    }

    #[test]
    fn corrupt_file_reads_as_empty_and_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local-storage.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path);
        assert!(store.get("auth").is_none());

        store.set("perms", "[]").unwrap();
        assert_eq!(store.get("perms").as_deref(), Some("[]"));
    }

    #[test]
    fn removing_missing_key_does_not_create_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local-storage.json");

        let store = FileStore::open(&path);
        store.remove("auth").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn unreadable_file_fails_writes_instead_of_dropping_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local-storage.json");
        let store = FileStore::open(&path);
        store.set("auth", "{\"token\":\"t\"}").unwrap();

        // a directory where the file should be cannot be read as a string
        let aside = dir.path().join("aside.json");
        std::fs::rename(&path, &aside).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.get("auth").is_none());
        let err = store.set("perms", "[]").unwrap_err();
        match &err {
            StockroomError::Storage { key, context, .. } => {
                assert_eq!(key.as_deref(), Some("perms"));
                assert_eq!(context.component, "file_store");
                assert_eq!(context.operation.as_deref(), Some("set"));
            }
            other => panic!("expected storage error, got {other:?}"),
        }
        assert!(store.remove("auth").is_err());

        // once the file is back, nothing was lost
        std::fs::remove_dir(&path).unwrap();
        std::fs::rename(&aside, &path).unwrap();
        assert_eq!(store.get("auth").as_deref(), Some("{\"token\":\"t\"}"));
    }
}
