//! services/tutor/src/adapters/kv_store.rs
//!
//! A `KeyValueStore` persisted as one JSON object on disk, the device-local
//! storage of the shell.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};
use tutor_core::ports::{KeyValueStore, PortError, PortResult};

type Entries = BTreeMap<String, Value>;

pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file starts empty; an unreadable
    /// one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> PortResult<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring corrupt local store {}: {}", path.display(), e);
                Entries::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        debug!("Opened local store {} with {} keys.", path.display(), entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| PortError::Unexpected("local store lock poisoned".to_string()))
    }

    fn flush(&self, entries: &Entries) -> PortResult<()> {
        let content =
            serde_json::to_string_pretty(entries).map_err(|e| PortError::Unexpected(e.to_string()))?;
        write_atomic(&self.path, &content).map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

/// Writes through a sibling temp file and a rename, so readers never see a
/// half-written store. The file holds the access token, so it is owner-only.
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(err) = fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get_raw(&self, key: &str) -> PortResult<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: Value) -> PortResult<()> {
        let mut entries = self.lock()?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        let mut entries = self.lock()?;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("local.json");

        let store = FileStore::open(&path).unwrap();
        store.set_raw("pending_redirect", json!("writing-coach")).unwrap();
        store.set_raw("last_quiz_answers", json!({"0": 2})).unwrap();
        store.remove("last_quiz_answers").unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get_raw("pending_redirect").unwrap(), Some(json!("writing-coach")));
        assert_eq!(reopened.get_raw("last_quiz_answers").unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path).unwrap();

        assert_eq!(store.get_raw("anything").unwrap(), None);
        store.set_raw("k", json!(1)).unwrap();
        assert_eq!(FileStore::open(&path).unwrap().get_raw("k").unwrap(), Some(json!(1)));
    }

    #[cfg(unix)]
    #[test]
    fn store_file_is_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let store = FileStore::open(&path).unwrap();

        store.set_raw("auth_access_token", json!("token-1")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("local.json");
        let store = FileStore::open(&path).unwrap();
        store.set_raw("kept", json!(1)).unwrap();

        // Replace the parent directory with a plain file so the next flush fails.
        fs::remove_dir_all(dir.path().join("state")).unwrap();
        fs::write(dir.path().join("state"), "blocker").unwrap();

        assert!(store.set_raw("lost", json!(2)).is_err());
        assert!(store.remove("kept").is_err());

        assert_eq!(store.get_raw("lost").unwrap(), None);
        assert_eq!(store.get_raw("kept").unwrap(), Some(json!(1)));
    }
}
