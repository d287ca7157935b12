//! Remembers a returning student's identity fields so the check-in form can be
//! pre-filled.
//!
//! Storage is best-effort: every failure is logged and reported as `false` or
//! `None`, never propagated.

use common::config::AppConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

pub const STUDENT_ID_KEY: &str = "studentId";
pub const STUDENT_NAME_KEY: &str = "studentName";
pub const STUDENT_EMAIL_KEY: &str = "studentEmail";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("storage contents are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Minimal string key/value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Keeps all entries in one JSON object on disk. A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Identity fields a student types on their first check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub student_id: String,
    pub name: String,
    pub email: String,
}

pub struct StudentInfoStore<S> {
    store: S,
}

impl StudentInfoStore<FileStore> {
    /// File-backed store at the configured `PREFILL_STORE_PATH`.
    pub fn from_config() -> Self {
        let path = AppConfig::global().prefill_store_path.clone();
        Self::new(FileStore::new(path))
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }
}

impl<S: KeyValueStore> StudentInfoStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn save(&self, info: &StudentInfo) -> bool {
        let result = self
            .store
            .set(STUDENT_ID_KEY, &info.student_id)
            .and_then(|_| self.store.set(STUDENT_NAME_KEY, &info.name))
            .and_then(|_| self.store.set(STUDENT_EMAIL_KEY, &info.email));

        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not save student info: {e}");
                false
            }
        }
    }

    /// Returns the stored info only when all three fields are present and non-empty.
    pub fn load(&self) -> Option<StudentInfo> {
        let read = |key: &str| match self.store.get(key) {
            Ok(value) => Ok(value.filter(|v| !v.is_empty())),
            Err(e) => Err(e),
        };

        let fields = read(STUDENT_ID_KEY).and_then(|id| {
            let name = read(STUDENT_NAME_KEY)?;
            let email = read(STUDENT_EMAIL_KEY)?;
            Ok((id, name, email))
        });

        match fields {
            Ok((Some(student_id), Some(name), Some(email))) => Some(StudentInfo {
                student_id,
                name,
                email,
            }),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Could not load student info: {e}");
                None
            }
        }
    }

    pub fn clear(&self) -> bool {
        let result = [STUDENT_ID_KEY, STUDENT_NAME_KEY, STUDENT_EMAIL_KEY]
            .into_iter()
            .try_for_each(|key| self.store.remove(key));

        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not clear student info: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("disabled".into()))
        }
        fn set(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disabled".into()))
        }
        fn remove(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disabled".into()))
        }
    }

    fn jane() -> StudentInfo {
        StudentInfo {
            student_id: "u21000001".into(),
            name: "Jane Doe".into(),
            email: "jane@tuks.co.za".into(),
        }
    }

    #[test]
    fn saved_info_loads_back() {
        let prefill = StudentInfoStore::new(MemoryStore::new());
        assert!(prefill.save(&jane()));
        assert_eq!(prefill.load(), Some(jane()));
    }

    #[test]
    fn load_is_none_when_any_field_is_missing_or_empty() {
        let store = MemoryStore::new();
        store.set(STUDENT_ID_KEY, "u21000001").unwrap();
        store.set(STUDENT_NAME_KEY, "Jane Doe").unwrap();
        let prefill = StudentInfoStore::new(store);
        assert_eq!(prefill.load(), None);

        let mut partial = jane();
        partial.email = String::new();
        assert!(prefill.save(&partial));
        assert_eq!(prefill.load(), None);
    }

    #[test]
    fn clear_removes_everything() {
        let prefill = StudentInfoStore::new(MemoryStore::new());
        prefill.save(&jane());
        assert!(prefill.clear());
        assert_eq!(prefill.load(), None);
    }

    #[test]
    fn broken_storage_never_panics() {
        let prefill = StudentInfoStore::new(BrokenStore);
        assert!(!prefill.save(&jane()));
        assert_eq!(prefill.load(), None);
        assert!(!prefill.clear());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefill").join("student.json");

        assert!(StudentInfoStore::new(FileStore::new(&path)).save(&jane()));
        assert_eq!(StudentInfoStore::new(FileStore::new(&path)).load(), Some(jane()));

        assert!(StudentInfoStore::new(FileStore::new(&path)).clear());
        assert_eq!(StudentInfoStore::new(FileStore::new(&path)).load(), None);
    }

    #[test]
    fn corrupt_file_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("student.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get(STUDENT_ID_KEY), Err(StoreError::Corrupt(_))));
        assert_eq!(StudentInfoStore::new(store).load(), None);
    }

    #[test]
    #[serial]
    fn from_config_uses_configured_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("student.json");
        AppConfig::set_prefill_store_path(path.to_string_lossy());

        let prefill = StudentInfoStore::<FileStore>::from_config();
        assert_eq!(prefill.path(), path.as_path());
        assert!(prefill.save(&jane()));
        assert!(path.exists());
        assert_eq!(StudentInfoStore::new(FileStore::new(&path)).load(), Some(jane()));

        AppConfig::reset();
    }
}
