//! Persistence collaborator for the profile document.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ProfileSnapshot, ProfileUpdate};
use crate::error::{CoreError, PersistenceError};
use crate::storage::data_dir;

/// Profile file name inside the data directory.
pub const PROFILE_FILE: &str = "profile.json";

/// Load and merge-save the profile document.
///
/// `save` must tolerate partial updates and be idempotent: applying the
/// same update twice leaves the same document.
pub trait ProfileStore: Send + Sync {
    fn load(&self) -> Result<ProfileSnapshot, PersistenceError>;

    fn save(&self, update: &ProfileUpdate) -> Result<(), PersistenceError>;

    /// Overwrite the whole document.
    fn replace(&self, profile: &ProfileSnapshot) -> Result<(), PersistenceError>;
}

/// Pretty-printed JSON file, written via a temporary file and rename.
#[derive(Debug)]
pub struct JsonProfileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `profile.json` in the data directory.
    pub fn open_default() -> Result<Self, CoreError> {
        Ok(Self::new(data_dir()?.join(PROFILE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ProfileSnapshot, PersistenceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProfileSnapshot::default())
            }
            Err(source) => {
                return Err(PersistenceError::ReadFailed {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(ProfileSnapshot::default());
        }
        serde_json::from_str(&content).map_err(|e| PersistenceError::DecodeFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn write(&self, profile: &ProfileSnapshot) -> Result<(), PersistenceError> {
        let content =
            serde_json::to_string_pretty(profile).map_err(|e| PersistenceError::DecodeFailed {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        let write_failed = |source| PersistenceError::WriteFailed {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(write_failed)?;
        std::fs::rename(&tmp, &self.path).map_err(write_failed)?;
        Ok(())
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self) -> Result<ProfileSnapshot, PersistenceError> {
        self.read()
    }

    fn save(&self, update: &ProfileUpdate) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().map_err(|_| PersistenceError::Poisoned)?;
        let mut profile = self.read()?;
        update.clone().apply(&mut profile);
        self.write(&profile)
    }

    fn replace(&self, profile: &ProfileSnapshot) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().map_err(|_| PersistenceError::Poisoned)?;
        self.write(profile)
    }
}

/// In-memory store. Writes can be made to fail to exercise the
/// log-and-continue path.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profile: Mutex<ProfileSnapshot>,
    saves: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryProfileStore {
    pub fn new(profile: ProfileSnapshot) -> Self {
        Self {
            profile: Mutex::new(profile),
            ..Self::default()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::WriteFailed {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "writes disabled"),
            });
        }
        Ok(())
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self) -> Result<ProfileSnapshot, PersistenceError> {
        self.profile
            .lock()
            .map(|p| p.clone())
            .map_err(|_| PersistenceError::Poisoned)
    }

    fn save(&self, update: &ProfileUpdate) -> Result<(), PersistenceError> {
        self.check_writable()?;
        let mut profile = self.profile.lock().map_err(|_| PersistenceError::Poisoned)?;
        update.clone().apply(&mut profile);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn replace(&self, profile: &ProfileSnapshot) -> Result<(), PersistenceError> {
        self.check_writable()?;
        let mut current = self.profile.lock().map_err(|_| PersistenceError::Poisoned)?;
        *current = profile.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companion::{DialogueCache, TriggerKind};

    #[test]
    fn missing_file_loads_default_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonProfileStore::new(dir.path().join(PROFILE_FILE));
        let profile = store.load().unwrap();
        assert_eq!(profile, ProfileSnapshot::default());
    }

    #[test]
    fn save_merges_into_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonProfileStore::new(dir.path().join(PROFILE_FILE));
        store
            .replace(&ProfileSnapshot {
                name: "Miso".into(),
                api_key: "secret".into(),
                ..ProfileSnapshot::default()
            })
            .unwrap();

        let mut cache = DialogueCache::default();
        cache.push(TriggerKind::Click, "hi", 20);
        let update = ProfileUpdate {
            saved_time_left: Some(300),
            dialogue_cache: Some(cache),
            ..ProfileUpdate::default()
        };
        store.save(&update).unwrap();
        store.save(&update).unwrap();

        let profile = store.load().unwrap();
        assert_eq!(profile.name, "Miso");
        assert_eq!(profile.api_key, "secret");
        assert_eq!(profile.saved_time_left, Some(300));
        assert_eq!(profile.dialogue_cache.lines(TriggerKind::Click), ["hi"]);
        assert!(!dir.path().join("profile.json.tmp").exists());
    }

    #[test]
    fn corrupt_document_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROFILE_FILE);
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonProfileStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(PersistenceError::DecodeFailed { .. })
        ));
    }

    #[test]
    fn memory_store_can_refuse_writes() {
        let store = MemoryProfileStore::default();
        store.set_fail_writes(true);
        assert!(store.save(&ProfileUpdate::default()).is_err());
        store.set_fail_writes(false);
        store.save(&ProfileUpdate::default()).unwrap();
        assert_eq!(store.save_count(), 1);
    }
}
