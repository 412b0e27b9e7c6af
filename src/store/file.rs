//! JSON file per service, replaced atomically on every write.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::store::{validate_service, PersistedTokenRecord, TokenStore};
use crate::{StoreError, StoreResult};

/// Stores each service's record as `<dir>/<service>.json`.
#[derive(Debug)]
pub struct FileTokenStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileTokenStore {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, service: &str) -> StoreResult<PathBuf> {
        validate_service(service)?;
        Ok(self.dir.join(format!("{}.json", service)))
    }

    fn persist(&self, service: &str, path: &Path, contents: &[u8]) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            StoreError::Backend(format!("failed to create {}: {}", self.dir.display(), e))
        })?;
        let tmp_path = self.dir.join(format!(".{}.json.tmp", service));
        {
            let mut file = File::create(&tmp_path).map_err(|e| {
                StoreError::Backend(format!("failed to create {}: {}", tmp_path.display(), e))
            })?;
            file.write_all(contents).map_err(|e| {
                StoreError::Backend(format!("failed to write {}: {}", tmp_path.display(), e))
            })?;
            file.sync_all().map_err(|e| {
                StoreError::Backend(format!("failed to sync {}: {}", tmp_path.display(), e))
            })?;
        }
        fs::rename(&tmp_path, path).map_err(|e| {
            StoreError::Backend(format!("failed to replace {}: {}", path.display(), e))
        })
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, service: &str) -> Option<PersistedTokenRecord> {
        let path = self.path_for(service).ok()?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!(service, path = %path.display(), error = %e, "no persisted token");
                return None;
            }
        };
        match serde_json::from_str::<PersistedTokenRecord>(&contents) {
            Ok(record) if record.is_empty() => None,
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    service,
                    path = %path.display(),
                    error = %e,
                    "ignoring unreadable persisted token"
                );
                None
            }
        }
    }

    fn save(&self, service: &str, record: &PersistedTokenRecord) -> StoreResult<()> {
        let path = self.path_for(service)?;
        let serialized =
            serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let _guard = self.write_lock.lock();
        self.persist(service, &path, &serialized)?;
        tracing::debug!(service, path = %path.display(), "persisted token record");
        Ok(())
    }
}
