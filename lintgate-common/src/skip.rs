//! Per-directory opt-out flags.
//!
//! The registry is one JSON object mapping a directory to the check types
//! skipped there. It is loaded lazily on first access and cached as an
//! immutable snapshot. Readers clone the current snapshot `Arc` under a
//! shared lock and never wait on a write in progress; a writer builds and
//! persists the new map first and only then swaps the snapshot, so a failed
//! persist leaves the cache untouched.

use crate::errors::RegistryError;
use crate::fsutil::{atomic_write, with_exclusive_lock};
use crate::paths::normalize_dir;
use crate::types::{SkipEntry, SkipType};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

/// Directory → skipped check types.
pub type SkipMap = BTreeMap<String, BTreeSet<SkipType>>;

/// Storage for the skip registry.
pub trait RegistryStore: Send + Sync {
    /// Read the persisted map. A missing store is an empty map.
    fn load(&self) -> Result<SkipMap, RegistryError>;

    /// Re-read the persisted map under exclusive access, apply `mutate`,
    /// persist the result and return it.
    fn update(&self, mutate: &mut dyn FnMut(&mut SkipMap)) -> Result<SkipMap, RegistryError>;
}

/// The registry as a single JSON file, guarded by a sidecar `.lock` file for
/// cross-process writers.
#[derive(Debug, Clone)]
pub struct JsonFileRegistryStore {
    path: PathBuf,
}

impl JsonFileRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }
}

impl RegistryStore for JsonFileRegistryStore {
    fn load(&self) -> Result<SkipMap, RegistryError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SkipMap::new()),
            Err(e) => return Err(RegistryError::io(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(SkipMap::new());
        }
        serde_json::from_str(&content).map_err(|source| RegistryError::Corrupted {
            path: self.path.clone(),
            source,
        })
    }

    fn update(&self, mutate: &mut dyn FnMut(&mut SkipMap)) -> Result<SkipMap, RegistryError> {
        let lock_path = self.lock_path();
        with_exclusive_lock(&lock_path, || -> Result<SkipMap, RegistryError> {
            let mut map = self.load()?;
            mutate(&mut map);
            let json = serde_json::to_vec_pretty(&map).map_err(RegistryError::Encode)?;
            atomic_write(&self.path, &json).map_err(|e| RegistryError::io(&self.path, e))?;
            Ok(map)
        })
        .map_err(|e| RegistryError::io(&lock_path, e))?
    }
}

/// Thread-safe, lazily loaded skip registry.
pub struct SkipRegistry {
    store: Arc<dyn RegistryStore>,
    snapshot: RwLock<Option<Arc<SkipMap>>>,
    writer: Mutex<()>,
}

impl SkipRegistry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Skip `skip_type` checks in `dir`.
    pub fn add_skip(&self, dir: &Path, skip_type: SkipType) -> Result<(), RegistryError> {
        let key = normalize_dir(dir);
        self.mutate(|map| {
            map.entry(key.clone()).or_default().insert(skip_type);
        })?;
        debug!(dir = %key, %skip_type, "Skip added");
        Ok(())
    }

    /// Stop skipping `skip_type` checks in `dir`. The entry disappears once
    /// no types remain.
    pub fn remove_skip(&self, dir: &Path, skip_type: SkipType) -> Result<(), RegistryError> {
        let key = normalize_dir(dir);
        self.mutate(|map| {
            if let Some(types) = map.get_mut(&key) {
                types.remove(&skip_type);
                if types.is_empty() {
                    map.remove(&key);
                }
            }
        })?;
        debug!(dir = %key, %skip_type, "Skip removed");
        Ok(())
    }

    /// Remove every skip for `dir`.
    pub fn clear(&self, dir: &Path) -> Result<(), RegistryError> {
        let key = normalize_dir(dir);
        self.mutate(|map| {
            map.remove(&key);
        })?;
        debug!(dir = %key, "Skips cleared");
        Ok(())
    }

    pub fn get_skip_types(&self, dir: &Path) -> Result<BTreeSet<SkipType>, RegistryError> {
        let key = normalize_dir(dir);
        Ok(self.snapshot()?.get(&key).cloned().unwrap_or_default())
    }

    pub fn is_skipped(&self, dir: &Path, skip_type: SkipType) -> Result<bool, RegistryError> {
        Ok(self.get_skip_types(dir)?.contains(&skip_type))
    }

    /// All entries, ordered by path.
    pub fn list_all(&self) -> Result<Vec<SkipEntry>, RegistryError> {
        Ok(self
            .snapshot()?
            .iter()
            .map(|(path, types)| SkipEntry {
                path: path.clone(),
                types: types.clone(),
            })
            .collect())
    }

    fn snapshot(&self) -> Result<Arc<SkipMap>, RegistryError> {
        if let Some(map) = self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(map.clone());
        }

        let loaded = Arc::new(self.store.load()?);
        let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.get_or_insert(loaded).clone())
    }

    fn mutate(&self, mut mutate: impl FnMut(&mut SkipMap)) -> Result<(), RegistryError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let updated = Arc::new(self.store.update(&mut mutate)?);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(updated);
        Ok(())
    }
}
