use image::RgbaImage;
use log::{debug, error, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

use crate::error::StorageError;

/// Default bound on eagerly persisted snapshots.
pub const DEFAULT_PERSIST_CAP: usize = 8;

/// Allowed range for the persist cap.
pub const PERSIST_CAP_RANGE: std::ops::RangeInclusive<usize> = 3..=20;

/// Opaque identifier for a stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hybrid memory/disk cache of compressed image snapshots.
///
/// Every snapshot lives in the memory cache until evicted. The first
/// `persist_cap` snapshots ever stored are additionally written to a
/// private temporary directory as PNG, one file per snapshot, so they can
/// be reloaded after eviction. Snapshots stored after that are memory-only:
/// once evicted they are gone, and `get` reports the miss. This is a
/// deliberate, tested contract, not an oversight.
///
/// All I/O failures are caught here, logged, and surfaced as `false`/`None`;
/// nothing past construction returns a `Result`.
pub struct SnapshotStore {
    memory: HashMap<SnapshotId, RgbaImage>,
    paths: HashMap<SnapshotId, PathBuf>,
    /// Count of snapshots ever persisted; never decremented.
    persisted: usize,
    persist_cap: usize,
    temp_dir: TempDir,
}

impl SnapshotStore {
    /// Creates a store with its own private temporary directory.
    ///
    /// The directory and everything in it are removed when the store is
    /// dropped, on all exit paths.
    pub fn new(persist_cap: usize) -> Result<Self, StorageError> {
        let temp_dir = tempfile::Builder::new()
            .prefix("imageforge_")
            .tempdir()
            .map_err(StorageError::TempDir)?;
        debug!("snapshot store at {}", temp_dir.path().display());
        Ok(Self {
            memory: HashMap::new(),
            paths: HashMap::new(),
            persisted: 0,
            persist_cap: clamp_persist_cap(persist_cap),
            temp_dir,
        })
    }

    /// Directory holding the persisted snapshot files.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Inserts or overwrites the snapshot for `id`.
    ///
    /// While fewer than `persist_cap` snapshots have ever been persisted,
    /// the image is also written to disk synchronously. Returns `false`
    /// only when that write fails; the memory entry is kept either way.
    pub fn put(&mut self, id: SnapshotId, image: RgbaImage) -> bool {
        let mut ok = true;
        if self.persisted < self.persist_cap {
            if let Err(err) = self.persist(id, &image) {
                error!("snapshot {}: {}", id, err);
                ok = false;
            }
        }
        self.memory.insert(id, image);
        ok
    }

    fn persist(&mut self, id: SnapshotId, image: &RgbaImage) -> Result<(), StorageError> {
        let path = self.temp_dir.path().join(format!("{}.png", id));
        image.save(&path).map_err(StorageError::Write)?;
        self.paths.insert(id, path);
        self.persisted += 1;
        Ok(())
    }

    /// Looks up a snapshot, reloading from disk if it was evicted.
    ///
    /// Returns `None` when the snapshot has neither a memory entry nor a
    /// file: an unrecoverable loss, possible only for snapshots stored
    /// after the persist cap was reached.
    pub fn get(&mut self, id: SnapshotId) -> Option<RgbaImage> {
        if let Some(image) = self.memory.get(&id) {
            return Some(image.clone());
        }
        if let Some(path) = self.paths.get(&id) {
            match image::open(path).map_err(StorageError::Read) {
                Ok(loaded) => {
                    let image = loaded.to_rgba8();
                    debug!("snapshot {} reloaded from disk", id);
                    // Repair-on-read: repopulate the memory entry.
                    self.memory.insert(id, image.clone());
                    return Some(image);
                }
                Err(err) => {
                    error!("snapshot {}: {}", id, err);
                    return None;
                }
            }
        }
        warn!("snapshot {} lost: no memory entry and no file", id);
        None
    }

    /// Drops every memory entry whose id is not in `protected`.
    ///
    /// Disk files are untouched, so persisted snapshots stay recoverable.
    pub fn evict_unprotected(&mut self, protected: &HashSet<SnapshotId>) {
        let before = self.memory.len();
        self.memory.retain(|id, _| protected.contains(id));
        let evicted = before - self.memory.len();
        if evicted > 0 {
            debug!("evicted {} snapshots, {} resident", evicted, self.memory.len());
        }
    }

    /// Removes the snapshot from memory and disk.
    ///
    /// Called when an id is permanently dropped from every stack. Returns
    /// `false` if a file existed but could not be removed.
    pub fn delete(&mut self, id: SnapshotId) -> bool {
        self.memory.remove(&id);
        if let Some(path) = self.paths.remove(&id) {
            if let Err(err) = fs::remove_file(&path).map_err(StorageError::Remove) {
                warn!("snapshot {}: {}", id, err);
                return false;
            }
        }
        true
    }

    /// Removes every memory entry and every file in the store's directory.
    ///
    /// The persist counter resets, so a cleared store persists eagerly
    /// again.
    pub fn clear_all(&mut self) {
        self.memory.clear();
        self.paths.clear();
        self.persisted = 0;
        match fs::read_dir(self.temp_dir.path()) {
            Ok(entries) => {
                for entry in entries.filter_map(|e| e.ok()) {
                    if let Err(err) = fs::remove_file(entry.path()) {
                        warn!("failed to remove {}: {}", entry.path().display(), err);
                    }
                }
            }
            Err(err) => warn!("failed to list snapshot directory: {}", err),
        }
        debug!("snapshot store cleared");
    }

    /// Adjusts the persist cap, clamped to [3, 20].
    pub fn set_persist_cap(&mut self, cap: usize) {
        self.persist_cap = clamp_persist_cap(cap);
        debug!("persist cap set to {}", self.persist_cap);
    }

    pub fn persist_cap(&self) -> usize {
        self.persist_cap
    }

    /// Number of snapshots currently resident in memory.
    pub fn resident_count(&self) -> usize {
        self.memory.len()
    }

    /// Number of snapshots ever written to disk.
    pub fn persisted_count(&self) -> usize {
        self.persisted
    }

    pub fn has_resident(&self, id: SnapshotId) -> bool {
        self.memory.contains_key(&id)
    }

    pub fn has_file(&self, id: SnapshotId) -> bool {
        self.paths.contains_key(&id)
    }

    /// Approximate bytes held by resident snapshots (RGBA, 4 bytes/pixel).
    pub fn estimated_memory_bytes(&self) -> u64 {
        self.memory
            .values()
            .map(|img| u64::from(img.width()) * u64::from(img.height()) * 4)
            .sum()
    }
}

fn clamp_persist_cap(cap: usize) -> usize {
    cap.clamp(*PERSIST_CAP_RANGE.start(), *PERSIST_CAP_RANGE.end())
}
