use image::RgbaImage;
use image::imageops;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;

use crate::config::HistoryConfig;
use crate::error::StorageError;
use crate::geometry::Rect;
use crate::snapshot::{SnapshotId, SnapshotStore};
use crate::util::time;

/// What a history entry's snapshot contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// The whole layer image. The bbox, when present, is only a repaint
    /// hint; the image is the authoritative result.
    Full { hint: Option<Rect> },
    /// Only the changed rectangle, pasted back at `bbox` on restore.
    Region { bbox: Rect },
}

/// One undoable step. Immutable once created.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    id: SnapshotId,
    action: String,
    timestamp: u64,
    kind: SnapshotKind,
}

impl HistoryEntry {
    fn new(id: SnapshotId, action: &str, kind: SnapshotKind) -> Self {
        Self {
            id,
            action: action.to_string(),
            timestamp: time::timestamp_secs(),
            kind,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }
}

/// History state summary for UI display.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryInfo {
    pub total_actions: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    /// Number of snapshots currently resident in memory.
    pub memory_usage: usize,
    pub last_action: Option<String>,
}

/// Point-in-time resource statistics.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    pub undo_depth: usize,
    pub redo_depth: usize,
    pub resident_snapshots: usize,
    pub estimated_memory_bytes: u64,
    pub region_capture_enabled: bool,
}

/// Undo/redo engine for one document, backed by a `SnapshotStore`.
///
/// Tools call `push` with the pre-edit image before mutating a layer;
/// `undo`/`redo` hand back a replacement image plus a repaint hint, and the
/// caller writes it into the layer and recomposes.
///
/// No failure escapes as a fault: storage problems are logged and reported
/// through the boolean/optional results, and the worst outcome of a failed
/// undo or redo is "reports failure, image unchanged".
pub struct HistoryManager {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_history: usize,
    capture_regions: bool,
    store: SnapshotStore,
}

impl HistoryManager {
    /// Creates a manager with its own private snapshot directory.
    pub fn new(config: &HistoryConfig) -> Result<Self, StorageError> {
        let store = SnapshotStore::new(config.memory_cache_size)?;
        info!(
            "history manager ready (max: {}, cache: {})",
            config.max_history,
            store.persist_cap()
        );
        Ok(Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history: config.max_history,
            capture_regions: config.capture_regions,
            store,
        })
    }

    /// Records `image` as the state to restore when this edit is undone.
    ///
    /// With a bbox covering less than half the canvas (and region capture
    /// on), only that rectangle is snapshotted; otherwise the full image is
    /// stored and the bbox kept as a repaint hint. Clears the redo stack,
    /// then enforces the `max_history` cap oldest-first.
    ///
    /// Returns `false` only when the snapshot could not be written to disk;
    /// the entry still lands on the undo stack in that case.
    pub fn push(&mut self, image: &RgbaImage, action: &str, bbox: Option<Rect>) -> bool {
        let (snapshot, kind) = match bbox {
            Some(b) if self.capture_regions && region_worth_saving(b, image) => {
                let region = imageops::crop_imm(image, b.x0, b.y0, b.width(), b.height()).to_image();
                debug!("region snapshot: {} ({}x{})", action, b.width(), b.height());
                (region, SnapshotKind::Region { bbox: b })
            }
            hint => (image.clone(), SnapshotKind::Full { hint }),
        };

        let id = SnapshotId::new();
        let stored = self.store.put(id, snapshot);

        self.clear_redo();
        self.undo_stack.push(HistoryEntry::new(id, action, kind));
        self.enforce_limit();
        self.optimize_memory();

        debug!(
            "history saved: {} (depth: {}, resident: {})",
            action,
            self.undo_stack.len(),
            self.store.resident_count()
        );
        stored
    }

    /// Explicit region entry point for brush strokes; falls back to a full
    /// snapshot when the bbox is too large to be worth cropping.
    pub fn push_region(&mut self, image: &RgbaImage, bbox: Rect, action: &str) -> bool {
        self.push(image, action, Some(bbox))
    }

    /// Steps back one entry.
    ///
    /// The returned tuple is the replacement image, whether the undo
    /// succeeded, and an optional repaint hint. On an empty stack or an
    /// unrecoverable snapshot, `current` comes back unchanged with
    /// `success == false`.
    pub fn undo(&mut self, current: RgbaImage) -> (RgbaImage, bool, Option<Rect>) {
        let Some(entry) = self.undo_stack.pop() else {
            return (current, false, None);
        };

        // Resolve before archiving so a miss leaves the redo stack alone.
        let Some(snapshot) = self.store.get(entry.id) else {
            warn!("undo failed: snapshot for '{}' is unrecoverable", entry.action);
            self.store.delete(entry.id);
            self.optimize_memory();
            return (current, false, None);
        };

        let checkpoint = SnapshotId::new();
        self.store.put(checkpoint, current.clone());
        self.redo_stack.push(HistoryEntry::new(
            checkpoint,
            &entry.action,
            SnapshotKind::Full { hint: None },
        ));

        let (image, bbox) = restore(entry.kind, snapshot, current);
        self.store.delete(entry.id);
        self.optimize_memory();
        info!("undo: {}", entry.action);
        (image, true, bbox)
    }

    /// Steps forward one entry; symmetric to `undo`.
    pub fn redo(&mut self, current: RgbaImage) -> (RgbaImage, bool, Option<Rect>) {
        let Some(entry) = self.redo_stack.pop() else {
            return (current, false, None);
        };

        let Some(snapshot) = self.store.get(entry.id) else {
            warn!("redo failed: snapshot for '{}' is unrecoverable", entry.action);
            self.store.delete(entry.id);
            self.optimize_memory();
            return (current, false, None);
        };

        let checkpoint = SnapshotId::new();
        self.store.put(checkpoint, current.clone());
        self.undo_stack.push(HistoryEntry::new(
            checkpoint,
            &entry.action,
            SnapshotKind::Full { hint: None },
        ));
        // The cap is unconditional, so it applies to redo archives too.
        self.enforce_limit();

        let (image, bbox) = restore(entry.kind, snapshot, current);
        self.store.delete(entry.id);
        self.optimize_memory();
        info!("redo: {}", entry.action);
        (image, true, bbox)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Read-only view of the undo stack, oldest first, for history panels.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.undo_stack
    }

    /// Summary for UI display.
    pub fn info(&self) -> HistoryInfo {
        HistoryInfo {
            total_actions: self.undo_stack.len(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            memory_usage: self.store.resident_count(),
            last_action: self.undo_stack.last().map(|e| e.action.clone()),
        }
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        PerformanceStats {
            undo_depth: self.undo_stack.len(),
            redo_depth: self.redo_stack.len(),
            resident_snapshots: self.store.resident_count(),
            estimated_memory_bytes: self.store.estimated_memory_bytes(),
            region_capture_enabled: self.capture_regions,
        }
    }

    /// Turns region capture on or off; pushes made while off always store
    /// full snapshots.
    pub fn set_capture_regions(&mut self, enable: bool) {
        self.capture_regions = enable;
        debug!("region capture: {}", if enable { "enabled" } else { "disabled" });
    }

    /// Adjusts the snapshot cache size, clamped to [3, 20].
    pub fn set_memory_cache_size(&mut self, size: usize) {
        self.store.set_persist_cap(size);
        self.optimize_memory();
    }

    /// Empties both stacks and removes every snapshot, memory and disk.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.store.clear_all();
        info!("history cleared");
    }

    /// Deletes redo snapshots that no undo entry still references, then
    /// empties the redo stack.
    fn clear_redo(&mut self) {
        if self.redo_stack.is_empty() {
            return;
        }
        let undo_ids: HashSet<SnapshotId> = self.undo_stack.iter().map(|e| e.id).collect();
        for entry in self.redo_stack.drain(..) {
            if !undo_ids.contains(&entry.id) {
                self.store.delete(entry.id);
            }
        }
    }

    /// Evicts the oldest undo entries until the stack is within the cap.
    fn enforce_limit(&mut self) {
        while self.undo_stack.len() > self.max_history {
            let old = self.undo_stack.remove(0);
            self.store.delete(old.id);
            debug!("history cap: dropped '{}'", old.action);
        }
    }

    /// Evicts memory copies outside the protected window: the last K undo
    /// entries and the last K/2 redo entries, K being the cache size. This
    /// bounds steady-state memory to about 1.5*K resident snapshots.
    fn optimize_memory(&mut self) {
        let k = self.store.persist_cap();
        let mut protected: HashSet<SnapshotId> = HashSet::new();
        for entry in self.undo_stack.iter().rev().take(k) {
            protected.insert(entry.id);
        }
        for entry in self.redo_stack.iter().rev().take(k / 2) {
            protected.insert(entry.id);
        }
        self.store.evict_unprotected(&protected);
    }
}

/// Region snapshots only pay off below half the canvas area.
fn region_worth_saving(bbox: Rect, image: &RgbaImage) -> bool {
    let canvas_area = u64::from(image.width()) * u64::from(image.height());
    bbox.area() * 2 < canvas_area
}

/// Applies a resolved snapshot to the current image.
fn restore(kind: SnapshotKind, snapshot: RgbaImage, mut current: RgbaImage) -> (RgbaImage, Option<Rect>) {
    match kind {
        SnapshotKind::Region { bbox } => {
            imageops::replace(&mut current, &snapshot, i64::from(bbox.x0), i64::from(bbox.y0));
            (current, Some(bbox))
        }
        SnapshotKind::Full { hint } => (snapshot, hint),
    }
}
