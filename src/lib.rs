#![warn(clippy::all, rust_2018_idioms)]

pub mod composite;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod history;
pub mod layer;
pub mod snapshot;
pub mod util;

pub use composite::{CompositeCache, Dirtyable};
pub use config::{EditorConfig, HistoryConfig};
pub use document::Document;
pub use error::StorageError;
pub use geometry::Rect;
pub use history::{HistoryInfo, HistoryManager, PerformanceStats, SnapshotKind};
pub use layer::{BlendMode, Layer};
pub use snapshot::{SnapshotId, SnapshotStore};
