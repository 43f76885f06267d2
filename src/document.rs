use log::info;

use crate::composite::CompositeCache;
use crate::config::HistoryConfig;
use crate::error::StorageError;
use crate::history::HistoryManager;
use crate::layer::Layer;

/// One open image: an ordered layer stack plus its own edit history and
/// composite cache.
///
/// Layers are ordered bottom-up; `layers()[0]` is the bottom of the stack.
pub struct Document {
    pub name: String,
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    active_layer: usize,
    history: HistoryManager,
    composite: CompositeCache,
}

impl Document {
    /// Creates a document with a single transparent background layer.
    ///
    /// Fails only when the history manager's private snapshot directory
    /// cannot be created.
    pub fn new(name: &str, width: u32, height: u32, config: &HistoryConfig) -> Result<Self, StorageError> {
        let history = HistoryManager::new(config)?;
        info!("new document '{}' ({}x{})", name, width, height);
        Ok(Self {
            name: name.to_string(),
            width,
            height,
            layers: vec![Layer::new("Background", width, height)],
            active_layer: 0,
            history,
            composite: CompositeCache::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Appends a layer on top of the stack and makes it active.
    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
        self.active_layer = self.layers.len() - 1;
    }

    /// Removes a layer; the last remaining layer cannot be removed.
    pub fn remove_layer(&mut self, index: usize) -> Option<Layer> {
        if self.layers.len() <= 1 || index >= self.layers.len() {
            return None;
        }
        let removed = self.layers.remove(index);
        if self.active_layer >= self.layers.len() {
            self.active_layer = self.layers.len() - 1;
        }
        Some(removed)
    }

    pub fn active_layer_index(&self) -> usize {
        self.active_layer
    }

    pub fn set_active_layer(&mut self, index: usize) -> bool {
        if index < self.layers.len() {
            self.active_layer = index;
            true
        } else {
            false
        }
    }

    pub fn active_layer(&self) -> &Layer {
        &self.layers[self.active_layer]
    }

    /// Mutable access to the active layer. Pixel mutations through this
    /// must be followed by `composite_mut().mark_dirty()`.
    pub fn active_layer_mut(&mut self) -> &mut Layer {
        &mut self.layers[self.active_layer]
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryManager {
        &mut self.history
    }

    pub fn composite_mut(&mut self) -> &mut CompositeCache {
        &mut self.composite
    }

    /// Composites the visible layer stack into the displayable image.
    pub fn compose(&mut self) -> Option<&image::RgbaImage> {
        self.composite.compose(&self.layers)
    }

    /// Releases the document's history: empties both stacks and removes
    /// every snapshot. Dropping the document removes the snapshot
    /// directory itself regardless.
    pub fn close(&mut self) {
        self.history.clear();
        info!("document '{}' closed", self.name);
    }
}
