use image::RgbaImage;
use image::imageops;
use log::debug;

use crate::layer::{BlendMode, Layer};

/// Capability to invalidate a content-blind cache.
///
/// The composite signature covers layer metadata only, never pixel
/// content, so any code that mutates a layer's pixel buffer must call
/// `mark_dirty()` afterwards or the next `compose` will serve a stale
/// image. This trait makes that obligation a named, auditable contract.
pub trait Dirtyable {
    fn mark_dirty(&mut self);
}

/// Structural fingerprint of one visible layer: metadata and buffer
/// dimensions, not pixel content.
#[derive(Debug, Clone, PartialEq)]
struct LayerSignature {
    name: String,
    visible: bool,
    opacity_bits: u32,
    width: u32,
    height: u32,
}

impl LayerSignature {
    fn of(layer: &Layer) -> Self {
        Self {
            name: layer.name.clone(),
            visible: layer.visible,
            opacity_bits: layer.opacity.to_bits(),
            width: layer.width(),
            height: layer.height(),
        }
    }
}

/// Memoized merge of a document's visible layer stack.
///
/// A cached composite is served only while the cache is clean and the
/// structural signature of the current stack matches the cached one.
/// Structural changes (visibility, opacity, order, resize) are caught by
/// the signature; pixel changes require `mark_dirty()`.
pub struct CompositeCache {
    cached: Option<RgbaImage>,
    signature: Vec<LayerSignature>,
    dirty: bool,
}

impl Default for CompositeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeCache {
    /// Starts dirty: the first `compose` always computes.
    pub fn new() -> Self {
        Self {
            cached: None,
            signature: Vec::new(),
            dirty: true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Merges the visible layers bottom-up into one displayable image.
    ///
    /// Returns `None` when no layer is visible or a visible layer has no
    /// pixel data. Layers with zero opacity are skipped; opacity below one
    /// scales the layer's alpha channel before compositing. Blend modes
    /// other than normal currently composite as normal.
    pub fn compose(&mut self, layers: &[Layer]) -> Option<&RgbaImage> {
        let visible: Vec<&Layer> = layers.iter().filter(|l| l.visible).collect();
        if visible.is_empty() || visible.iter().any(|l| l.is_blank()) {
            return None;
        }

        let signature: Vec<LayerSignature> = visible.iter().map(|l| LayerSignature::of(l)).collect();
        if !self.dirty && self.cached.is_some() && self.signature == signature {
            return self.cached.as_ref();
        }

        let mut composite = visible[0].pixels().clone();
        for layer in &visible[1..] {
            if layer.opacity > 0.0 {
                blend_onto(&mut composite, layer);
            }
        }

        debug!("composite recomputed ({} visible layers)", visible.len());
        self.signature = signature;
        self.cached = Some(composite);
        self.dirty = false;
        self.cached.as_ref()
    }
}

impl Dirtyable for CompositeCache {
    /// Unconditionally invalidates the cache and drops the cached image.
    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.cached = None;
        self.signature.clear();
    }
}

/// Source-over composite of `layer` onto `base` at the origin.
fn blend_onto(base: &mut RgbaImage, layer: &Layer) {
    if layer.opacity >= 1.0 && layer.blend_mode == BlendMode::Normal {
        imageops::overlay(base, layer.pixels(), 0, 0);
        return;
    }

    // Scale the alpha channel by the layer opacity, then composite.
    let mut overlay = layer.pixels().clone();
    for pixel in overlay.pixels_mut() {
        pixel.0[3] = (f32::from(pixel.0[3]) * layer.opacity).round() as u8;
    }
    imageops::overlay(base, &overlay, 0, 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid_layer(name: &str, value: [u8; 4]) -> Layer {
        Layer::from_pixels(name, RgbaImage::from_pixel(4, 4, Rgba(value)))
    }

    #[test]
    fn compose_empty_stack_is_none() {
        let mut cache = CompositeCache::new();
        assert!(cache.compose(&[]).is_none());
    }

    #[test]
    fn compose_all_hidden_is_none() {
        let mut cache = CompositeCache::new();
        let mut layer = solid_layer("L", [255, 0, 0, 255]);
        layer.visible = false;
        assert!(cache.compose(&[layer]).is_none());
    }

    #[test]
    fn compose_blank_visible_layer_is_none() {
        let mut cache = CompositeCache::new();
        let layers = vec![
            solid_layer("L", [255, 0, 0, 255]),
            Layer::new("Empty", 0, 0),
        ];
        assert!(cache.compose(&layers).is_none());
    }

    #[test]
    fn single_layer_composes_to_itself() {
        let mut cache = CompositeCache::new();
        let layer = solid_layer("L", [10, 20, 30, 255]);
        let composite = cache.compose(std::slice::from_ref(&layer)).unwrap();
        assert_eq!(composite, layer.pixels());
    }

    #[test]
    fn structural_change_invalidates_without_mark_dirty() {
        let mut cache = CompositeCache::new();
        let mut layers = vec![
            solid_layer("Base", [0, 0, 255, 255]),
            solid_layer("Top", [255, 0, 0, 255]),
        ];
        let first = cache.compose(&layers).unwrap().clone();
        assert_eq!(first.get_pixel(0, 0).0, [255, 0, 0, 255]);

        // Hiding the top layer changes the signature; no mark_dirty needed.
        layers[1].visible = false;
        let second = cache.compose(&layers).unwrap();
        assert_eq!(second.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn zero_opacity_layer_is_skipped() {
        let mut cache = CompositeCache::new();
        let mut layers = vec![
            solid_layer("Base", [0, 0, 255, 255]),
            solid_layer("Top", [255, 0, 0, 255]),
        ];
        layers[1].set_opacity(0.0);
        let composite = cache.compose(&layers).unwrap();
        assert_eq!(composite.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }
}
