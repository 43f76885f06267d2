use image::{Rgba, RgbaImage};
use imageforge::{CompositeCache, Dirtyable, HistoryConfig, Document, Layer};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn solid_layer(name: &str, value: [u8; 4]) -> Layer {
    Layer::from_pixels(name, RgbaImage::from_pixel(8, 8, Rgba(value)))
}

#[test]
fn single_opaque_layer_composes_unchanged() {
    init_logs();
    let mut cache = CompositeCache::new();
    let layer = solid_layer("Background", [12, 34, 56, 255]);

    let composite = cache.compose(std::slice::from_ref(&layer)).unwrap();
    assert_eq!(composite, layer.pixels());
}

#[test]
fn pixel_mutation_without_mark_dirty_serves_stale_composite() {
    // The signature is content-blind: this is the documented contract, and
    // the stale read is the observable consequence of skipping mark_dirty.
    init_logs();
    let mut cache = CompositeCache::new();
    let mut layers = vec![solid_layer("Background", [0, 0, 255, 255])];

    let first = cache.compose(&layers).unwrap().clone();
    assert_eq!(first.get_pixel(0, 0).0, [0, 0, 255, 255]);

    // Mutate pixels directly; no structural change, no mark_dirty.
    layers[0].pixels_mut().put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    let stale = cache.compose(&layers).unwrap();
    assert_eq!(stale.get_pixel(0, 0).0, [0, 0, 255, 255]);

    // mark_dirty forces the next compose to recompute.
    cache.mark_dirty();
    let fresh = cache.compose(&layers).unwrap();
    assert_eq!(fresh.get_pixel(0, 0).0, [255, 0, 0, 255]);
}

#[test]
fn mark_dirty_recomputes_even_with_unchanged_signature() {
    init_logs();
    let mut cache = CompositeCache::new();
    let layers = vec![solid_layer("Background", [5, 5, 5, 255])];

    cache.compose(&layers).unwrap();
    assert!(!cache.is_dirty());

    cache.mark_dirty();
    assert!(cache.is_dirty());
    cache.compose(&layers).unwrap();
    assert!(!cache.is_dirty());
}

#[test]
fn opacity_scales_the_overlay_alpha() {
    init_logs();
    let mut cache = CompositeCache::new();
    let mut layers = vec![
        solid_layer("Base", [0, 0, 255, 255]),
        solid_layer("Top", [255, 0, 0, 255]),
    ];
    layers[1].set_opacity(0.5);

    let composite = cache.compose(&layers).unwrap();
    let pixel = composite.get_pixel(4, 4).0;
    // Roughly half red over blue; exact values depend on rounding.
    assert!((110..=145).contains(&pixel[0]), "red {}", pixel[0]);
    assert!((110..=145).contains(&pixel[2]), "blue {}", pixel[2]);
    assert_eq!(pixel[3], 255);
}

#[test]
fn fully_transparent_overlay_leaves_base_untouched() {
    init_logs();
    let mut cache = CompositeCache::new();
    let layers = vec![
        solid_layer("Base", [0, 0, 255, 255]),
        solid_layer("Top", [255, 0, 0, 0]),
    ];

    let composite = cache.compose(&layers).unwrap();
    assert_eq!(composite.get_pixel(0, 0).0, [0, 0, 255, 255]);
}

#[test]
fn document_edit_cycle() {
    // The full tool loop: snapshot, mutate, invalidate, compose, undo,
    // write back, compose again.
    init_logs();
    let mut doc = Document::new("scratch", 8, 8, &HistoryConfig::default()).unwrap();
    doc.active_layer_mut()
        .set_pixels(RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 255])));
    doc.composite_mut().mark_dirty();

    // Tool edit: snapshot the pre-edit state, then paint red.
    let before = doc.active_layer().pixels().clone();
    doc.history_mut().push(&before, "paint", None);
    doc.active_layer_mut()
        .set_pixels(RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255])));
    doc.composite_mut().mark_dirty();
    assert_eq!(doc.compose().unwrap().get_pixel(0, 0).0, [255, 0, 0, 255]);

    // Undo: the history hands back the replacement image, the caller
    // writes it into the layer and recomposes.
    let current = doc.active_layer().pixels().clone();
    let (restored, success, _) = doc.history_mut().undo(current);
    assert!(success);
    doc.active_layer_mut().set_pixels(restored);
    doc.composite_mut().mark_dirty();
    assert_eq!(doc.compose().unwrap().get_pixel(0, 0).0, [0, 255, 0, 255]);
}

#[test]
fn layer_reorder_changes_signature() {
    init_logs();
    let mut cache = CompositeCache::new();
    let mut layers = vec![
        solid_layer("A", [255, 0, 0, 255]),
        solid_layer("B", [0, 0, 255, 255]),
    ];

    let first = cache.compose(&layers).unwrap();
    assert_eq!(first.get_pixel(0, 0).0, [0, 0, 255, 255]);

    layers.swap(0, 1);
    let second = cache.compose(&layers).unwrap();
    assert_eq!(second.get_pixel(0, 0).0, [255, 0, 0, 255]);
}
