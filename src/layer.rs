use image::RgbaImage;
use image::imageops;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Blend mode metadata carried by a layer.
///
/// The compositor currently treats every mode as `Normal`; the variants
/// exist so documents round-trip the metadata they were created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
}

impl FromStr for BlendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(BlendMode::Normal),
            "multiply" => Ok(BlendMode::Multiply),
            "screen" => Ok(BlendMode::Screen),
            "overlay" => Ok(BlendMode::Overlay),
            other => Err(format!("unknown blend mode: {}", other)),
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
        };
        write!(f, "{}", name)
    }
}

/// A single layer in a document: one RGBA pixel buffer plus metadata.
#[derive(Clone)]
pub struct Layer {
    /// Unique identifier for the layer
    pub id: Uuid,
    /// Display name of the layer
    pub name: String,
    /// Whether the layer is currently visible
    pub visible: bool,
    /// Layer opacity in [0, 1]
    pub opacity: f32,
    /// Blend mode metadata
    pub blend_mode: BlendMode,
    /// Locked layers reject edits at the tool level
    pub locked: bool,
    pixels: RgbaImage,
}

impl Layer {
    /// Creates a fully transparent layer of the given size.
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self::from_pixels(name, RgbaImage::new(width, height))
    }

    /// Creates a layer around an existing pixel buffer.
    pub fn from_pixels(name: &str, pixels: RgbaImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            locked: false,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// True when the layer has no pixel data to composite.
    pub fn is_blank(&self) -> bool {
        self.pixels.width() == 0 || self.pixels.height() == 0
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Mutable access to the pixel buffer.
    ///
    /// Whoever mutates through this must call `mark_dirty()` on the
    /// document's `CompositeCache` afterwards; the composite signature is
    /// content-blind and will not notice the change on its own.
    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    /// Replaces the entire pixel buffer, e.g. after an undo.
    pub fn set_pixels(&mut self, pixels: RgbaImage) {
        self.pixels = pixels;
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// A downscaled preview for layer panels.
    pub fn thumbnail(&self, width: u32, height: u32) -> RgbaImage {
        imageops::thumbnail(&self.pixels, width, height)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("visible", &self.visible)
            .field("opacity", &self.opacity)
            .field("blend_mode", &self.blend_mode)
            .field("locked", &self.locked)
            .field("size", &(self.pixels.width(), self.pixels.height()))
            .finish()
    }
}
