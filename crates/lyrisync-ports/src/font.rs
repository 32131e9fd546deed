use crate::types::{Canvas, Rgb};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum FontError {
    #[error("io error: {0}")]
    Io(String),
    #[error("font parse error: {0}")]
    Parse(String),
}

/// Vertical extent of a text run, measured from the draw origin (the top of the
/// ascent line) with y growing downwards.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextBounds {
    /// Offset from the origin to the top of the ink box.
    pub top: f32,
    /// Height of the ink box.
    pub height: f32,
    /// Distance from the origin to the baseline.
    pub ascent: f32,
}

/// A loaded font face able to measure and draw single glyph units.
///
/// Thread model: owned by one render run, never shared.
pub trait GlyphSource: Send {
    /// Advance width of `text` at `px`, in whole pixels.
    fn text_width(&mut self, text: &str, px: u32) -> f32;

    fn text_bounds(&mut self, text: &str, px: u32) -> TextBounds;

    /// Draws `ch` with its origin (top of the ascent line) at (x, y).
    fn draw_glyph(&mut self, canvas: &mut Canvas, x: f32, y: f32, ch: char, px: u32, color: Rgb);
}

pub trait FontPort: Send + Sync {
    /// Loads the face at `path` and verifies it rasterizes at `check_px`.
    fn load(&self, path: &Path, check_px: u32) -> Result<Box<dyn GlyphSource>, FontError>;
}
