use fontdue::{Font, FontSettings, Metrics};
use lyrisync_ports::font::{FontError, FontPort, GlyphSource, TextBounds};
use lyrisync_ports::types::{Canvas, Rgb};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Character used to check that a face can actually rasterize.
const CHECK_CHAR: char = 'A';

#[derive(Default)]
pub struct FontdueFontPort;

impl FontdueFontPort {
    pub fn new() -> Self {
        Self
    }
}

impl FontPort for FontdueFontPort {
    fn load(&self, path: &Path, check_px: u32) -> Result<Box<dyn GlyphSource>, FontError> {
        let bytes = fs::read(path)
            .map_err(|e| FontError::Io(format!("{}: {e}", path.display())))?;
        let glyphs = FontdueGlyphs::from_bytes(bytes)?;
        glyphs.check_raster(check_px)?;
        tracing::debug!(
            path = %path.display(),
            glyphs = glyphs.font.glyph_count(),
            "font loaded"
        );
        Ok(Box::new(glyphs))
    }
}

struct CachedGlyph {
    metrics: Metrics,
    bitmap: Vec<u8>,
}

/// One face plus the bitmaps and line metrics rasterized so far.
pub struct FontdueGlyphs {
    font: Font,
    glyphs: HashMap<(char, u32), CachedGlyph>,
    ascents: HashMap<u32, f32>,
}

impl FontdueGlyphs {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FontError> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| FontError::Parse(e.to_string()))?;
        Ok(Self {
            font,
            glyphs: HashMap::new(),
            ascents: HashMap::new(),
        })
    }

    fn check_raster(&self, px: u32) -> Result<(), FontError> {
        if self.font.glyph_count() == 0 {
            return Err(FontError::Parse("face has no glyphs".to_string()));
        }
        if self.font.horizontal_line_metrics(px as f32).is_none() {
            return Err(FontError::Parse(
                "face has no horizontal line metrics".to_string(),
            ));
        }
        let (metrics, bitmap) = self.font.rasterize(CHECK_CHAR, px as f32);
        if bitmap.len() != metrics.width * metrics.height {
            return Err(FontError::Parse(format!(
                "face cannot rasterize at {px}px"
            )));
        }
        Ok(())
    }

    fn ascent(&mut self, px: u32) -> f32 {
        let font = &self.font;
        *self.ascents.entry(px).or_insert_with(|| {
            font.horizontal_line_metrics(px as f32)
                .map(|line| line.ascent)
                .unwrap_or(px as f32)
        })
    }

    fn glyph(&mut self, ch: char, px: u32) -> &CachedGlyph {
        let font = &self.font;
        self.glyphs.entry((ch, px)).or_insert_with(|| {
            let (metrics, bitmap) = font.rasterize(ch, px as f32);
            CachedGlyph { metrics, bitmap }
        })
    }
}

impl GlyphSource for FontdueGlyphs {
    fn text_width(&mut self, text: &str, px: u32) -> f32 {
        let advance: f32 = text
            .chars()
            .map(|ch| self.glyph(ch, px).metrics.advance_width)
            .sum();
        advance.trunc()
    }

    fn text_bounds(&mut self, text: &str, px: u32) -> TextBounds {
        let ascent = self.ascent(px);
        let mut ink: Option<(f32, f32)> = None;
        for ch in text.chars() {
            let metrics = self.glyph(ch, px).metrics;
            if metrics.width == 0 || metrics.height == 0 {
                continue;
            }
            let top = ascent - (metrics.ymin as f32 + metrics.height as f32);
            let bottom = ascent - metrics.ymin as f32;
            ink = Some(match ink {
                Some((t, b)) => (t.min(top), b.max(bottom)),
                None => (top, bottom),
            });
        }
        match ink {
            Some((top, bottom)) => TextBounds {
                top,
                height: bottom - top,
                ascent,
            },
            None => TextBounds {
                top: 0.0,
                height: 0.0,
                ascent,
            },
        }
    }

    fn draw_glyph(&mut self, canvas: &mut Canvas, x: f32, y: f32, ch: char, px: u32, color: Rgb) {
        let ascent = self.ascent(px);
        let glyph = self.glyph(ch, px);
        let metrics = glyph.metrics;
        if metrics.width == 0 || metrics.height == 0 {
            return;
        }
        let left = x + metrics.xmin as f32;
        let top = y + ascent - (metrics.ymin as f32 + metrics.height as f32);
        canvas.blend_mask(
            left.round() as i32,
            top.round() as i32,
            metrics.width,
            metrics.height,
            &glyph.bitmap,
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn system_font() -> Option<PathBuf> {
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/Library/Fonts/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ]
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = FontdueFontPort::new()
            .load(Path::new("/nonexistent/lyrisync.ttf"), 10)
            .err()
            .expect("load should fail");
        assert!(matches!(err, FontError::Io(_)));
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let err = FontdueGlyphs::from_bytes(b"definitely not a font".to_vec())
            .err()
            .expect("parse should fail");
        assert!(matches!(err, FontError::Parse(_)));
    }

    #[test]
    fn system_font_measures_and_draws() {
        let Some(path) = system_font() else {
            eprintln!("no system font found, skipping");
            return;
        };
        let mut glyphs = FontdueFontPort::new().load(&path, 10).expect("font loads");

        let one = glyphs.text_width("A", 40);
        let two = glyphs.text_width("AA", 40);
        assert!(one > 0.0);
        assert_eq!(one.fract(), 0.0);
        assert!(two >= one * 2.0 - 1.0);

        let bounds = glyphs.text_bounds("A", 40);
        assert!(bounds.height > 0.0);
        assert!(bounds.ascent > 0.0);
        assert!(glyphs.text_bounds(" ", 40).height == 0.0);

        let mut canvas = Canvas::new(64, 64, Rgb::BLACK);
        glyphs.draw_glyph(&mut canvas, 10.0, 5.0, 'A', 40, Rgb::WHITE);
        let lit = canvas
            .as_bytes()
            .chunks_exact(4)
            .filter(|px| px[0] > 0)
            .count();
        assert!(lit > 0);
    }
}
