use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub type Tick = i64; // musical time, monotonic within a track
pub type Seconds = f64;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("invalid color '{0}', expected #RRGGBB")]
pub struct ParseColorError(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);

    pub fn rgba(self) -> [u8; 4] {
        [self.0[0], self.0[1], self.0[2], 255]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let hex = raw.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ParseColorError(raw.to_string()));
        }
        let mut out = [0u8; 3];
        for (idx, channel) in out.iter_mut().enumerate() {
            *channel = u8::from_str_radix(&hex[idx * 2..idx * 2 + 2], 16)
                .map_err(|_| ParseColorError(raw.to_string()))?;
        }
        Ok(Rgb(out))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// RGBA8 frame buffer, row-major, always opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb) -> Self {
        let mut canvas = Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        };
        canvas.fill(background);
        canvas
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn fill(&mut self, color: Rgb) {
        let px = color.rgba();
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.data[idx..idx + 4]);
        Some(out)
    }

    /// Blends an 8-bit coverage mask at (x, y); pixels outside the canvas are skipped.
    pub fn blend_mask(
        &mut self,
        x: i32,
        y: i32,
        mask_width: usize,
        mask_height: usize,
        mask: &[u8],
        color: Rgb,
    ) {
        for row in 0..mask_height {
            let py = y + row as i32;
            if py < 0 || py >= self.height as i32 {
                continue;
            }
            for col in 0..mask_width {
                let px = x + col as i32;
                if px < 0 || px >= self.width as i32 {
                    continue;
                }
                let Some(&coverage) = mask.get(row * mask_width + col) else {
                    continue;
                };
                if coverage == 0 {
                    continue;
                }
                let idx = ((py as u32 * self.width + px as u32) * 4) as usize;
                self.blend_pixel(idx, color, coverage);
            }
        }
    }

    fn blend_pixel(&mut self, idx: usize, color: Rgb, alpha: u8) {
        let alpha = u16::from(alpha);
        let inv_alpha = 255 - alpha;
        for channel in 0..3 {
            let dst = u16::from(self.data[idx + channel]);
            let src = u16::from(color.0[channel]);
            self.data[idx + channel] = ((src * alpha + dst * inv_alpha + 127) / 255) as u8;
        }
        self.data[idx + 3] = 255;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parses_with_and_without_hash() {
        assert_eq!("#FF8000".parse::<Rgb>(), Ok(Rgb([255, 128, 0])));
        assert_eq!("00ff00".parse::<Rgb>(), Ok(Rgb([0, 255, 0])));
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#GG0000".parse::<Rgb>().is_err());
        assert_eq!(Rgb([1, 2, 255]).to_string(), "#0102FF");
    }

    #[test]
    fn blend_mask_clips_to_canvas_and_blends_full_coverage() {
        let mut canvas = Canvas::new(4, 2, Rgb::BLACK);
        let mask = [255u8, 0, 255, 255];
        canvas.blend_mask(3, 0, 2, 2, &mask, Rgb::WHITE);

        assert_eq!(canvas.pixel(3, 0), Some([255, 255, 255, 255]));
        assert_eq!(canvas.pixel(3, 1), Some([255, 255, 255, 255]));
        assert_eq!(canvas.pixel(2, 0), Some([0, 0, 0, 255]));
        assert_eq!(canvas.as_bytes().len(), 4 * 2 * 4);
    }
}
