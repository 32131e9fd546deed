use crate::scheduler::BoundSegment;
use lyrisync_ports::font::{GlyphSource, TextBounds};
use lyrisync_ports::settings::{HorizontalAlign, RenderSettings, VerticalAlign};
use lyrisync_ports::types::{Seconds, Tick};
use std::collections::HashMap;
use std::sync::Arc;

const REFERENCE_DURATION_SEC: Seconds = 180.0;
const MIN_SCALED_DURATION_SEC: Seconds = 30.0;
const DURATION_SCALING_POWER: f64 = 0.3;

/// Scales the configured base size by piece length so short pieces get larger
/// text and long ones smaller, within `[base / 2, base * 2]`.
pub fn adjusted_base_size(base: u32, total_duration_sec: Seconds) -> u32 {
    if total_duration_sec <= 0.0 {
        return base;
    }
    let scale = (REFERENCE_DURATION_SEC / total_duration_sec.max(MIN_SCALED_DURATION_SEC))
        .powf(DURATION_SCALING_POWER);
    let adjusted = (base as f64 * scale) as u32;
    let lower = (base as f64 * 0.5) as u32;
    let upper = (base as f64 * 2.0) as u32;
    adjusted.min(upper).max(lower)
}

/// Per-run glyph size lookup keyed by `(pitch, velocity)`.
#[derive(Debug)]
pub struct FontSizer {
    base: u32,
    pitch_scale: f32,
    velocity_scale: f32,
    reference_pitch: u8,
    reference_velocity: u8,
    min_size: u32,
    max_size: u32,
    cache: HashMap<(u8, u8), u32>,
}

impl FontSizer {
    pub fn new(base: u32, settings: &RenderSettings) -> Self {
        Self {
            base,
            pitch_scale: settings.pitch_size_scale,
            velocity_scale: settings.velocity_size_scale,
            reference_pitch: settings.reference_pitch,
            reference_velocity: settings.reference_velocity,
            min_size: settings.min_char_render_size,
            max_size: settings.max_char_render_size,
            cache: HashMap::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size_for(&mut self, pitch: u8, velocity: u8) -> u32 {
        if let Some(size) = self.cache.get(&(pitch, velocity)) {
            return *size;
        }
        let mut size = self.base as f32;
        if self.pitch_scale != 0.0 {
            size *= 1.0 + (pitch as f32 - self.reference_pitch as f32) * self.pitch_scale;
        }
        if self.velocity_scale != 0.0 {
            size *= 1.0 + (velocity as f32 - self.reference_velocity as f32) * self.velocity_scale;
        }
        let size = size.clamp(self.min_size as f32, self.max_size as f32) as u32;
        self.cache.insert((pitch, velocity), size);
        size
    }
}

/// Extra horizontal room after a segment whose note is held past `threshold`.
pub fn trailing_padding(duration_ticks: Tick, threshold: Tick, scale_per_tick: f32) -> f32 {
    if duration_ticks <= threshold || scale_per_tick == 0.0 {
        return 0.0;
    }
    let padding = ((duration_ticks - threshold) as f64 * scale_per_tick as f64).trunc();
    padding.max(0.0) as f32
}

pub fn segment_padding(bound: &BoundSegment, settings: &RenderSettings) -> f32 {
    trailing_padding(
        bound.note.duration_ticks,
        settings.duration_padding_threshold_ticks,
        settings.duration_padding_scale_per_tick,
    )
}

pub fn align_start(anchor_x: i32, total_width: f32, align: HorizontalAlign) -> f32 {
    match align {
        HorizontalAlign::Left => anchor_x as f32,
        HorizontalAlign::Center => anchor_x as f32 - total_width / 2.0,
        HorizontalAlign::Right => anchor_x as f32 - total_width,
    }
}

/// Top of the draw origin for a text run anchored at `anchor_y`.
pub fn vertical_origin(
    bounds: TextBounds,
    anchor_y: i32,
    align: VerticalAlign,
    pitch: u8,
    settings: &RenderSettings,
) -> f32 {
    let anchor = anchor_y as f32;
    let y = match align {
        VerticalAlign::Top => anchor - bounds.top,
        VerticalAlign::Center => anchor - (bounds.top + bounds.height / 2.0),
        VerticalAlign::Bottom => anchor - (bounds.top + bounds.height),
        VerticalAlign::Baseline => anchor - bounds.ascent,
    };
    let offset = if settings.pitch_offset_scale != 0.0 {
        -(pitch as f32 - settings.reference_pitch as f32) * settings.pitch_offset_scale
    } else {
        0.0
    };
    y + offset
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineLayout {
    pub start_x: f32,
    pub total_width: f32,
}

impl LineLayout {
    pub fn empty(anchor_x: i32) -> Self {
        Self {
            start_x: anchor_x as f32,
            total_width: 0.0,
        }
    }
}

/// Measures a whole line from every segment's final text, for fixed placement.
pub fn measure_fixed_line(
    segments: &[Arc<BoundSegment>],
    glyphs: &mut dyn GlyphSource,
    sizer: &mut FontSizer,
    settings: &RenderSettings,
) -> LineLayout {
    if segments.is_empty() {
        return LineLayout::empty(settings.anchor_x());
    }

    let count = segments.len();
    let mut total_width = 0.0f32;
    for (idx, bound) in segments.iter().enumerate() {
        let px = sizer.size_for(bound.note.pitch, bound.note.velocity);
        total_width += glyphs.text_width(&bound.segment.text_for_layout, px);
        if idx + 1 < count {
            total_width += segment_padding(bound, settings);
            total_width += settings.char_spacing as f32;
        }
    }

    LineLayout {
        start_x: align_start(settings.anchor_x(), total_width, settings.horizontal_align),
        total_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_size_tracks_piece_length() {
        assert_eq!(adjusted_base_size(60, 0.0), 60);
        assert_eq!(adjusted_base_size(60, 180.0), 60);
        // Pieces under 30 s are treated as 30 s long.
        assert_eq!(adjusted_base_size(60, 2.0), adjusted_base_size(60, 30.0));
        assert_eq!(adjusted_base_size(60, 30.0), 102);
        assert_eq!(adjusted_base_size(60, 100_000.0), 30);
    }

    #[test]
    fn sizer_scales_by_pitch_and_velocity_then_clamps() {
        let settings = RenderSettings {
            pitch_size_scale: 0.1,
            velocity_size_scale: 0.01,
            min_char_render_size: 10,
            max_char_render_size: 200,
            ..RenderSettings::default()
        };
        let mut sizer = FontSizer::new(60, &settings);

        assert_eq!(sizer.size_for(60, 64), 60);
        assert_eq!(sizer.size_for(62, 64), 72);
        assert_eq!(sizer.size_for(70, 64), 120);
        assert_eq!(sizer.size_for(40, 64), 10);
        assert_eq!(sizer.size_for(90, 64), 200);
    }

    #[test]
    fn padding_is_whole_pixels_past_threshold() {
        assert_eq!(trailing_padding(240, 240, 0.1), 0.0);
        assert_eq!(trailing_padding(480, 240, 0.1), 24.0);
        assert_eq!(trailing_padding(255, 240, 0.1), 1.0);
        assert_eq!(trailing_padding(960, 240, 0.0), 0.0);
    }

    #[test]
    fn alignment_anchors_total_width() {
        assert_eq!(align_start(100, 40.0, HorizontalAlign::Left), 100.0);
        assert_eq!(align_start(100, 40.0, HorizontalAlign::Center), 80.0);
        assert_eq!(align_start(100, 40.0, HorizontalAlign::Right), 60.0);
    }

    #[test]
    fn vertical_origin_uses_bounds_and_pitch_offset() {
        let bounds = TextBounds {
            top: 10.0,
            height: 40.0,
            ascent: 45.0,
        };
        let settings = RenderSettings {
            pitch_offset_scale: 2.0,
            ..RenderSettings::default()
        };
        assert_eq!(
            vertical_origin(bounds, 500, VerticalAlign::Top, 60, &settings),
            490.0
        );
        assert_eq!(
            vertical_origin(bounds, 500, VerticalAlign::Center, 60, &settings),
            470.0
        );
        assert_eq!(
            vertical_origin(bounds, 500, VerticalAlign::Bottom, 60, &settings),
            450.0
        );
        assert_eq!(
            vertical_origin(bounds, 500, VerticalAlign::Baseline, 65, &settings),
            445.0
        );
    }
}
