use crate::layout::{
    align_start, measure_fixed_line, segment_padding, vertical_origin, FontSizer, LineLayout,
};
use crate::scheduler::{BoundSegment, Timeline, TimelineEventKind};
use lyrisync_domain_lyrics::LyricDocument;
use lyrisync_ports::font::{GlyphSource, TextBounds};
use lyrisync_ports::settings::{PlacementMode, RenderSettings};
use lyrisync_ports::types::{Canvas, Seconds};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    pub x: f32,
    pub y: f32,
    pub px: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisibleSegment {
    pub index_in_line: usize,
    pub text: String,
}

/// Everything drawn for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameScene {
    pub line_index: Option<usize>,
    pub start_x: f32,
    pub segments: Vec<VisibleSegment>,
    pub glyphs: Vec<PlacedGlyph>,
}

impl FrameScene {
    pub fn visible_texts(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

struct PreparedSegment {
    bound: Arc<BoundSegment>,
    text: String,
    px: u32,
    width: f32,
    bounds: TextBounds,
    padding: f32,
}

/// Frame-by-frame state machine over the master timeline.
///
/// Owns every per-run cache; nothing here outlives one render.
pub struct Compositor {
    settings: RenderSettings,
    timeline: Timeline,
    line_lengths: Vec<usize>,
    glyphs: Box<dyn GlyphSource>,
    sizer: FontSizer,
    cursor: usize,
    line_on_screen: Option<usize>,
    slots: Vec<Option<Arc<BoundSegment>>>,
    fixed_layouts: HashMap<usize, LineLayout>,
    fixed_layout_computations: usize,
    warnings: Vec<String>,
}

impl Compositor {
    pub fn new(
        settings: RenderSettings,
        base_font_size: u32,
        document: &LyricDocument,
        timeline: Timeline,
        glyphs: Box<dyn GlyphSource>,
    ) -> Self {
        let sizer = FontSizer::new(base_font_size, &settings);
        Self {
            settings,
            timeline,
            line_lengths: document
                .lines
                .iter()
                .map(|line| line.segments.len())
                .collect(),
            glyphs,
            sizer,
            cursor: 0,
            line_on_screen: None,
            slots: Vec::new(),
            fixed_layouts: HashMap::new(),
            fixed_layout_computations: 0,
            warnings: Vec::new(),
        }
    }

    pub fn line_on_screen(&self) -> Option<usize> {
        self.line_on_screen
    }

    pub fn fixed_layout(&self, line_index: usize) -> Option<LineLayout> {
        self.fixed_layouts.get(&line_index).copied()
    }

    /// How many fixed line layouts were measured so far.
    pub fn fixed_layout_computations(&self) -> usize {
        self.fixed_layout_computations
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Consumes every timeline event with `time <= now`. The cursor never rewinds.
    pub fn advance_to(&mut self, now: Seconds) {
        while let Some(event) = self.timeline.events().get(self.cursor) {
            if event.time_sec > now {
                break;
            }
            let kind = event.kind.clone();
            self.cursor += 1;
            match kind {
                TimelineEventKind::ClearLine { line_index } => self.clear_line(line_index),
                TimelineEventKind::Char(bound) => self.activate(bound),
            }
        }
    }

    fn clear_line(&mut self, line_index: usize) {
        if self.line_on_screen.is_some_and(|current| line_index <= current) {
            return;
        }
        self.line_on_screen = Some(line_index);
        let segment_count = self.line_lengths.get(line_index).copied().unwrap_or(0);
        self.slots = vec![None; segment_count];

        if self.settings.placement_mode == PlacementMode::Fixed
            && segment_count > 0
            && !self.fixed_layouts.contains_key(&line_index)
        {
            let segments = self.timeline.segments_for_line(line_index);
            let layout = if segments.is_empty() {
                self.warnings.push(format!(
                    "lyric line {} has {} segments but no notes, using an empty layout",
                    line_index + 1,
                    segment_count
                ));
                LineLayout::empty(self.settings.anchor_x())
            } else {
                self.fixed_layout_computations += 1;
                tracing::debug!(
                    line = line_index,
                    segments = segments.len(),
                    "measuring fixed line layout"
                );
                measure_fixed_line(
                    &segments,
                    self.glyphs.as_mut(),
                    &mut self.sizer,
                    &self.settings,
                )
            };
            self.fixed_layouts.insert(line_index, layout);
        }
    }

    fn activate(&mut self, bound: Arc<BoundSegment>) {
        if Some(bound.line_index()) != self.line_on_screen {
            return;
        }
        if let Some(slot) = self.slots.get_mut(bound.segment.index_in_line) {
            *slot = Some(bound);
        }
    }

    /// Lays out the active line as it looks at `now`.
    pub fn scene(&mut self, now: Seconds) -> FrameScene {
        let segment_count = self.slots.len();
        let mut prepared: Vec<Option<PreparedSegment>> = Vec::with_capacity(segment_count);
        let mut last_active: Option<usize> = None;

        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(bound) = slot else {
                prepared.push(None);
                continue;
            };
            last_active = Some(idx);
            let text = bound.visible_text(now).to_string();
            let px = self.sizer.size_for(bound.note.pitch, bound.note.velocity);
            let width = self.glyphs.text_width(&text, px);
            let bounds = if text.is_empty() {
                TextBounds::default()
            } else {
                self.glyphs.text_bounds(&text, px)
            };
            prepared.push(Some(PreparedSegment {
                bound: Arc::clone(bound),
                text,
                px,
                width,
                bounds,
                padding: segment_padding(bound, &self.settings),
            }));
        }

        let Some(last_active) = last_active else {
            return FrameScene {
                line_index: self.line_on_screen,
                ..FrameScene::default()
            };
        };

        let spacing = self.settings.char_spacing as f32;
        let start_x = match self.settings.placement_mode {
            PlacementMode::Dynamic => {
                let mut total_width = 0.0f32;
                for (idx, seg) in prepared.iter().enumerate().take(last_active + 1) {
                    let Some(seg) = seg else { continue };
                    total_width += seg.width;
                    if idx + 1 < segment_count {
                        total_width += seg.padding;
                    }
                    if idx < last_active {
                        total_width += spacing;
                    }
                }
                align_start(
                    self.settings.anchor_x(),
                    total_width,
                    self.settings.horizontal_align,
                )
            }
            PlacementMode::Fixed => self
                .line_on_screen
                .and_then(|line| self.fixed_layouts.get(&line))
                .map(|layout| layout.start_x)
                .unwrap_or(self.settings.anchor_x() as f32),
        };

        let mut scene = FrameScene {
            line_index: self.line_on_screen,
            start_x,
            segments: Vec::new(),
            glyphs: Vec::new(),
        };
        let mut x = start_x;
        for (idx, seg) in prepared.iter().enumerate().take(last_active + 1) {
            let Some(seg) = seg else { continue };
            let y = vertical_origin(
                seg.bounds,
                self.settings.anchor_y(),
                self.settings.vertical_align,
                seg.bound.note.pitch,
                &self.settings,
            );
            let padding = if idx + 1 < segment_count {
                seg.padding
            } else {
                0.0
            };

            if !seg.text.is_empty() {
                let basis = if seg.bound.segment.pads_across_final_text() {
                    seg.bound.segment.text_for_layout.as_str()
                } else {
                    seg.text.as_str()
                };
                let basis_chars = basis.chars().count();
                let padding_per_char = if basis_chars > 0 && padding > 0.0 {
                    padding / basis_chars as f32
                } else {
                    0.0
                };
                for ch in seg.text.chars() {
                    scene.glyphs.push(PlacedGlyph {
                        ch,
                        x,
                        y,
                        px: seg.px,
                    });
                    x += self.glyphs.text_width(ch.encode_utf8(&mut [0u8; 4]), seg.px);
                    x += padding_per_char;
                }
            } else if padding > 0.0 {
                x += padding;
            }

            if idx < last_active {
                x += spacing;
            }
            scene.segments.push(VisibleSegment {
                index_in_line: idx,
                text: seg.text.clone(),
            });
        }
        scene
    }

    pub fn paint(&mut self, scene: &FrameScene, canvas: &mut Canvas) {
        canvas.fill(self.settings.bg_color);
        for glyph in &scene.glyphs {
            self.glyphs.draw_glyph(
                canvas,
                glyph.x,
                glyph.y,
                glyph.ch,
                glyph.px,
                self.settings.text_color,
            );
        }
    }

    /// Advances to frame `index` and paints it into `canvas`.
    pub fn render_frame(&mut self, index: u64, canvas: &mut Canvas) -> FrameScene {
        let now = index as f64 / self.settings.fps.max(1) as f64;
        self.advance_to(now);
        let scene = self.scene(now);
        self.paint(&scene, canvas);
        scene
    }
}
