use serde::{Deserialize, Serialize};

pub const LITERAL_FENCE: &str = "```";
pub const BLANK_MARKER: &str = "---";
pub const SLOT_SEPARATOR: char = '|';

/// Notes shorter than this show their final text immediately.
const MIN_REVEAL_SECONDS: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// ```` ```text``` ````: shown verbatim.
    Literal,
    /// `---`: consumes a note without showing anything.
    Blank,
    /// `a|b|---cd`: equal-length slots played in order.
    Sequential,
    /// `---abc`: one more character per step.
    Progressive,
    Static,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubSegmentTiming {
    pub text: String,
    pub start_ratio: f64,
    pub end_ratio: f64,
}

impl SubSegmentTiming {
    fn new(text: impl Into<String>, start_ratio: f64, end_ratio: f64) -> Self {
        Self {
            text: text.into(),
            start_ratio,
            end_ratio,
        }
    }
}

/// One `/`-delimited token of a lyric line with its reveal plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LyricSegment {
    pub original_text: String,
    pub kind: SegmentKind,
    pub is_dynamic: bool,
    /// Final revealed form, used for static width measurement.
    pub text_for_layout: String,
    /// Contiguous, starts at 0.0, ends at 1.0.
    pub sub_segments: Vec<SubSegmentTiming>,
    pub line_index: usize,
    pub index_in_line: usize,
}

pub fn parse_segment(raw: &str) -> LyricSegment {
    LyricSegment::parse(raw, 0, 0)
}

impl LyricSegment {
    pub fn parse(raw: &str, line_index: usize, index_in_line: usize) -> Self {
        let (kind, text_for_layout, mut sub_segments) = parse_plan(raw.trim());
        normalize(&mut sub_segments);
        Self {
            original_text: raw.to_string(),
            kind,
            is_dynamic: !matches!(kind, SegmentKind::Literal | SegmentKind::Static),
            text_for_layout,
            sub_segments,
            line_index,
            index_in_line,
        }
    }

    /// Text shown `since_onset` seconds after the bound note starts.
    pub fn visible_text(&self, since_onset: f64, note_duration: f64) -> &str {
        if !self.is_dynamic {
            return &self.text_for_layout;
        }
        if note_duration <= MIN_REVEAL_SECONDS {
            return self.last_text();
        }
        self.text_at((since_onset / note_duration).clamp(0.0, 1.0))
    }

    /// Sub-segment text at `progress` through the note, in `[0, 1]`.
    pub fn text_at(&self, progress: f64) -> &str {
        let Some(first) = self.sub_segments.first() else {
            return "";
        };
        for sub in &self.sub_segments {
            if sub.start_ratio == 0.0 && sub.end_ratio == 0.0 && progress == 0.0 {
                return &sub.text;
            }
            if sub.start_ratio <= progress && progress < sub.end_ratio {
                return &sub.text;
            }
            if sub.end_ratio == 1.0 && progress == 1.0 {
                return &sub.text;
            }
        }
        if progress <= 0.0 {
            &first.text
        } else {
            self.last_text()
        }
    }

    /// Whether trailing padding is spread over the final text rather than the
    /// currently visible prefix, so revealed characters never move.
    pub fn pads_across_final_text(&self) -> bool {
        self.is_dynamic && self.original_text.trim().starts_with(BLANK_MARKER)
    }

    fn last_text(&self) -> &str {
        self.sub_segments
            .last()
            .map(|sub| sub.text.as_str())
            .unwrap_or("")
    }
}

fn parse_plan(stripped: &str) -> (SegmentKind, String, Vec<SubSegmentTiming>) {
    if stripped.len() >= LITERAL_FENCE.len() * 2
        && stripped.starts_with(LITERAL_FENCE)
        && stripped.ends_with(LITERAL_FENCE)
    {
        let literal = &stripped[LITERAL_FENCE.len()..stripped.len() - LITERAL_FENCE.len()];
        return (
            SegmentKind::Literal,
            literal.to_string(),
            vec![SubSegmentTiming::new(literal, 0.0, 1.0)],
        );
    }

    if stripped == BLANK_MARKER {
        return (
            SegmentKind::Blank,
            String::new(),
            vec![SubSegmentTiming::new("", 0.0, 1.0)],
        );
    }

    if stripped.contains(SLOT_SEPARATOR) {
        let slots: Vec<&str> = stripped.split(SLOT_SEPARATOR).collect();
        let slot_ratio = 1.0 / slots.len() as f64;
        let mut subs = Vec::new();
        for (idx, slot) in slots.iter().enumerate() {
            let start = idx as f64 * slot_ratio;
            let end = (idx + 1) as f64 * slot_ratio;
            match progressive_content(slot) {
                Some(content) => push_progressive(&mut subs, content, start, end),
                None if *slot == BLANK_MARKER => subs.push(SubSegmentTiming::new("", start, end)),
                None => subs.push(SubSegmentTiming::new(*slot, start, end)),
            }
        }
        let layout = subs.last().map(|sub| sub.text.clone()).unwrap_or_default();
        return (SegmentKind::Sequential, layout, subs);
    }

    if let Some(content) = progressive_content(stripped) {
        let mut subs = Vec::new();
        push_progressive(&mut subs, content, 0.0, 1.0);
        let layout = subs.last().map(|sub| sub.text.clone()).unwrap_or_default();
        return (SegmentKind::Progressive, layout, subs);
    }

    (
        SegmentKind::Static,
        stripped.to_string(),
        vec![SubSegmentTiming::new(stripped, 0.0, 1.0)],
    )
}

fn progressive_content(text: &str) -> Option<&str> {
    text.strip_prefix(BLANK_MARKER)
        .filter(|content| !content.is_empty())
}

fn push_progressive(out: &mut Vec<SubSegmentTiming>, content: &str, start: f64, end: f64) {
    let steps: Vec<usize> = content
        .char_indices()
        .map(|(offset, ch)| offset + ch.len_utf8())
        .collect();
    let step_ratio = (end - start) / steps.len() as f64;
    for (step, prefix_end) in steps.iter().enumerate() {
        out.push(SubSegmentTiming::new(
            &content[..*prefix_end],
            start + step as f64 * step_ratio,
            start + (step + 1) as f64 * step_ratio,
        ));
    }
}

/// Forces the plan to cover `[0, 1]` without gaps running backwards.
pub fn normalize(subs: &mut [SubSegmentTiming]) {
    let Some(last_idx) = subs.len().checked_sub(1) else {
        return;
    };

    let mut current_end = 0.0f64;
    for (idx, sub) in subs.iter_mut().enumerate() {
        sub.start_ratio = sub.start_ratio.max(current_end);
        if idx == last_idx {
            sub.end_ratio = 1.0;
        }
        sub.end_ratio = sub.end_ratio.max(sub.start_ratio);
        current_end = sub.end_ratio;
    }

    subs[0].start_ratio = 0.0;
    for idx in 0..last_idx {
        let prev_end = subs[idx].end_ratio;
        let next = &mut subs[idx + 1];
        if next.start_ratio < prev_end {
            next.start_ratio = prev_end;
            next.end_ratio = next.end_ratio.max(prev_end);
        }
    }
    subs[last_idx].end_ratio = 1.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_pulls_plan_onto_unit_span() {
        let mut subs = vec![
            SubSegmentTiming::new("a", 0.2, 0.5),
            SubSegmentTiming::new("b", 0.4, 0.45),
            SubSegmentTiming::new("c", 0.6, 0.9),
        ];
        normalize(&mut subs);

        assert_eq!(subs[0].start_ratio, 0.0);
        assert_eq!(subs[1].start_ratio, 0.5);
        assert_eq!(subs[1].end_ratio, 0.5);
        assert_eq!(subs[2].start_ratio, 0.6);
        assert_eq!(subs[2].end_ratio, 1.0);
    }

    #[test]
    fn zero_length_plan_matches_at_start() {
        let segment = LyricSegment {
            original_text: "---x".to_string(),
            kind: SegmentKind::Progressive,
            is_dynamic: true,
            text_for_layout: "x".to_string(),
            sub_segments: vec![
                SubSegmentTiming::new("", 0.0, 0.0),
                SubSegmentTiming::new("x", 0.0, 1.0),
            ],
            line_index: 0,
            index_in_line: 0,
        };
        assert_eq!(segment.text_at(0.0), "");
        assert_eq!(segment.text_at(0.5), "x");
    }

    #[test]
    fn very_short_note_shows_final_text() {
        let segment = parse_segment("---abc");
        assert_eq!(segment.visible_text(0.0, 0.0), "abc");
    }

    #[test]
    fn progressive_steps_count_characters_not_bytes() {
        let segment = parse_segment("---あい");
        let texts: Vec<&str> = segment.sub_segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["あ", "あい"]);
    }
}
