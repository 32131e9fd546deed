use lyrisync_domain_lyrics::{LyricDocument, LyricSegment};
use lyrisync_domain_notes::NoteEvent;
use lyrisync_ports::types::Seconds;
use std::sync::Arc;

/// Gap after the last lyric before the final line is cleared.
const TRAILING_CLEAR_AFTER_LYRIC: Seconds = 0.5;
const TRAILING_CLEAR_AFTER_MIDI: Seconds = 0.1;

/// A lyric segment together with the note it was bound to.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundSegment {
    pub segment: LyricSegment,
    pub note: NoteEvent,
}

impl BoundSegment {
    pub fn line_index(&self) -> usize {
        self.segment.line_index
    }

    pub fn visible_text(&self, now: Seconds) -> &str {
        self.segment
            .visible_text(now - self.note.start_sec, self.note.duration_sec)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TimelineEventKind {
    ClearLine { line_index: usize },
    Char(Arc<BoundSegment>),
}

impl TimelineEventKind {
    fn priority(&self) -> u8 {
        match self {
            TimelineEventKind::ClearLine { .. } => 0,
            TimelineEventKind::Char(_) => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimelineEvent {
    pub time_sec: Seconds,
    pub kind: TimelineEventKind,
}

/// Master timeline, sorted by `(time_sec, ClearLine before Char)`.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
    bound_segments: usize,
    warnings: Vec<String>,
}

impl Timeline {
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn bound_segments(&self) -> usize {
        self.bound_segments
    }

    /// Non-fatal scheduling problems, such as running out of notes.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn last_event_time(&self) -> Option<Seconds> {
        self.events.last().map(|event| event.time_sec)
    }

    /// Bound segments of `line_index` in reading order.
    pub fn segments_for_line(&self, line_index: usize) -> Vec<Arc<BoundSegment>> {
        let mut segments: Vec<Arc<BoundSegment>> = self
            .events
            .iter()
            .filter_map(|event| match &event.kind {
                TimelineEventKind::Char(bound) if bound.line_index() == line_index => {
                    Some(Arc::clone(bound))
                }
                _ => None,
            })
            .collect();
        segments.sort_by_key(|bound| bound.segment.index_in_line);
        segments
    }
}

/// Binds segments to notes in order and builds the master timeline.
///
/// `notes` must already be sorted by onset. The Nth segment in reading order takes
/// the Nth note; once notes run out the remaining segments are left unscheduled.
pub fn build_timeline(
    document: &LyricDocument,
    notes: &[NoteEvent],
    total_duration_sec: Seconds,
) -> Timeline {
    let mut events: Vec<TimelineEvent> = Vec::new();
    let mut warnings = Vec::new();
    let mut next_note = 0usize;

    if notes.is_empty() && document.segment_count() > 0 {
        warnings.push("no MIDI notes available, no lyric events scheduled".to_string());
    }

    'lines: for line in &document.lines {
        let Some(first_note) = notes.get(next_note) else {
            if !notes.is_empty() {
                warnings.push(format!(
                    "MIDI notes exhausted before lyric line {}",
                    line.index + 1
                ));
            }
            break;
        };
        events.push(TimelineEvent {
            time_sec: first_note.start_sec,
            kind: TimelineEventKind::ClearLine {
                line_index: line.index,
            },
        });

        for segment in &line.segments {
            let Some(note) = notes.get(next_note) else {
                warnings.push(format!(
                    "MIDI notes exhausted in lyric line {}, skipping from segment '{}'",
                    line.index + 1,
                    segment.original_text
                ));
                break 'lines;
            };
            events.push(TimelineEvent {
                time_sec: note.start_sec,
                kind: TimelineEventKind::Char(Arc::new(BoundSegment {
                    segment: segment.clone(),
                    note: *note,
                })),
            });
            next_note += 1;
        }
    }

    let bound_segments = next_note;
    if let Some(max_line) = events.iter().map(event_line_index).max() {
        let last_lyric_time = events
            .iter()
            .filter(|event| matches!(event.kind, TimelineEventKind::Char(_)))
            .map(|event| event.time_sec)
            .fold(0.0, f64::max);
        events.push(TimelineEvent {
            time_sec: (last_lyric_time + TRAILING_CLEAR_AFTER_LYRIC)
                .max(total_duration_sec + TRAILING_CLEAR_AFTER_MIDI),
            kind: TimelineEventKind::ClearLine {
                line_index: max_line + 1,
            },
        });
    }

    events.sort_by(|a, b| {
        a.time_sec
            .total_cmp(&b.time_sec)
            .then_with(|| a.kind.priority().cmp(&b.kind.priority()))
    });

    Timeline {
        events,
        bound_segments,
        warnings,
    }
}

fn event_line_index(event: &TimelineEvent) -> usize {
    match &event.kind {
        TimelineEventKind::ClearLine { line_index } => *line_index,
        TimelineEventKind::Char(bound) => bound.line_index(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(start_sec: f64, duration_sec: f64) -> NoteEvent {
        NoteEvent {
            pitch: 60,
            velocity: 100,
            start_sec,
            duration_sec,
            start_tick: (start_sec * 960.0) as i64,
            duration_ticks: (duration_sec * 960.0) as i64,
            track: 0,
        }
    }

    #[test]
    fn clear_line_precedes_char_at_same_time() {
        let doc = LyricDocument::parse("a/b");
        let notes = [note(0.0, 1.0), note(1.0, 1.0)];
        let timeline = build_timeline(&doc, &notes, 2.0);

        let priorities: Vec<u8> = timeline.events().iter().map(|e| e.kind.priority()).collect();
        assert_eq!(priorities, vec![0, 1, 1, 0]);
        let times: Vec<f64> = timeline.events().iter().map(|e| e.time_sec).collect();
        for (time, expected) in times.iter().zip([0.0, 0.0, 1.0, 2.1]) {
            assert!((time - expected).abs() < 1e-9);
        }
        assert!(timeline.warnings().is_empty());
    }

    #[test]
    fn trailing_clear_targets_line_after_the_last() {
        let doc = LyricDocument::parse("a\nb");
        let notes = [note(0.0, 1.0), note(1.0, 1.0)];
        let timeline = build_timeline(&doc, &notes, 1.2);

        let last = timeline.events().last().expect("trailing clear");
        assert_eq!(last.kind, TimelineEventKind::ClearLine { line_index: 2 });
        assert!((last.time_sec - 1.5).abs() < 1e-9);
    }

    #[test]
    fn running_out_of_notes_is_a_warning() {
        let doc = LyricDocument::parse("a/b/c\nd");
        let notes = [note(0.0, 0.5), note(0.5, 0.5)];
        let timeline = build_timeline(&doc, &notes, 1.0);

        assert_eq!(timeline.bound_segments(), 2);
        assert_eq!(timeline.warnings().len(), 1);
        assert!(timeline.segments_for_line(1).is_empty());
    }
}
