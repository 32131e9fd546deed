use lyrisync_domain_lyrics::{parse_segment, LyricDocument, SegmentKind, SubSegmentTiming};
use pretty_assertions::assert_eq;

const THIRD: f64 = 1.0 / 3.0;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn assert_unit_span(subs: &[SubSegmentTiming]) {
    assert!(!subs.is_empty());
    assert_eq!(subs[0].start_ratio, 0.0);
    assert_eq!(subs[subs.len() - 1].end_ratio, 1.0);
    for pair in subs.windows(2) {
        assert!(pair[1].start_ratio >= pair[0].start_ratio);
        assert!(pair[1].start_ratio >= pair[0].end_ratio);
    }
    for sub in subs {
        assert!(sub.start_ratio <= sub.end_ratio);
    }
}

#[test]
fn literal_keeps_slashes_and_markers_verbatim() {
    let segment = parse_segment("```A/B```");
    assert_eq!(segment.kind, SegmentKind::Literal);
    assert!(!segment.is_dynamic);
    assert_eq!(segment.text_for_layout, "A/B");
    assert_eq!(segment.sub_segments.len(), 1);
    assert_eq!(segment.sub_segments[0].text, "A/B");

    let segment = parse_segment("```---x|y```");
    assert_eq!(segment.text_for_layout, "---x|y");
}

#[test]
fn blank_marker_consumes_note_silently() {
    let segment = parse_segment(" --- ");
    assert_eq!(segment.kind, SegmentKind::Blank);
    assert!(segment.is_dynamic);
    assert_eq!(segment.text_for_layout, "");
    assert_eq!(segment.visible_text(0.5, 1.0), "");
}

#[test]
fn progressive_reveal_adds_one_character_per_step() {
    let segment = parse_segment("---cat");
    assert_eq!(segment.kind, SegmentKind::Progressive);
    assert!(segment.is_dynamic);
    assert_eq!(segment.text_for_layout, "cat");

    let texts: Vec<&str> = segment.sub_segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["c", "ca", "cat"]);
    let subs = &segment.sub_segments;
    assert!(approx(subs[0].end_ratio, THIRD));
    assert!(approx(subs[1].start_ratio, THIRD));
    assert!(approx(subs[1].end_ratio, 2.0 * THIRD));
    assert!(approx(subs[2].start_ratio, 2.0 * THIRD));
    assert_unit_span(subs);

    assert_eq!(segment.visible_text(0.0, 1.5), "c");
    assert_eq!(segment.visible_text(0.6, 1.5), "ca");
    assert_eq!(segment.visible_text(1.5, 1.5), "cat");
    assert_eq!(segment.visible_text(9.0, 1.5), "cat");
    assert_eq!(segment.visible_text(-1.0, 1.5), "c");
}

#[test]
fn sequential_slots_split_note_evenly() {
    let segment = parse_segment("x|y|z");
    assert_eq!(segment.kind, SegmentKind::Sequential);
    assert!(segment.is_dynamic);
    assert_eq!(segment.text_for_layout, "z");

    let subs = &segment.sub_segments;
    assert_eq!(subs.len(), 3);
    for (idx, (sub, text)) in subs.iter().zip(["x", "y", "z"]).enumerate() {
        assert_eq!(sub.text, text);
        assert!(approx(sub.end_ratio - sub.start_ratio, THIRD));
        assert!(approx(sub.start_ratio, idx as f64 * THIRD));
    }
    assert_unit_span(subs);
}

#[test]
fn sequential_slot_can_reveal_progressively() {
    let segment = parse_segment("a|---bc|---");
    let subs = &segment.sub_segments;
    let texts: Vec<&str> = subs.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["a", "b", "bc", ""]);
    assert!(approx(subs[1].start_ratio, THIRD));
    assert!(approx(subs[1].end_ratio, 0.5));
    assert!(approx(subs[2].end_ratio, 2.0 * THIRD));
    assert_eq!(segment.text_for_layout, "");
    assert!(!segment.pads_across_final_text());
    assert!(parse_segment("---ab|c").pads_across_final_text());
    assert_unit_span(subs);
}

#[test]
fn static_text_is_trimmed_and_never_changes() {
    let segment = parse_segment("  hello ");
    assert_eq!(segment.kind, SegmentKind::Static);
    assert!(!segment.is_dynamic);
    assert_eq!(segment.text_for_layout, "hello");
    assert_eq!(segment.visible_text(0.0, 1.0), "hello");
    assert_eq!(segment.original_text, "  hello ");
}

#[test]
fn every_grammar_form_covers_the_unit_span() {
    for raw in [
        "", "a", "---", "----", "---x", "x|", "|", "a||b", "```", "``````", "---ab|---cd|e",
    ] {
        let segment = parse_segment(raw);
        assert_unit_span(&segment.sub_segments);
    }
}

#[test]
fn document_assigns_line_and_position_indices() {
    let doc = LyricDocument::parse("a/b\n\n```x/y```/---zz\n");
    assert_eq!(doc.lines.len(), 3);
    assert_eq!(doc.segment_count(), 4);
    assert!(doc.lines[1].segments.is_empty());

    let third = &doc.lines[2];
    assert_eq!(third.index, 2);
    assert_eq!(third.segments[0].text_for_layout, "x/y");
    assert_eq!(third.segments[1].kind, SegmentKind::Progressive);
    assert_eq!(third.segments[1].line_index, 2);
    assert_eq!(third.segments[1].index_in_line, 1);
}
