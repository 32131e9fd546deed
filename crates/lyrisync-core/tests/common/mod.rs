#![allow(dead_code)]

use lyrisync_ports::font::{FontError, FontPort, GlyphSource, TextBounds};
use lyrisync_ports::types::{Canvas, Rgb};
use lyrisync_ports::video::{FrameWriter, VideoEncoderPort, VideoError, VideoSpec};
use midly::num::{u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Every glyph is a solid box `px / 2` wide and `px` tall.
pub struct BoxGlyphs;

impl BoxGlyphs {
    fn advance(px: u32) -> f32 {
        (px / 2) as f32
    }
}

impl GlyphSource for BoxGlyphs {
    fn text_width(&mut self, text: &str, px: u32) -> f32 {
        text.chars().count() as f32 * Self::advance(px)
    }

    fn text_bounds(&mut self, _text: &str, px: u32) -> TextBounds {
        TextBounds {
            top: 0.0,
            height: px as f32,
            ascent: px as f32 * 0.75,
        }
    }

    fn draw_glyph(&mut self, canvas: &mut Canvas, x: f32, y: f32, _ch: char, px: u32, color: Rgb) {
        let width = Self::advance(px) as usize;
        let height = px as usize;
        let mask = vec![255u8; width * height];
        canvas.blend_mask(x.round() as i32, y.round() as i32, width, height, &mask, color);
    }
}

pub struct BoxFontPort;

impl FontPort for BoxFontPort {
    fn load(&self, path: &Path, _check_px: u32) -> Result<Box<dyn GlyphSource>, FontError> {
        if path.to_string_lossy().contains("missing") {
            return Err(FontError::Io(format!("{} not found", path.display())));
        }
        if path.to_string_lossy().contains("broken") {
            return Err(FontError::Parse("no glyph tables".to_string()));
        }
        Ok(Box::new(BoxGlyphs))
    }
}

#[derive(Default)]
pub struct Recording {
    pub opened_codecs: Vec<String>,
    /// Non-background pixel count of every written frame.
    pub lit_pixels: Vec<usize>,
    pub finished: bool,
    /// Set once the writer is dropped, finished or not.
    pub released: bool,
}

/// Encoder that counts ink per frame instead of encoding.
#[derive(Clone, Default)]
pub struct RecordingEncoder {
    pub rejected: Vec<String>,
    /// Zero-based frame whose write fails.
    pub fail_at_frame: Option<usize>,
    pub recording: Arc<Mutex<Recording>>,
}

impl RecordingEncoder {
    pub fn rejecting(codecs: &[&str]) -> Self {
        Self {
            rejected: codecs.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_at(frame: usize) -> Self {
        Self {
            fail_at_frame: Some(frame),
            ..Self::default()
        }
    }
}

impl VideoEncoderPort for RecordingEncoder {
    fn open(&self, spec: &VideoSpec) -> Result<Box<dyn FrameWriter>, VideoError> {
        if self.rejected.contains(&spec.codec) {
            return Err(VideoError::CodecRejected(spec.codec.clone()));
        }
        self.recording.lock().opened_codecs.push(spec.codec.clone());
        Ok(Box::new(RecordingWriter {
            spec: spec.clone(),
            fail_at_frame: self.fail_at_frame,
            recording: Arc::clone(&self.recording),
        }))
    }
}

struct RecordingWriter {
    spec: VideoSpec,
    fail_at_frame: Option<usize>,
    recording: Arc<Mutex<Recording>>,
}

impl FrameWriter for RecordingWriter {
    fn write_frame(&mut self, frame: &Canvas) -> Result<(), VideoError> {
        let bytes = frame.as_bytes();
        if bytes.len() != self.spec.frame_bytes() {
            return Err(VideoError::FrameSize {
                expected: self.spec.frame_bytes(),
                actual: bytes.len(),
            });
        }
        if self.fail_at_frame == Some(self.recording.lock().lit_pixels.len()) {
            return Err(VideoError::Write("disk full".to_string()));
        }
        let background = bytes[..4].to_vec();
        let lit = bytes
            .chunks_exact(4)
            .filter(|px| *px != background.as_slice())
            .count();
        self.recording.lock().lit_pixels.push(lit);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), VideoError> {
        std::fs::write(&self.spec.path, vec![0u8; 2048])
            .map_err(|e| VideoError::Finish(e.to_string()))?;
        self.recording.lock().finished = true;
        Ok(())
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        self.recording.lock().released = true;
    }
}

pub fn temp_dir(label: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("lyrisync_{label}_{nanos}"));
    std::fs::create_dir_all(&dir).expect("temp dir");
    dir
}

pub fn note_on(delta: u32, key: u8) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message: MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(100),
            },
        },
    }
}

pub fn note_off(delta: u32, key: u8) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message: MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(64),
            },
        },
    }
}

pub fn end_of_track(delta: u32) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    }
}

/// Writes a single-track file at 480 ticks per beat and the default tempo.
pub fn write_midi(path: &Path, track: Vec<TrackEvent<'static>>) {
    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(480.into()),
        },
        tracks: vec![track],
    };
    let mut data = Vec::new();
    smf.write(&mut data).expect("midi write should succeed");
    std::fs::write(path, data).expect("midi file");
}

/// Pitch 60 for the first second, pitch 64 for the next.
pub fn two_note_track() -> Vec<TrackEvent<'static>> {
    vec![
        note_on(0, 60),
        note_off(960, 60),
        note_on(0, 64),
        note_off(960, 64),
        end_of_track(0),
    ]
}
