use crate::compositor::Compositor;
use crate::layout::adjusted_base_size;
use crate::scheduler::build_timeline;
use crate::worker::CancelToken;
use lyrisync_domain_lyrics::{LyricDocument, LyricsError};
use lyrisync_domain_notes::{
    extract_notes_path, ExtractOptions, Extraction, NoteExtractError, Performance,
};
use lyrisync_ports::font::{FontError, FontPort};
use lyrisync_ports::render::{LogLevel, RenderEvent, RenderObserver};
use lyrisync_ports::settings::RenderSettings;
use lyrisync_ports::types::{Canvas, Seconds};
use lyrisync_ports::video::{FrameWriter, VideoEncoderPort, VideoError, VideoSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Size the font must rasterize at before a run starts.
const FONT_CHECK_PX: u32 = 10;
/// Video length appended after the last event when the MIDI reports no length.
const FALLBACK_TAIL_SEC: Seconds = 0.5;
const PROGRESS_LOG_EVERY_SEC: u64 = 10;
const SUSPICIOUS_OUTPUT_BYTES: u64 = 1024;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("input error: {0}")]
    Input(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("resource error: {0}")]
    Resource(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("render cancelled")]
    Cancelled,
}

impl From<NoteExtractError> for RenderError {
    fn from(err: NoteExtractError) -> Self {
        match err {
            NoteExtractError::Io(msg) => RenderError::Input(format!("MIDI file unreadable: {msg}")),
            NoteExtractError::Parse(msg) => {
                RenderError::Parse(format!("MIDI file undecodable: {msg}"))
            }
        }
    }
}

impl From<LyricsError> for RenderError {
    fn from(err: LyricsError) -> Self {
        match err {
            LyricsError::Io(msg) => RenderError::Input(format!("lyric file unreadable: {msg}")),
        }
    }
}

impl From<FontError> for RenderError {
    fn from(err: FontError) -> Self {
        match err {
            FontError::Io(msg) => RenderError::Input(format!("font unreadable: {msg}")),
            FontError::Parse(msg) => RenderError::Resource(format!("font unusable: {msg}")),
        }
    }
}

impl From<VideoError> for RenderError {
    fn from(err: VideoError) -> Self {
        RenderError::Runtime(err.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub midi_path: PathBuf,
    pub lyrics_path: PathBuf,
    pub output_path: PathBuf,
    pub settings: RenderSettings,
}

/// Adapters a render run talks to.
#[derive(Clone)]
pub struct RenderPorts {
    pub font: Arc<dyn FontPort>,
    pub encoder: Arc<dyn VideoEncoderPort>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub frames: u64,
    pub duration_sec: Seconds,
    pub codec: String,
    pub notes: usize,
    pub bound_segments: usize,
    pub output_bytes: Option<u64>,
}

/// Forwards log lines to the observer and mirrors them into `tracing`.
struct Reporter<'a> {
    observer: &'a mut dyn RenderObserver,
}

impl Reporter<'_> {
    fn log(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
        self.observer.on_event(RenderEvent::Log { level, message });
    }

    fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message.into());
    }

    fn progress(&mut self, frames_done: u64, frames_total: u64) {
        self.observer.on_event(RenderEvent::Progress {
            frames_done,
            frames_total,
        });
    }

    fn finish(&mut self, success: bool, message: String) {
        if success {
            tracing::info!("{message}");
        } else {
            tracing::error!("{message}");
        }
        self.observer
            .on_event(RenderEvent::Finished { success, message });
    }
}

/// Runs one render to completion on the calling thread.
///
/// Emits exactly one `RenderEvent::Finished`, after which the encoder has been
/// released on every path.
pub fn run_render(
    request: &RenderRequest,
    ports: &RenderPorts,
    observer: &mut dyn RenderObserver,
    cancel: &CancelToken,
) -> Result<RenderSummary, RenderError> {
    let mut reporter = Reporter { observer };
    let result = render(request, ports, &mut reporter, cancel);
    match &result {
        Ok(summary) => reporter.finish(
            true,
            format!(
                "video written to {} ({} frames)",
                request.output_path.display(),
                summary.frames
            ),
        ),
        Err(err) => reporter.finish(false, err.to_string()),
    }
    result
}

fn render(
    request: &RenderRequest,
    ports: &RenderPorts,
    reporter: &mut Reporter<'_>,
    cancel: &CancelToken,
) -> Result<RenderSummary, RenderError> {
    let settings = &request.settings;
    settings
        .validate()
        .map_err(|e| RenderError::Input(e.to_string()))?;
    let font_path = settings
        .font_path
        .clone()
        .ok_or_else(|| RenderError::Input("no font configured".to_string()))?;

    reporter.info(format!(
        "render started: midi '{}', output '{}'",
        file_label(&request.midi_path),
        file_label(&request.output_path)
    ));

    let performance = extract_notes_path(
        &request.midi_path,
        &ExtractOptions {
            ticks_per_beat_override: settings.ticks_per_beat_override,
        },
    )?;
    report_performance(&performance, reporter);
    if performance.is_empty() {
        return Err(RenderError::Parse(
            "no notes could be extracted from the MIDI file".to_string(),
        ));
    }

    let base_font_size = adjusted_base_size(settings.font_size_base, performance.total_duration_sec);
    reporter.info(format!(
        "base font size: {} -> {} (piece length {:.2}s)",
        settings.font_size_base, base_font_size, performance.total_duration_sec
    ));

    let document = LyricDocument::from_path(&request.lyrics_path)?;
    if document.is_empty() {
        reporter.warn("lyric file is empty");
    }

    let timeline = build_timeline(&document, &performance.notes, performance.total_duration_sec);
    for warning in timeline.warnings() {
        reporter.warn(warning.clone());
    }
    reporter.info(format!(
        "{} of {} lyric segments bound to notes, {} timeline events",
        timeline.bound_segments(),
        document.segment_count(),
        timeline.events().len()
    ));

    let bound_segments = timeline.bound_segments();
    let (frames_total, duration_sec) =
        frame_count(performance.total_duration_sec, timeline.last_event_time(), settings.fps)
            .ok_or_else(|| {
                RenderError::Parse(format!(
                    "computed frame count is not positive (piece length {:.2}s)",
                    performance.total_duration_sec
                ))
            })?;
    if duration_sec > performance.total_duration_sec {
        reporter.info(format!(
            "video length extended to {duration_sec:.2}s ({frames_total} frames) to cover the last event"
        ));
    }

    if let Some(dir) = request.output_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| {
                RenderError::Input(format!("cannot create output directory {}: {e}", dir.display()))
            })?;
            reporter.info(format!("created output directory {}", dir.display()));
        }
    }

    let glyphs = ports.font.load(&font_path, FONT_CHECK_PX)?;

    if cancel.is_cancelled() {
        return Err(RenderError::Cancelled);
    }
    let (mut writer, codec) = open_encoder(ports.encoder.as_ref(), request, reporter)?;

    let mut compositor = Compositor::new(
        settings.clone(),
        base_font_size,
        &document,
        timeline,
        glyphs,
    );
    reporter.info(format!(
        "rendering {} ({}x{} @ {} fps, {} frames)",
        file_label(&request.output_path),
        settings.width,
        settings.height,
        settings.fps,
        frames_total
    ));

    let mut canvas = Canvas::new(settings.width, settings.height, settings.bg_color);
    let log_every = settings.fps as u64 * PROGRESS_LOG_EVERY_SEC;
    for frame in 0..frames_total {
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        compositor.render_frame(frame, &mut canvas);
        for warning in compositor.take_warnings() {
            reporter.warn(warning);
        }
        writer
            .write_frame(&canvas)
            .map_err(|e| RenderError::Runtime(format!("frame {frame} failed: {e}")))?;

        let done = frame + 1;
        reporter.progress(done, frames_total);
        if log_every > 0 && done % log_every == 0 {
            reporter.info(format!(
                "rendered {:.1}s / {:.1}s",
                done as f64 / settings.fps as f64,
                duration_sec
            ));
        }
    }

    writer.finish()?;
    reporter.info(format!(
        "finished writing {}",
        file_label(&request.output_path)
    ));

    let output_bytes = match std::fs::metadata(&request.output_path) {
        Ok(meta) => {
            reporter.info(format!("output size: {} bytes", meta.len()));
            if meta.len() < SUSPICIOUS_OUTPUT_BYTES {
                reporter.warn(format!("output is unusually small ({} bytes)", meta.len()));
            }
            Some(meta.len())
        }
        Err(e) => {
            reporter.warn(format!("could not read output size: {e}"));
            None
        }
    };

    Ok(RenderSummary {
        frames: frames_total,
        duration_sec,
        codec,
        notes: performance.notes.len(),
        bound_segments,
        output_bytes,
    })
}

fn report_performance(performance: &Performance, reporter: &mut Reporter<'_>) {
    reporter.info(format!("MIDI ticks per beat: {}", performance.ppq));
    if performance.extraction == Extraction::Fallback {
        reporter.warn("no complete note pairs found, note lengths rebuilt from onsets");
    }
    reporter.info(format!(
        "{} notes extracted, piece length {:.2}s",
        performance.notes.len(),
        performance.total_duration_sec
    ));
}

/// Frame count and effective duration, or `None` when nothing can be rendered.
pub fn frame_count(
    total_duration_sec: Seconds,
    last_event_sec: Option<Seconds>,
    fps: u32,
) -> Option<(u64, Seconds)> {
    let fps = fps as f64;
    let frames = (total_duration_sec * fps).round();
    if frames > 0.0 {
        return Some((frames as u64, total_duration_sec));
    }
    let last_event_sec = last_event_sec?;
    let duration = total_duration_sec.max(last_event_sec + FALLBACK_TAIL_SEC);
    let frames = ((duration * fps).round() as u64).max(1);
    Some((frames, duration))
}

fn open_encoder(
    encoder: &dyn VideoEncoderPort,
    request: &RenderRequest,
    reporter: &mut Reporter<'_>,
) -> Result<(Box<dyn FrameWriter>, String), RenderError> {
    let settings = &request.settings;
    let mut rejected = Vec::new();
    for codec in settings.codecs.iter().filter(|c| !c.trim().is_empty()) {
        let spec = VideoSpec {
            path: request.output_path.clone(),
            width: settings.width,
            height: settings.height,
            fps: settings.fps,
            codec: codec.clone(),
        };
        match encoder.open(&spec) {
            Ok(writer) => {
                reporter.info(format!("video encoder ready (codec {codec})"));
                return Ok((writer, codec.clone()));
            }
            Err(err) => {
                reporter.warn(format!("codec {codec} unavailable: {err}"));
                rejected.push(codec.as_str());
            }
        }
    }
    Err(RenderError::Resource(format!(
        "no video codec could be opened (tried {})",
        rejected.join(", ")
    )))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_rounds_piece_length() {
        assert_eq!(frame_count(2.0, Some(2.1), 30), Some((60, 2.0)));
        assert_eq!(frame_count(1.99, None, 30), Some((60, 1.99)));
    }

    #[test]
    fn empty_piece_extends_to_last_event() {
        let (frames, duration) = frame_count(0.0, Some(1.0), 30).expect("frames");
        assert_eq!(frames, 45);
        assert!((duration - 1.5).abs() < 1e-9);
        assert_eq!(frame_count(0.0, None, 30), None);
    }

    #[test]
    fn font_parse_failure_is_a_resource_error() {
        let err: RenderError = FontError::Parse("bad table".to_string()).into();
        assert!(matches!(err, RenderError::Resource(_)));
        let err: RenderError = NoteExtractError::Parse("no header".to_string()).into();
        assert!(matches!(err, RenderError::Parse(_)));
    }
}
