use crate::fallback::{rebuild_from_onsets, Onset};
use crate::model::{
    Extraction, NoteEvent, Performance, TempoPoint, DEFAULT_US_PER_QUARTER, MIN_NOTE_SECONDS,
};
use crate::tempo::{ticks_to_seconds, TempoMap};
use lyrisync_ports::types::{Seconds, Tick};
use midly::{Fps, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum NoteExtractError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Replaces the resolution declared in the file header.
    pub ticks_per_beat_override: Option<u16>,
}

pub fn extract_notes_path(
    path: &Path,
    options: &ExtractOptions,
) -> Result<Performance, NoteExtractError> {
    let data = std::fs::read(path).map_err(|e| NoteExtractError::Io(e.to_string()))?;
    extract_notes_bytes(&data, options)
}

/// Decodes a standard MIDI file into notes sorted by onset.
///
/// A file that decodes but holds no notes yields an empty `Performance`; deciding
/// whether that is fatal is left to the caller.
pub fn extract_notes_bytes(
    data: &[u8],
    options: &ExtractOptions,
) -> Result<Performance, NoteExtractError> {
    let smf = Smf::parse(data).map_err(|e| NoteExtractError::Parse(e.to_string()))?;
    let (header_ppq, tempo_override) = match smf.header.timing {
        Timing::Metrical(ticks) => (ticks.as_int(), None),
        Timing::Timecode(fps, ticks_per_frame) => {
            let (ppq, us_per_quarter) = timecode_ppq_and_tempo(fps, ticks_per_frame);
            (ppq, Some(us_per_quarter))
        }
    };
    let ppq = options
        .ticks_per_beat_override
        .filter(|ppq| *ppq > 0)
        .unwrap_or(header_ppq)
        .max(1);

    let mut tempo_points: BTreeMap<Tick, u32> = BTreeMap::new();
    let mut tempo_values: Vec<u32> = Vec::new();
    let mut tracks: Vec<TrackMessages> = Vec::with_capacity(smf.tracks.len());
    let mut last_tick: Tick = 0;

    for track in &smf.tracks {
        let mut tick: Tick = 0;
        let mut collected = TrackMessages::default();
        let mut channel_event_seen = false;
        for event in track {
            tick += event.delta.as_int() as Tick;
            match &event.kind {
                TrackEventKind::Midi { message, .. } => {
                    channel_event_seen = true;
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            collected.messages.push((
                                tick,
                                TrackMessage::On {
                                    pitch: key.as_int(),
                                    velocity: vel.as_int(),
                                },
                            ));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            collected
                                .messages
                                .push((tick, TrackMessage::Off { pitch: key.as_int() }));
                        }
                        _ => {}
                    }
                }
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) => {
                    let us_per_quarter = us_per_quarter.as_int();
                    tempo_points.insert(tick, us_per_quarter);
                    tempo_values.push(us_per_quarter);
                    if !channel_event_seen && collected.initial_tempo.is_none() {
                        collected.initial_tempo = Some(us_per_quarter);
                    }
                    collected
                        .messages
                        .push((tick, TrackMessage::Tempo(us_per_quarter)));
                }
                TrackEventKind::Meta(_) => {}
                _ => channel_event_seen = true,
            }
        }
        last_tick = last_tick.max(tick);
        tracks.push(collected);
    }

    // Merged-stream view, used for the file length and onset-only rebuilding.
    let tempo_points = build_tempo_points(tempo_points, tempo_override);
    let tempo_map = TempoMap::new(ppq, tempo_points.clone());

    let mut notes: Vec<NoteEvent> = Vec::new();
    for (track_idx, track) in tracks.iter().enumerate() {
        let initial_tempo = tempo_override
            .or(track.initial_tempo)
            .unwrap_or(DEFAULT_US_PER_QUARTER);
        let mut pairer = NotePairer::new(ppq, track_idx, initial_tempo);
        for (tick, message) in &track.messages {
            pairer.advance_to(*tick);
            match *message {
                TrackMessage::On { pitch, velocity } => pairer.note_on(pitch, velocity),
                TrackMessage::Off { pitch } => pairer.note_off(pitch),
                TrackMessage::Tempo(us_per_quarter) if tempo_override.is_none() => {
                    pairer.set_tempo(us_per_quarter)
                }
                TrackMessage::Tempo(_) => {}
            }
        }
        notes.extend(pairer.finish());
    }

    let last_event_sec = tempo_map.tick_to_seconds(last_tick);
    let mut total_duration_sec = notes
        .iter()
        .map(NoteEvent::end_sec)
        .fold(last_event_sec, f64::max);

    let mut extraction = Extraction::Paired;
    if notes.is_empty() {
        let onsets: Vec<Onset> = tracks
            .iter()
            .enumerate()
            .flat_map(|(track, collected)| {
                collected
                    .messages
                    .iter()
                    .filter_map(move |(tick, message)| match *message {
                        TrackMessage::On { pitch, velocity } => Some(Onset {
                            tick: *tick,
                            track,
                            pitch,
                            velocity,
                        }),
                        _ => None,
                    })
            })
            .collect();
        if !onsets.is_empty() {
            tracing::debug!(
                onsets = onsets.len(),
                "no note-on/note-off pairs closed; rebuilding notes from onsets"
            );
            let average_tempo = match tempo_override {
                Some(us_per_quarter) => us_per_quarter as f64,
                None => average_tempo(&tempo_values),
            };
            notes = rebuild_from_onsets(onsets, &tempo_map, average_tempo, total_duration_sec);
            total_duration_sec = notes
                .iter()
                .map(NoteEvent::end_sec)
                .fold(total_duration_sec, f64::max);
            extraction = Extraction::Fallback;
        }
    }

    notes.sort_by(|a, b| a.start_sec.total_cmp(&b.start_sec));

    tracing::debug!(
        ppq,
        notes = notes.len(),
        total_duration_sec,
        ?extraction,
        "midi notes extracted"
    );

    Ok(Performance {
        ppq,
        tempo_map: tempo_points,
        notes,
        total_duration_sec,
        extraction,
    })
}

#[derive(Clone, Copy, Debug)]
enum TrackMessage {
    On { pitch: u8, velocity: u8 },
    Off { pitch: u8 },
    Tempo(u32),
}

#[derive(Debug, Default)]
struct TrackMessages {
    /// First tempo of the track when it precedes every channel event.
    initial_tempo: Option<u32>,
    messages: Vec<(Tick, TrackMessage)>,
}

#[derive(Clone, Copy, Debug)]
struct PendingNote {
    velocity: u8,
    start_tick: Tick,
    start_sec: Seconds,
    us_per_quarter: u32,
}

/// Pairs note-on/note-off messages of one track, timing them with the track's
/// own tempo.
struct NotePairer {
    ppq: u16,
    track: usize,
    us_per_quarter: u32,
    tick: Tick,
    sec: Seconds,
    pending: HashMap<u8, PendingNote>,
    last_end: HashMap<u8, (Tick, Seconds)>,
    notes: Vec<NoteEvent>,
}

impl NotePairer {
    fn new(ppq: u16, track: usize, us_per_quarter: u32) -> Self {
        Self {
            ppq,
            track,
            us_per_quarter,
            tick: 0,
            sec: 0.0,
            pending: HashMap::new(),
            last_end: HashMap::new(),
            notes: Vec::new(),
        }
    }

    /// Moves the track clock to `tick` at the tempo in force before it.
    fn advance_to(&mut self, tick: Tick) {
        self.sec += ticks_to_seconds(tick - self.tick, self.us_per_quarter, self.ppq);
        self.tick = tick;
    }

    fn set_tempo(&mut self, us_per_quarter: u32) {
        self.us_per_quarter = us_per_quarter;
    }

    /// A second note-on for a sounding pitch replaces the pending onset.
    fn note_on(&mut self, pitch: u8, velocity: u8) {
        let mut start_tick = self.tick;
        let mut start_sec = self.sec;
        // Same-pitch notes on one track never overlap: start no earlier than the previous end.
        if let Some(&(end_tick, end_sec)) = self.last_end.get(&pitch) {
            if self.tick < end_tick {
                start_tick = end_tick;
                start_sec = end_sec;
            }
        }

        self.pending.insert(
            pitch,
            PendingNote {
                velocity,
                start_tick,
                start_sec,
                us_per_quarter: self.us_per_quarter,
            },
        );
    }

    fn note_off(&mut self, pitch: u8) {
        let Some(note) = self.pending.remove(&pitch) else {
            return;
        };

        let min_sec = MIN_NOTE_SECONDS.max(ticks_to_seconds(1, note.us_per_quarter, self.ppq));
        let mut duration_ticks = self.tick - note.start_tick;
        let mut duration_sec = self.sec - note.start_sec;
        if duration_ticks <= 1 {
            duration_ticks = 1;
            duration_sec = min_sec;
        } else {
            duration_sec = duration_sec.max(min_sec);
        }

        self.last_end.insert(
            pitch,
            (note.start_tick + duration_ticks, note.start_sec + duration_sec),
        );
        self.notes.push(NoteEvent {
            pitch,
            velocity: note.velocity,
            start_sec: note.start_sec,
            duration_sec,
            start_tick: note.start_tick,
            duration_ticks,
            track: self.track,
        });
    }

    fn finish(self) -> Vec<NoteEvent> {
        if !self.pending.is_empty() {
            tracing::debug!(
                track = self.track,
                dangling = self.pending.len(),
                "dropping notes without a note-off"
            );
        }
        self.notes
    }
}

fn build_tempo_points(
    tempo_points: BTreeMap<Tick, u32>,
    override_us_per_quarter: Option<u32>,
) -> Vec<TempoPoint> {
    if let Some(us_per_quarter) = override_us_per_quarter {
        return vec![TempoPoint {
            tick: 0,
            us_per_quarter,
        }];
    }

    let mut map: Vec<TempoPoint> = tempo_points
        .into_iter()
        .map(|(tick, us_per_quarter)| TempoPoint {
            tick,
            us_per_quarter,
        })
        .collect();

    if map.is_empty() || map[0].tick != 0 {
        map.insert(
            0,
            TempoPoint {
                tick: 0,
                us_per_quarter: DEFAULT_US_PER_QUARTER,
            },
        );
    }
    map
}

fn average_tempo(values: &[u32]) -> f64 {
    if values.is_empty() {
        return DEFAULT_US_PER_QUARTER as f64;
    }
    values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64
}

fn timecode_ppq_and_tempo(fps: Fps, ticks_per_frame: u8) -> (u16, u32) {
    let ticks_per_frame = ticks_per_frame.max(1) as u16;
    match fps {
        Fps::Fps24 => (24 * ticks_per_frame, 1_000_000),
        Fps::Fps25 => (25 * ticks_per_frame, 1_000_000),
        Fps::Fps30 => (30 * ticks_per_frame, 1_000_000),
        Fps::Fps29 => (30 * ticks_per_frame, 1_001_000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_tempo_defaults_without_tempo_messages() {
        assert_eq!(average_tempo(&[]), 500_000.0);
        assert_eq!(average_tempo(&[400_000, 600_000]), 500_000.0);
    }

    #[test]
    fn timecode_maps_to_one_second_quarters() {
        assert_eq!(timecode_ppq_and_tempo(Fps::Fps25, 40), (1000, 1_000_000));
        assert_eq!(timecode_ppq_and_tempo(Fps::Fps24, 0), (24, 1_000_000));
    }
}
