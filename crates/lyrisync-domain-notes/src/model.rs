use lyrisync_ports::types::{Seconds, Tick};
use serde::{Deserialize, Serialize};

pub const DEFAULT_US_PER_QUARTER: u32 = 500_000;
pub const MIN_NOTE_SECONDS: Seconds = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoPoint {
    pub tick: Tick,
    pub us_per_quarter: u32,
}

/// One sounding note, immutable once extracted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub start_sec: Seconds,
    pub duration_sec: Seconds,
    pub start_tick: Tick,
    pub duration_ticks: Tick,
    pub track: usize,
}

impl NoteEvent {
    pub fn end_sec(&self) -> Seconds {
        self.start_sec + self.duration_sec
    }

    pub fn end_tick(&self) -> Tick {
        self.start_tick + self.duration_ticks
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extraction {
    /// Notes paired from note-on/note-off messages per track.
    Paired,
    /// Notes rebuilt from onsets only, with durations taken from onset gaps.
    Fallback,
}

/// Everything the rest of the pipeline needs from a MIDI file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Performance {
    pub ppq: u16,
    pub tempo_map: Vec<TempoPoint>,
    /// Sorted by `start_sec`, ties kept in extraction order.
    pub notes: Vec<NoteEvent>,
    pub total_duration_sec: Seconds,
    pub extraction: Extraction,
}

impl Performance {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
