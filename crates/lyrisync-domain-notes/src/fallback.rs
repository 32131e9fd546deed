use crate::model::{NoteEvent, MIN_NOTE_SECONDS};
use crate::tempo::{seconds_to_ticks, TempoMap};
use lyrisync_ports::types::{Seconds, Tick};

const LAST_NOTE_SECONDS: Seconds = 0.2;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Onset {
    pub tick: Tick,
    pub track: usize,
    pub pitch: u8,
    pub velocity: u8,
}

/// Rebuilds notes from onsets alone: each note lasts until the next onset of the
/// merged stream, the last one until `total_duration_sec`.
pub(crate) fn rebuild_from_onsets(
    mut onsets: Vec<Onset>,
    tempo_map: &TempoMap,
    average_us_per_quarter: f64,
    total_duration_sec: Seconds,
) -> Vec<NoteEvent> {
    onsets.sort_by_key(|onset| onset.tick);
    let ppq = tempo_map.ppq();
    let min_ticks = ((ppq as f64 * 0.1) as Tick).max(1);
    let starts: Vec<Seconds> = onsets
        .iter()
        .map(|onset| tempo_map.tick_to_seconds(onset.tick))
        .collect();

    onsets
        .iter()
        .enumerate()
        .map(|(idx, onset)| {
            let start_sec = starts[idx];
            let gap = match starts.get(idx + 1) {
                Some(next) => next - start_sec,
                None if total_duration_sec > start_sec => total_duration_sec - start_sec,
                None => LAST_NOTE_SECONDS,
            };
            let duration_sec = gap.max(MIN_NOTE_SECONDS);
            let ticks = seconds_to_ticks(duration_sec, average_us_per_quarter, ppq) as Tick;
            NoteEvent {
                pitch: onset.pitch,
                velocity: onset.velocity,
                start_sec,
                duration_sec,
                start_tick: onset.tick,
                duration_ticks: if ticks > 0 { ticks } else { min_ticks },
                track: onset.track,
            }
        })
        .collect()
}
