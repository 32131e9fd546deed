use crate::model::{TempoPoint, DEFAULT_US_PER_QUARTER};
use lyrisync_ports::types::{Seconds, Tick};

#[derive(Clone, Debug)]
pub struct TempoMap {
    ppq: u16,
    segments: Vec<TempoSegment>,
}

#[derive(Clone, Copy, Debug)]
struct TempoSegment {
    start_tick: Tick,
    start_sec: Seconds,
    us_per_quarter: u32,
}

impl TempoMap {
    pub fn new(ppq: u16, mut points: Vec<TempoPoint>) -> Self {
        let ppq = ppq.max(1);
        points.sort_by_key(|p| p.tick);
        if points.is_empty() || points[0].tick != 0 {
            points.insert(
                0,
                TempoPoint {
                    tick: 0,
                    us_per_quarter: DEFAULT_US_PER_QUARTER,
                },
            );
        }

        let mut segments: Vec<TempoSegment> = Vec::with_capacity(points.len());
        let mut current_sec = 0.0;
        for (idx, point) in points.iter().enumerate() {
            if idx > 0 {
                let prev = &points[idx - 1];
                current_sec += ticks_to_seconds(point.tick - prev.tick, prev.us_per_quarter, ppq);
            }
            segments.push(TempoSegment {
                start_tick: point.tick,
                start_sec: current_sec,
                us_per_quarter: point.us_per_quarter,
            });
        }

        Self { ppq, segments }
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn tick_to_seconds(&self, tick: Tick) -> Seconds {
        let seg = self.segment_for_tick(tick);
        seg.start_sec + ticks_to_seconds(tick - seg.start_tick, seg.us_per_quarter, self.ppq)
    }

    fn segment_for_tick(&self, tick: Tick) -> TempoSegment {
        let idx = self.segments.partition_point(|seg| seg.start_tick <= tick);
        self.segments[idx.saturating_sub(1)]
    }
}

/// `seconds_per_tick = us_per_quarter / 1e6 / ppq`
pub fn ticks_to_seconds(ticks: Tick, us_per_quarter: u32, ppq: u16) -> Seconds {
    ticks as f64 * us_per_quarter as f64 / 1_000_000.0 / ppq.max(1) as f64
}

pub fn seconds_to_ticks(seconds: Seconds, us_per_quarter: f64, ppq: u16) -> f64 {
    if us_per_quarter <= 0.0 {
        return 0.0;
    }
    seconds * 1_000_000.0 * ppq.max(1) as f64 / us_per_quarter
}
