use lyrisync_ports::render::RenderEvent;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub frames_done: u64,
    pub frames_total: u64,
}

impl ProgressSnapshot {
    pub fn fraction(&self) -> f32 {
        if self.frames_total == 0 {
            return 0.0;
        }
        self.frames_done as f32 / self.frames_total as f32
    }
}

/// One JSON object per line, for machine-readable progress output.
pub fn encode_event_line(event: &RenderEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}
