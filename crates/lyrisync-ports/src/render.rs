use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RenderEvent {
    Log { level: LogLevel, message: String },
    Progress { frames_done: u64, frames_total: u64 },
    /// Emitted exactly once per run.
    Finished { success: bool, message: String },
}

/// Receives log lines, progress and the terminal result of a render run.
///
/// Called from the render thread after every frame: implementations must return quickly.
pub trait RenderObserver {
    fn on_event(&mut self, event: RenderEvent);
}

impl<F> RenderObserver for F
where
    F: FnMut(RenderEvent),
{
    fn on_event(&mut self, event: RenderEvent) {
        self(event)
    }
}
