use crate::types::Canvas;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum VideoError {
    #[error("encoder unavailable: {0}")]
    Spawn(String),
    #[error("codec rejected: {0}")]
    CodecRejected(String),
    #[error("frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },
    #[error("frame write failed: {0}")]
    Write(String),
    #[error("encoder finish failed: {0}")]
    Finish(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoSpec {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
}

impl VideoSpec {
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Open encoder stream: dropping it without `finish` aborts the output.
pub trait FrameWriter: Send {
    fn write_frame(&mut self, frame: &Canvas) -> Result<(), VideoError>;

    fn finish(self: Box<Self>) -> Result<(), VideoError>;
}

pub trait VideoEncoderPort: Send + Sync {
    /// Opens a stream for `spec`; fails with `CodecRejected` when the codec cannot
    /// encode at the requested dimensions.
    fn open(&self, spec: &VideoSpec) -> Result<Box<dyn FrameWriter>, VideoError>;
}
