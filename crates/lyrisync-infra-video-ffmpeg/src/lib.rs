use lyrisync_ports::types::Canvas;
use lyrisync_ports::video::{FrameWriter, VideoEncoderPort, VideoError, VideoSpec};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::ffi::OsString;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

const DEFAULT_BINARY: &str = "ffmpeg";
const STDERR_TAIL_LINES: usize = 16;

/// Encodes through an `ffmpeg` sidecar fed raw RGBA frames on stdin.
pub struct FfmpegEncoderPort {
    binary: PathBuf,
    /// Trial-encode results keyed by (codec, width, height).
    trials: Mutex<HashMap<(String, u32, u32), bool>>,
}

impl FfmpegEncoderPort {
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_BINARY)
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            trials: Mutex::new(HashMap::new()),
        }
    }

    fn spawn_error(&self, err: std::io::Error) -> VideoError {
        if err.kind() == ErrorKind::NotFound {
            VideoError::Spawn(format!(
                "{} was not found on PATH; install ffmpeg and check `ffmpeg -version`",
                self.binary.display()
            ))
        } else {
            VideoError::Spawn(format!("failed to start {}: {err}", self.binary.display()))
        }
    }

    /// Encodes one synthetic frame to the null muxer with `spec.codec`.
    fn trial_encode(&self, spec: &VideoSpec) -> Result<(), VideoError> {
        let key = (spec.codec.clone(), spec.width, spec.height);
        if let Some(&accepted) = self.trials.lock().get(&key) {
            return if accepted {
                Ok(())
            } else {
                Err(VideoError::CodecRejected(spec.codec.clone()))
            };
        }

        let output = Command::new(&self.binary)
            .args(trial_args(spec))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| self.spawn_error(e))?;
        let accepted = output.status.success();
        self.trials.lock().insert(key, accepted);

        if accepted {
            tracing::debug!(codec = %spec.codec, "codec trial encode passed");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(codec = %spec.codec, stderr = %stderr.trim(), "codec trial encode failed");
            Err(VideoError::CodecRejected(format!(
                "{} ({})",
                spec.codec,
                last_line(&stderr).unwrap_or("trial encode failed")
            )))
        }
    }
}

impl Default for FfmpegEncoderPort {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoderPort for FfmpegEncoderPort {
    fn open(&self, spec: &VideoSpec) -> Result<Box<dyn FrameWriter>, VideoError> {
        self.trial_encode(spec)?;

        let mut child = Command::new(&self.binary)
            .args(encode_args(spec))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        let pipes = child.stdin.take().zip(child.stderr.take());
        let Some((stdin, stderr)) = pipes else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(VideoError::Spawn(
                "failed to capture ffmpeg stdio".to_string(),
            ));
        };
        let stderr = match drain_stderr(stderr) {
            Ok(handle) => handle,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(VideoError::Spawn(format!(
                    "failed to start ffmpeg stderr reader: {e}"
                )));
            }
        };

        tracing::info!(
            codec = %spec.codec,
            path = %spec.path.display(),
            "ffmpeg encoder started"
        );
        Ok(Box::new(FfmpegWriter {
            child: Some(child),
            stdin: Some(stdin),
            stderr: Some(stderr),
            frame_bytes: spec.frame_bytes(),
        }))
    }
}

/// Reads ffmpeg's stderr until EOF so the pipe never fills while frames are
/// being written. Yields the last few non-empty lines.
fn drain_stderr<R>(stream: R) -> std::io::Result<JoinHandle<Vec<String>>>
where
    R: Read + Send + 'static,
{
    std::thread::Builder::new()
        .name("lyrisync-ffmpeg-stderr".to_string())
        .spawn(move || {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            for line in BufReader::new(stream).split(b'\n') {
                let Ok(line) = line else { break };
                let line = String::from_utf8_lossy(&line).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                tracing::debug!(target: "ffmpeg", "{line}");
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Vec::from(tail)
        })
}

struct FfmpegWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<Vec<String>>>,
    frame_bytes: usize,
}

impl FfmpegWriter {
    fn stderr_tail(&mut self) -> Vec<String> {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl FrameWriter for FfmpegWriter {
    fn write_frame(&mut self, frame: &Canvas) -> Result<(), VideoError> {
        let bytes = frame.as_bytes();
        if bytes.len() != self.frame_bytes {
            return Err(VideoError::FrameSize {
                expected: self.frame_bytes,
                actual: bytes.len(),
            });
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| VideoError::Write("encoder input already closed".to_string()))?;
        stdin
            .write_all(bytes)
            .map_err(|e| VideoError::Write(e.to_string()))
    }

    fn finish(mut self: Box<Self>) -> Result<(), VideoError> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .flush()
                .map_err(|e| VideoError::Finish(e.to_string()))?;
        }
        let mut child = self
            .child
            .take()
            .ok_or_else(|| VideoError::Finish("encoder already finished".to_string()))?;
        let status = child
            .wait()
            .map_err(|e| VideoError::Finish(format!("failed waiting for ffmpeg: {e}")))?;
        let tail = self.stderr_tail();
        if !status.success() {
            return Err(VideoError::Finish(format!(
                "ffmpeg exited with {status}: {}",
                tail.last().map(String::as_str).unwrap_or("no diagnostics")
            )));
        }
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            tracing::warn!("ffmpeg encoder dropped before finishing, killing it");
            let _ = child.kill();
            let _ = child.wait();
        }
        self.stderr_tail();
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

fn common_args() -> Vec<OsString> {
    ["-hide_banner", "-loglevel", "error", "-nostdin"]
        .iter()
        .map(OsString::from)
        .collect()
}

pub fn trial_args(spec: &VideoSpec) -> Vec<OsString> {
    let mut args = common_args();
    args.extend(
        [
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!(
                "color=c=black:s={}x{}:r={}",
                spec.width, spec.height, spec.fps
            ),
            "-frames:v".to_string(),
            "1".to_string(),
            "-c:v".to_string(),
            spec.codec.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ]
        .map(OsString::from),
    );
    args
}

pub fn encode_args(spec: &VideoSpec) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y"]
        .iter()
        .map(OsString::from)
        .collect();
    args.extend(
        [
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s:v".to_string(),
            format!("{}x{}", spec.width, spec.height),
            "-r".to_string(),
            spec.fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-an".to_string(),
            "-c:v".to_string(),
            spec.codec.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ]
        .map(OsString::from),
    );
    args.push(spec.path.clone().into_os_string());
    args
}
