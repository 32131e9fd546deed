mod args;

use anyhow::{Context, Result};
use args::Args;
use clap::Parser;
use lyrisync_core::{
    encode_event_line, CancelToken, RenderError, RenderPorts, RenderRequest, RenderWorker,
};
use lyrisync_infra_font_fontdue::FontdueFontPort;
use lyrisync_infra_storage_fs::FsSettingsStore;
use lyrisync_infra_video_ffmpeg::FfmpegEncoderPort;
use lyrisync_ports::render::RenderEvent;
use lyrisync_ports::settings::SettingsStore;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(16);

fn exit_code(err: &RenderError) -> ExitCode {
    match err {
        RenderError::Input(_) => ExitCode::from(2),
        RenderError::Parse(_) => ExitCode::from(3),
        RenderError::Resource(_) => ExitCode::from(4),
        RenderError::Runtime(_) => ExitCode::from(5),
        RenderError::Cancelled => ExitCode::from(130),
    }
}

/// Cancels the render on the first Ctrl-C. The listener thread is left
/// detached and dies with the process.
fn cancel_on_interrupt(cancel: CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    std::thread::Builder::new()
        .name("lyrisync-signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling render");
                    cancel.cancel();
                }
            })
        })
        .context("failed to start signal listener")?;
    Ok(())
}

/// Prints a percentage line on stderr whenever the whole percent changes.
struct ProgressLine {
    last_percent: Option<u64>,
}

impl ProgressLine {
    fn update(&mut self, frames_done: u64, frames_total: u64) {
        if frames_total == 0 {
            return;
        }
        let percent = frames_done * 100 / frames_total;
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\rrendering {percent:>3}% ({frames_done}/{frames_total})");
        if frames_done == frames_total {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = match &args.config {
        Some(path) => FsSettingsStore::with_path(path),
        None => FsSettingsStore::default(),
    };
    let mut settings = store
        .load_settings()
        .with_context(|| format!("failed to load settings from {}", store.path().display()))?;
    args.overrides.apply(&mut settings);
    if args.save_settings {
        store
            .save_settings(&settings)
            .with_context(|| format!("failed to save settings to {}", store.path().display()))?;
    }

    info!("lyrisync {} starting", env!("CARGO_PKG_VERSION"));
    let request = RenderRequest {
        midi_path: args.midi,
        lyrics_path: args.lyrics,
        output_path: args.output,
        settings,
    };
    let ports = RenderPorts {
        font: Arc::new(FontdueFontPort::new()),
        encoder: Arc::new(FfmpegEncoderPort::new()),
    };

    let mut handle = RenderWorker::spawn(request, ports)?;
    cancel_on_interrupt(handle.cancel_token())?;
    let mut progress = ProgressLine { last_percent: None };
    let mut stdout = std::io::stdout().lock();
    loop {
        let finished = handle.is_finished();
        for event in handle.poll_events() {
            if args.json {
                writeln!(stdout, "{}", encode_event_line(&event)?)?;
            } else if let RenderEvent::Progress {
                frames_done,
                frames_total,
            } = event
            {
                progress.update(frames_done, frames_total);
            }
        }
        if finished {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    stdout.flush()?;

    match handle.join() {
        Ok(summary) => {
            info!(
                frames = summary.frames,
                codec = %summary.codec,
                "render complete"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Ok(exit_code(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_listener_starts_without_cancelling() {
        let cancel = CancelToken::new();
        cancel_on_interrupt(cancel.clone()).expect("listener");
        assert!(!cancel.is_cancelled());
    }
}
