use crate::ipc::ProgressSnapshot;
use crate::job::{run_render, RenderError, RenderPorts, RenderRequest, RenderSummary};
use lyrisync_ports::render::{RenderEvent, RenderObserver};
use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Cooperative cancellation flag, checked by the render loop between frames.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Observer living on the render thread.
///
/// Progress goes through the lock-free queue and is dropped when it cannot be
/// queued. Log lines and the final result spill into `backlog` once the queue
/// is full, and keep going there until the backlog is drained, so the
/// consumer sees them in emission order.
struct QueueObserver {
    events: Producer<RenderEvent>,
    backlog: Arc<Mutex<VecDeque<RenderEvent>>>,
    progress: Arc<Mutex<ProgressSnapshot>>,
}

impl RenderObserver for QueueObserver {
    fn on_event(&mut self, event: RenderEvent) {
        let is_progress = if let RenderEvent::Progress {
            frames_done,
            frames_total,
        } = event
        {
            *self.progress.lock() = ProgressSnapshot {
                frames_done,
                frames_total,
            };
            true
        } else {
            false
        };

        let mut backlog = self.backlog.lock();
        if !backlog.is_empty() {
            if !is_progress {
                backlog.push_back(event);
            }
            return;
        }
        if let Err(rtrb::PushError::Full(event)) = self.events.push(event) {
            if !is_progress {
                backlog.push_back(event);
            }
        }
    }
}

/// Everything queued so far, oldest first: the ring only ever holds events
/// older than the backlog.
fn drain_events(
    events: &mut Consumer<RenderEvent>,
    backlog: &Mutex<VecDeque<RenderEvent>>,
) -> Vec<RenderEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.pop() {
        out.push(event);
    }
    out.extend(backlog.lock().drain(..));
    out
}

pub struct RenderWorker;

impl RenderWorker {
    /// Starts `request` on a dedicated thread.
    pub fn spawn(request: RenderRequest, ports: RenderPorts) -> Result<RenderHandle, RenderError> {
        let cancel = CancelToken::new();
        let (producer, consumer) = RingBuffer::new(EVENT_QUEUE_CAPACITY);
        let backlog = Arc::new(Mutex::new(VecDeque::new()));
        let progress = Arc::new(Mutex::new(ProgressSnapshot::default()));

        let mut observer = QueueObserver {
            events: producer,
            backlog: Arc::clone(&backlog),
            progress: Arc::clone(&progress),
        };
        let thread_cancel = cancel.clone();
        let join = std::thread::Builder::new()
            .name("lyrisync-render".to_string())
            .spawn(move || run_render(&request, &ports, &mut observer, &thread_cancel))
            .map_err(|e| RenderError::Runtime(format!("failed to start render thread: {e}")))?;

        Ok(RenderHandle {
            cancel,
            events: consumer,
            backlog,
            progress,
            join,
        })
    }
}

/// Controlling-thread side of a running render.
pub struct RenderHandle {
    cancel: CancelToken,
    events: Consumer<RenderEvent>,
    backlog: Arc<Mutex<VecDeque<RenderEvent>>>,
    progress: Arc<Mutex<ProgressSnapshot>>,
    join: JoinHandle<Result<RenderSummary, RenderError>>,
}

impl RenderHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        *self.progress.lock()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Drains every event produced so far, without blocking.
    pub fn poll_events(&mut self) -> Vec<RenderEvent> {
        drain_events(&mut self.events, &self.backlog)
    }

    /// Waits for the render thread and returns its result.
    pub fn join(self) -> Result<RenderSummary, RenderError> {
        self.join
            .join()
            .map_err(|_| RenderError::Runtime("render thread panicked".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyrisync_ports::render::LogLevel;

    fn log(message: &str) -> RenderEvent {
        RenderEvent::Log {
            level: LogLevel::Info,
            message: message.to_string(),
        }
    }

    fn observer(capacity: usize) -> (QueueObserver, Consumer<RenderEvent>) {
        let (producer, consumer) = RingBuffer::new(capacity);
        let observer = QueueObserver {
            events: producer,
            backlog: Arc::new(Mutex::new(VecDeque::new())),
            progress: Arc::new(Mutex::new(ProgressSnapshot::default())),
        };
        (observer, consumer)
    }

    #[test]
    fn spilled_events_keep_emission_order() {
        let (mut observer, mut consumer) = observer(2);
        observer.on_event(log("one"));
        observer.on_event(log("two"));
        observer.on_event(log("three"));

        // The consumer frees a slot before the next event arrives.
        assert_eq!(consumer.pop().ok(), Some(log("one")));
        observer.on_event(log("four"));

        assert_eq!(
            drain_events(&mut consumer, &observer.backlog),
            vec![log("two"), log("three"), log("four")]
        );

        observer.on_event(log("five"));
        assert_eq!(consumer.slots(), 1);
        assert_eq!(drain_events(&mut consumer, &observer.backlog), vec![log("five")]);
    }

    #[test]
    fn progress_is_dropped_while_backlogged_but_snapshot_tracks_it() {
        let (mut observer, mut consumer) = observer(1);
        observer.on_event(log("one"));
        observer.on_event(log("two"));
        observer.on_event(RenderEvent::Progress {
            frames_done: 3,
            frames_total: 9,
        });

        assert_eq!(
            *observer.progress.lock(),
            ProgressSnapshot {
                frames_done: 3,
                frames_total: 9
            }
        );
        assert_eq!(
            drain_events(&mut consumer, &observer.backlog),
            vec![log("one"), log("two")]
        );
    }
}
