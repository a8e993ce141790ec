use crate::error::{ControlError, ControlResult, TaskKind};
use crate::timebase::STOP_POLL;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A named worker thread with its own stop flag.
pub struct TaskHandle<T> {
    kind: TaskKind,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub fn spawn<F>(kind: TaskKind, body: F) -> ControlResult<Self>
    where
        F: FnOnce(&AtomicBool) -> T + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(thread_name(kind))
            .spawn(move || body(&flag))
            .map_err(|source| ControlError::Spawn { task: kind, source })?;
        Ok(Self { kind, stop, handle })
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Raises the stop flag and waits up to `timeout` for the thread to exit.
    ///
    /// On timeout the thread is left detached and `TerminationTimeout` is
    /// returned; the caller must make the task's outputs safe itself.
    pub fn stop_and_join(self, timeout: Duration) -> ControlResult<T> {
        self.request_stop();
        let deadline = Instant::now() + timeout;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                return Err(ControlError::TerminationTimeout {
                    task: self.kind,
                    waited: timeout,
                });
            }
            thread::sleep(STOP_POLL.min(deadline.saturating_duration_since(Instant::now())));
        }
        self.join()
    }

    /// Joins a thread that has already finished on its own.
    pub fn join(self) -> ControlResult<T> {
        let kind = self.kind;
        self.handle
            .join()
            .map_err(|_| ControlError::TaskPanicked { task: kind })
    }
}

fn thread_name(kind: TaskKind) -> String {
    match kind {
        TaskKind::Heater(vessel) => format!("{vessel}-heater"),
        TaskKind::Logger => "sample-logger".to_string(),
    }
}
