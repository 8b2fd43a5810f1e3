// In-memory implementations for examples and testing
//
// RecordingBackend keeps everything it is asked to send in memory and can be
// told to be slow, to never finish, or to misbehave, which is what the
// dispatcher and facade tests need.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::ReportingBackend;
use crate::handle::{AbortHandle, DispatchHandle};
use crate::report::{ErrorContext, ErrorReport};
use crate::task::TaskEvent;

/// An error report as seen by a RecordingBackend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReport {
    pub message: String,
    pub context: Option<ErrorContext>,
}

#[derive(Default)]
struct RecordingState {
    task_hits: Mutex<Vec<TaskEvent>>,
    error_reports: Mutex<Vec<RecordedReport>>,
    completed_task_hits: AtomicUsize,
    completed_error_reports: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latency {
    Immediate,
    Delayed(Duration),
    Never,
}

impl Latency {
    async fn wait(self) {
        match self {
            Latency::Immediate => {}
            Latency::Delayed(delay) => tokio::time::sleep(delay).await,
            Latency::Never => futures::future::pending::<()>().await,
        }
    }
}

/// In-memory backend that records every send
///
/// Cloning shares the recorded state.
#[derive(Clone)]
pub struct RecordingBackend {
    name: &'static str,
    state: Arc<RecordingState>,
    latency: Latency,
    panic_on_send: bool,
    panic_in_flight: bool,
    panicking_abort: bool,
}

impl RecordingBackend {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(RecordingState::default()),
            latency: Latency::Immediate,
            panic_on_send: false,
            panic_in_flight: false,
            panicking_abort: false,
        }
    }

    /// Finish every send after `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.latency = Latency::Delayed(delay);
        self
    }

    /// Never finish a send
    pub fn hanging(mut self) -> Self {
        self.latency = Latency::Never;
        self
    }

    /// Panic inside `send_task_hit` before returning a handle
    pub fn panicking_on_send(mut self) -> Self {
        self.panic_on_send = true;
        self
    }

    /// Panic inside the send itself, after it was started
    pub fn panicking_in_flight(mut self) -> Self {
        self.panic_in_flight = true;
        self
    }

    /// Return task hit handles whose abort panics
    pub fn with_panicking_abort(mut self) -> Self {
        self.panicking_abort = true;
        self
    }

    /// Task hits received so far (including unfinished ones)
    pub fn task_hits(&self) -> Vec<TaskEvent> {
        lock(&self.state.task_hits).clone()
    }

    /// Error reports received so far (including unfinished ones)
    pub fn error_reports(&self) -> Vec<RecordedReport> {
        lock(&self.state.error_reports).clone()
    }

    /// Task hits whose send ran to completion
    pub fn completed_task_hits(&self) -> usize {
        self.state.completed_task_hits.load(Ordering::SeqCst)
    }

    /// Error reports whose send ran to completion
    pub fn completed_error_reports(&self) -> usize {
        self.state.completed_error_reports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportingBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn send_task_hit(&self, event: &TaskEvent) -> DispatchHandle {
        if self.panic_on_send {
            panic!("{} failed to start a task hit", self.name);
        }

        lock(&self.state.task_hits).push(event.clone());

        let state = self.state.clone();
        let latency = self.latency;
        let panic_in_flight = self.panic_in_flight;
        let name = self.name;
        let handle = DispatchHandle::spawn(self.name, async move {
            latency.wait().await;
            if panic_in_flight {
                panic!("{} failed while sending a task hit", name);
            }
            state.completed_task_hits.fetch_add(1, Ordering::SeqCst);
        });

        if !self.panicking_abort {
            return handle;
        }

        let (abort, completion) = handle.into_parts();
        let abort = AbortHandle::merge(vec![
            AbortHandle::from_fn(|| panic!("abort failed")),
            abort,
        ]);
        DispatchHandle::new(abort, completion)
    }

    async fn send_error_report(&self, report: &ErrorReport) {
        lock(&self.state.error_reports).push(RecordedReport {
            message: report.message(),
            context: report.context().cloned(),
        });

        self.latency.wait().await;
        if self.panic_in_flight {
            panic!("{} failed while sending an error report", self.name);
        }
        self.state
            .completed_error_reports
            .fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
