// Dispatch handles
//
// An in-flight send is modelled as an explicit pair: an AbortHandle (a
// best-effort cancellation request) and a Completion (a future that always
// resolves). Neither half ever reports an error to its owner.

use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use tracing::debug;

type AbortFn = Box<dyn Fn() + Send + Sync>;

struct AbortInner {
    fired: AtomicBool,
    aborts: Vec<AbortFn>,
}

/// Cancellation side of a dispatch
///
/// Cloning shares the same underlying request: whichever clone calls
/// `abort()` first runs every registered abort, every later call is a no-op.
#[derive(Clone)]
pub struct AbortHandle {
    inner: Arc<AbortInner>,
}

impl AbortHandle {
    fn from_fns(aborts: Vec<AbortFn>) -> Self {
        Self {
            inner: Arc::new(AbortInner {
                fired: AtomicBool::new(false),
                aborts,
            }),
        }
    }

    /// An abort that does nothing
    pub fn noop() -> Self {
        Self::from_fns(Vec::new())
    }

    /// Wrap an arbitrary cancellation callback
    pub fn from_fn(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::from_fns(vec![Box::new(f)])
    }

    /// Abort a spawned Tokio task
    pub fn from_task(handle: tokio::task::AbortHandle) -> Self {
        Self::from_fn(move || handle.abort())
    }

    /// Combine several aborts into one
    ///
    /// Every constituent is invoked even when another one panics.
    pub fn merge(handles: impl IntoIterator<Item = AbortHandle>) -> Self {
        let aborts = handles
            .into_iter()
            .map(|handle| Box::new(move || handle.abort()) as AbortFn)
            .collect();
        Self::from_fns(aborts)
    }

    /// Request cancellation
    pub fn abort(&self) {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            return;
        }

        for abort in &self.inner.aborts {
            if catch_unwind(AssertUnwindSafe(|| abort())).is_err() {
                debug!("Abort callback panicked; remaining aborts still invoked");
            }
        }
    }

    /// Whether `abort()` has been called on this handle (or a clone of it)
    pub fn is_aborted(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortHandle")
            .field("aborts", &self.inner.aborts.len())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Completion side of a dispatch
///
/// Resolves once the underlying send(s) finished, failed or were aborted.
/// Never fails.
pub struct Completion {
    inner: BoxFuture<'static, ()>,
}

impl Completion {
    /// Wrap a future as a completion
    pub fn new(fut: impl Future<Output = ()> + Send + 'static) -> Self {
        Self { inner: fut.boxed() }
    }

    /// An already-resolved completion
    pub fn ready() -> Self {
        Self::new(future::ready(()))
    }

    /// Resolve only after every given completion resolved (join, not race)
    pub fn join_all(completions: impl IntoIterator<Item = Completion>) -> Self {
        let completions: Vec<Completion> = completions.into_iter().collect();
        if completions.is_empty() {
            return Self::ready();
        }
        Self::new(future::join_all(completions).map(|_| ()))
    }
}

impl Future for Completion {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// One in-flight fan-out: an abort request paired with its completion
///
/// Owned by whoever received it; nothing else keeps a reference.
#[derive(Debug)]
pub struct DispatchHandle {
    abort: AbortHandle,
    completion: Completion,
}

impl DispatchHandle {
    /// Pair an abort with a completion
    pub fn new(abort: AbortHandle, completion: Completion) -> Self {
        Self { abort, completion }
    }

    /// A handle with nothing in flight
    pub fn noop() -> Self {
        Self::new(AbortHandle::noop(), Completion::ready())
    }

    /// Start `fut` immediately on the current Tokio runtime
    ///
    /// Aborting cancels the task at its next suspension point. Outside of a
    /// runtime the future is only driven when the completion is polled.
    pub fn spawn<F>(backend: &'static str, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(fut);
                let abort = AbortHandle::from_task(task.abort_handle());
                let completion = Completion::new(async move {
                    match task.await {
                        Ok(()) => {}
                        Err(e) if e.is_cancelled() => {
                            debug!(backend = backend, "Send aborted");
                        }
                        Err(e) => {
                            debug!(backend = backend, error = %e, "Send task failed");
                        }
                    }
                });
                Self::new(abort, completion)
            }
            Err(_) => {
                debug!(
                    backend = backend,
                    "No async runtime; send deferred until completion is polled"
                );
                let (fut, registration) =
                    future::abortable(AssertUnwindSafe(fut).catch_unwind());
                let abort = AbortHandle::from_fn(move || registration.abort());
                let completion = fut.map(move |outcome| match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => debug!(backend = backend, "Send panicked"),
                    Err(_) => debug!(backend = backend, "Send aborted"),
                });
                Self::new(abort, Completion::new(completion))
            }
        }
    }

    /// Merge several handles: composite abort, joined completion
    pub fn merge(handles: impl IntoIterator<Item = DispatchHandle>) -> Self {
        let (aborts, completions): (Vec<_>, Vec<_>) = handles
            .into_iter()
            .map(|handle| (handle.abort, handle.completion))
            .unzip();

        Self::new(AbortHandle::merge(aborts), Completion::join_all(completions))
    }

    /// Request cancellation of everything in flight
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// A clone of the abort side, usable after the completion is consumed
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Split into the abort and completion halves
    pub fn into_parts(self) -> (AbortHandle, Completion) {
        (self.abort, self.completion)
    }

    /// Wait for every send to finish
    pub async fn wait(self) {
        self.completion.await
    }

    /// Wait at most `timeout`, then abort whatever is still in flight
    ///
    /// Returns true when everything finished in time.
    pub async fn settle_within(self, timeout: Duration) -> bool {
        let Self { abort, completion } = self;
        match tokio::time::timeout(timeout, completion).await {
            Ok(()) => true,
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Dispatch timed out, aborting");
                abort.abort();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_abort(counter: &Arc<AtomicUsize>) -> AbortHandle {
        let counter = counter.clone();
        AbortHandle::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_abort_is_idempotent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let abort = counting_abort(&counter);

        abort.abort();
        abort.abort();
        abort.clone().abort();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(abort.is_aborted());
    }

    #[test]
    fn test_merged_abort_survives_panicking_constituent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let merged = AbortHandle::merge(vec![
            counting_abort(&counter),
            AbortHandle::from_fn(|| panic!("abort exploded")),
            counting_abort(&counter),
        ]);

        merged.abort();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_noop_handle_is_ready() {
        let handle = DispatchHandle::noop();
        handle.abort();
        let (_, completion) = handle.into_parts();
        assert!(completion.now_or_never().is_some());
    }

    #[test]
    fn test_join_all_empty_is_ready() {
        assert!(Completion::join_all(Vec::new()).now_or_never().is_some());
    }

    #[tokio::test]
    async fn test_join_all_waits_for_every_completion() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut joined = Completion::join_all(vec![
            Completion::ready(),
            Completion::new(async move {
                let _ = rx.await;
            }),
        ]);

        assert!(futures::poll!(&mut joined).is_pending());
        tx.send(()).unwrap();
        joined.await;
    }

    #[tokio::test]
    async fn test_spawned_send_starts_without_polling() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = DispatchHandle::spawn("test", async move {
            let _ = tx.send(());
        });

        // The send runs even though the completion is never awaited
        rx.await.unwrap();
        drop(handle);
    }

    #[tokio::test]
    async fn test_abort_stops_spawned_send() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let handle = DispatchHandle::spawn("test", async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            flag.store(true, Ordering::SeqCst);
        });

        handle.abort();
        handle.wait().await;

        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_within_aborts_on_timeout() {
        let handle = DispatchHandle::spawn("slow", futures::future::pending());
        let abort = handle.abort_handle();

        let settled = handle.settle_within(Duration::from_millis(100)).await;

        assert!(!settled);
        assert!(abort.is_aborted());
    }

    #[tokio::test]
    async fn test_settle_within_reports_success() {
        let handle = DispatchHandle::spawn("fast", async {});
        assert!(handle.settle_within(Duration::from_secs(5)).await);
    }

    #[test]
    fn test_spawn_without_runtime_is_lazy() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = DispatchHandle::spawn("lazy", async move {
            flag.store(true, Ordering::SeqCst);
        });

        assert!(!ran.load(Ordering::SeqCst));
        futures::executor::block_on(handle.wait());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_panic_without_runtime_resolves_completion() {
        let handle = DispatchHandle::spawn("panicky", async {
            panic!("send blew up");
        });

        futures::executor::block_on(handle.wait());
    }

    #[tokio::test]
    async fn test_panic_in_runtime_resolves_completion() {
        let handle = DispatchHandle::spawn("panicky", async {
            panic!("send blew up");
        });

        handle.wait().await;
    }
}
