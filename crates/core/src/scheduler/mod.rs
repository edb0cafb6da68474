//! Fixed-interval task runner.
//!
//! Every periodic concern (agent polls, source polls, the orchestrator tick)
//! gets its own [`Scheduler`]. The task is awaited inline by the loop, so two
//! invocations never overlap: a tick that fires while the task is still
//! running is skipped, not queued.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Cancellation signal handed to every task invocation.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    _detached: Option<Arc<watch::Sender<bool>>>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the owning scheduler is stopped.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // A dropped sender means the scheduler is gone, which counts as cancelled.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// A signal that is never cancelled, for invoking tasks outside a scheduler.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _detached: Some(Arc::new(tx)),
        }
    }
}

/// A unit of periodic work.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    async fn run(&self, cancel: CancelSignal);
}

/// Adapter turning an async closure into a [`Task`].
pub struct FnTask<F>(F);

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(CancelSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn run(&self, cancel: CancelSignal) {
        (self.0)(cancel).await
    }
}

/// Wrap an async closure as a shareable task.
pub fn task_fn<F, Fut>(f: F) -> Arc<dyn Task>
where
    F: Fn(CancelSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnTask(f))
}

/// Runs a task once per interval on a dedicated tokio task.
pub struct Scheduler {
    name: String,
    interval: Duration,
    task: Arc<dyn Task>,
    cancel_tx: watch::Sender<bool>,
    running: AtomicBool,
    stopping: AtomicBool,
}

impl Scheduler {
    pub fn new(name: impl Into<String>, interval: Duration, task: Arc<dyn Task>) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            name: name.into(),
            interval,
            task,
            cancel_tx,
            running: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.stopping.load(Ordering::SeqCst)
    }

    /// Start the loop. With `immediate`, the task runs once right away
    /// instead of waiting for the first tick.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&self, immediate: bool) {
        if self.stopping.load(Ordering::SeqCst) {
            warn!("Scheduler {} was stopped and cannot be restarted", self.name);
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler {} already running", self.name);
            return;
        }

        let name = self.name.clone();
        let interval = self.interval;
        let task = Arc::clone(&self.task);
        let signal = CancelSignal {
            rx: self.cancel_tx.subscribe(),
            _detached: None,
        };

        tokio::spawn(async move {
            debug!("Scheduler {} started (interval {:?})", name, interval);

            if immediate && !signal.is_cancelled() {
                task.run(signal.clone()).await;
            }

            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = signal.cancelled() => break,
                    _ = ticker.tick() => {
                        if signal.is_cancelled() {
                            break;
                        }
                        task.run(signal.clone()).await;
                    }
                }
            }

            debug!("Scheduler {} stopped", name);
        });
    }

    /// Cancel the task's signal and halt future ticks.
    ///
    /// Returns immediately: an invocation already in flight finishes on its
    /// own. Calling it again is a no-op.
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel_tx.send_replace(true);
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
