//! Delivering results back to the caller's execution context.
//!
//! [`crate::Client::send_with_continuation`] runs the transaction on a worker
//! thread and hands the finished response to a [`DeliveryContext`]. An
//! application with a UI thread implements the trait over its own event
//! queue; [`ChannelContext`] is a ready-made queue that the owning thread
//! drains through a [`ContextPump`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

/// Work posted to a delivery context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A place completion callbacks run.
pub trait DeliveryContext: Send + Sync {
    /// Queue `job` to run on this context.
    fn post(&self, job: Job);
}

/// Runs jobs immediately on the posting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineContext;

impl DeliveryContext for InlineContext {
    fn post(&self, job: Job) {
        job();
    }
}

/// A job queue owned by one thread.
#[derive(Clone)]
pub struct ChannelContext {
    tx: mpsc::UnboundedSender<Job>,
}

impl ChannelContext {
    /// Create the queue and the pump that drains it.
    pub fn new() -> (Self, ContextPump) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, ContextPump { rx })
    }
}

impl DeliveryContext for ChannelContext {
    fn post(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!("delivery context closed, dropping completion");
        }
    }
}

impl fmt::Debug for ChannelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelContext")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Receiving end of a [`ChannelContext`].
pub struct ContextPump {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl ContextPump {
    /// Run every job already queued. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Block until one job arrives and run it.
    ///
    /// Returns `false` once every sender is gone. Must not be called from
    /// inside an async runtime.
    pub fn run_next_blocking(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Wait for one job and run it.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

/// Callback fired around a non-blocking transaction.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Optional hold/release notifications, e.g. to show and hide a busy
/// indicator while a continuation-style send is outstanding.
#[derive(Clone, Default)]
pub struct ProgressHooks {
    hold: Option<Hook>,
    release: Option<Hook>,
}

impl ProgressHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called before the transaction starts.
    pub fn on_hold(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hold = Some(Arc::new(hook));
        self
    }

    /// Called on the delivery context just before the continuation.
    pub fn on_release(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.release = Some(Arc::new(hook));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hold.is_none() && self.release.is_none()
    }

    pub(crate) fn hold(&self) {
        if let Some(hook) = &self.hold {
            hook();
        }
    }

    pub(crate) fn release(&self) {
        if let Some(hook) = &self.release {
            hook();
        }
    }
}

impl fmt::Debug for ProgressHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressHooks")
            .field("hold", &self.hold.is_some())
            .field("release", &self.release.is_some())
            .finish()
    }
}
