/**
 * Caller-supplied cancellation and deadlines.
 *
 * A `Context` travels with every dispatch call. Synchronous calls abort
 * their round trip when it fires, blocking enqueues give up waiting for
 * queue space, and queued work items that are dequeued after their
 * context fired are never delivered.
 *
 * Cancellation is signalled by disconnecting a crossbeam channel: the
 * `CancelHandle` owns the only `Sender`, and every clone of the `Context`
 * holds a `Receiver`. Once the sender is dropped, every receiver observes
 * the disconnect immediately, which also makes the context usable as an
 * arm of `crossbeam_channel::select!`.
 */
use std::convert::Infallible;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::error::Error;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/**
 * Cancellation token with an optional deadline.
 *
 * Cheap to clone; all clones observe the same cancellation.
 *
 * # Example
 * ```
 * use std::time::Duration;
 * use vemetric::Context;
 *
 * let (ctx, handle) = Context::with_cancel();
 * let bounded = ctx.with_timeout(Duration::from_secs(1));
 * assert!(!bounded.is_done());
 *
 * handle.cancel();
 * assert!(bounded.is_done());
 * ```
 */
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Disconnects when the owning `CancelHandle` is cancelled or dropped.
    done: Option<Receiver<Infallible>>,

    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /**
     * Creates a cancellable context and the handle that cancels it.
     *
     * Dropping the handle cancels the context as well, so keep it alive
     * for as long as the work should be allowed to proceed.
     */
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        let ctx = Self {
            done: Some(receiver),
            deadline: None,
        };
        (ctx, CancelHandle { _sender: sender })
    }

    /**
     * Derives a context that also expires `timeout` from now.
     *
     * The derived context keeps this context's cancellation and never
     * outlives its deadline: the earlier of the two deadlines wins.
     */
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now()
            .checked_add(timeout)
            .unwrap_or_else(far_future);
        self.with_deadline(deadline)
    }

    /// Derives a context that also expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            done: self.done.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, or `None` without one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// True once the context was cancelled or its deadline passed.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /**
     * Why the context is done, or `None` while it is still live.
     *
     * Explicit cancellation takes precedence over an expired deadline.
     */
    pub fn err(&self) -> Option<Error> {
        if self.is_cancelled() {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// True if the context can fire at all.
    pub(crate) fn is_cancellable(&self) -> bool {
        self.done.is_some() || self.deadline.is_some()
    }

    /// Receiver that becomes ready (disconnected) on cancellation.
    pub(crate) fn done_receiver(&self) -> Receiver<Infallible> {
        self.done
            .clone()
            .unwrap_or_else(crossbeam_channel::never)
    }

    /// Receiver that becomes ready when the deadline passes.
    pub(crate) fn deadline_receiver(&self) -> Receiver<Instant> {
        match self.deadline {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => crossbeam_channel::never(),
        }
    }

    fn is_cancelled(&self) -> bool {
        match &self.done {
            Some(receiver) => matches!(receiver.try_recv(), Err(TryRecvError::Disconnected)),
            None => false,
        }
    }
}

/// Stand-in deadline for timeouts too large to represent.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(60 * 60 * 24 * 365 * 30)
}

// ---------------------------------------------------------------------------
// CancelHandle
// ---------------------------------------------------------------------------

/**
 * Cancels the `Context` it was created with.
 *
 * Not `Clone`: there is exactly one handle per cancellable context.
 */
#[derive(Debug)]
pub struct CancelHandle {
    _sender: Sender<Infallible>,
}

impl CancelHandle {
    /// Cancels the context. Equivalent to dropping the handle.
    pub fn cancel(self) {
        drop(self);
    }
}
