/**
 * Bounded FIFO queue with a closable intake.
 *
 * Backed by a `crossbeam_channel::bounded` channel. The queue keeps the
 * only long-lived `Sender` behind a mutex; enqueuers clone it for the
 * duration of one call. `close_intake()` takes the sender out, so:
 *
 * - every enqueue that starts afterwards fails with `Error::Closed`;
 * - items already in the channel (and enqueues that were mid-flight when
 *   intake closed) stay dequeuable;
 * - once the last sender clone is gone and the channel is empty,
 *   `dequeue()` returns `None` and the consumer can exit.
 */
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{select, Receiver, Sender, TrySendError};

use crate::context::Context;
use crate::error::{Error, Result};

pub struct Queue<T> {
    /// `None` once intake is closed.
    intake: Mutex<Option<Sender<T>>>,

    receiver: Receiver<T>,

    capacity: usize,
}

impl<T> Queue<T> {
    /**
     * Creates a queue holding at most `capacity` items.
     *
     * A capacity of zero is rejected: crossbeam would turn it into a
     * rendezvous channel, which is not a buffer.
     */
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config("queue capacity must be at least 1".into()));
        }

        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Ok(Self {
            intake: Mutex::new(Some(sender)),
            receiver,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently waiting.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /**
     * Adds `item` without blocking.
     *
     * Fails with `Error::QueueFull` at capacity; the item is discarded.
     */
    pub fn try_enqueue(&self, item: T) -> Result<()> {
        let sender = self.sender()?;
        sender.try_send(item).map_err(|err| match err {
            TrySendError::Full(_) => Error::QueueFull,
            TrySendError::Disconnected(_) => Error::Closed,
        })
    }

    /**
     * Adds `item`, waiting for space until `ctx` fires.
     *
     * An already-fired context fails before touching the channel, so a
     * pre-cancelled caller never gets its item accepted even when space
     * is available.
     */
    pub fn enqueue(&self, item: T, ctx: &Context) -> Result<()> {
        let sender = self.sender()?;
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let done = ctx.done_receiver();
        let deadline = ctx.deadline_receiver();

        select! {
            send(sender, item) -> res => res.map_err(|_| Error::Closed),
            recv(done) -> _ => Err(Error::Cancelled),
            recv(deadline) -> _ => Err(Error::DeadlineExceeded),
        }
    }

    /**
     * Takes the oldest item, blocking while the queue is empty.
     *
     * Returns `None` only when intake is closed and every accepted item
     * has been handed out.
     */
    pub fn dequeue(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /**
     * Stops accepting new items. Idempotent.
     */
    pub fn close_intake(&self) {
        self.lock_intake().take();
    }

    fn sender(&self) -> Result<Sender<T>> {
        self.lock_intake().clone().ok_or(Error::Closed)
    }

    fn lock_intake(&self) -> std::sync::MutexGuard<'_, Option<Sender<T>>> {
        self.intake.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
