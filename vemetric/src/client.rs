/**
 * The Vemetric client: dispatcher and lifecycle controller.
 *
 * Lifecycle:
 * 1. `Client::new(options)` validates the options and, in async mode,
 *    creates the bounded queue and spawns the single background worker.
 * 2. `track_event()` / `update_user()` validate the payload, then either
 *    perform the round trip on the calling thread (`DispatchMode::Sync`)
 *    or hand a `WorkItem` to the queue (`DispatchMode::Async`).
 * 3. `close()` stops intake and blocks until the worker has delivered
 *    every accepted item. Dropping the client closes it too.
 *
 * States only move forward: `Running → Closing → Closed`.
 */
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::select;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::protocol::constants::DEFAULT_HOST;
use crate::protocol::types::{Target, TrackEvent, UpdateUser};
use crate::transport::{Collector, Delivery, Queue, Transport, UreqTransport, WorkItem, Worker};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/**
 * Whether calls are delivered on the caller's thread or queued.
 * Fixed for the lifetime of a client.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Block until the hub answered and return its outcome.
    #[default]
    Sync,
    /// Queue the request and return immediately; delivery is best-effort.
    Async,
}

/**
 * What an async dispatch does when the queue is full.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueFullPolicy {
    /// Wait for space until the caller's `Context` fires.
    #[default]
    Block,
    /// Discard the request and fail with `Error::QueueFull`.
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Running,
    /// Intake is closed; the worker is draining.
    Closing,
    Closed,
}

/**
 * Configuration options for the Vemetric client.
 *
 * All fields except `token` have defaults via `Default`.
 *
 * # Example
 * ```
 * use std::time::Duration;
 * use vemetric::{DispatchMode, Options};
 *
 * let options = Options {
 *     token: "PROJECT_TOKEN".into(),
 *     mode: DispatchMode::Async,
 *     queue_capacity: 100,
 *     timeout: Duration::from_secs(5),
 *     ..Default::default()
 * };
 * ```
 */
#[derive(Debug, Clone)]
pub struct Options {
    /// Project token from the Vemetric settings page. Required.
    pub token: String,

    /// Hub URL. Defaults to `https://hub.vemetric.com`.
    pub host: Option<String>,

    /// Client-wide request timeout. Default: 3 seconds.
    pub timeout: Duration,

    /// Default: `DispatchMode::Sync`.
    pub mode: DispatchMode,

    /// Async queue capacity, at least 1. Ignored in sync mode. Default: 10.
    pub queue_capacity: usize,

    /// Async queue-full behaviour. Default: `QueueFullPolicy::Block`.
    pub queue_full: QueueFullPolicy,

    /// Budget for delivering one queued item. Default: 3 seconds.
    pub item_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            token: String::new(),
            host: None,
            timeout: Duration::from_secs(3),
            mode: DispatchMode::Sync,
            queue_capacity: 10,
            queue_full: QueueFullPolicy::Block,
            item_timeout: Duration::from_secs(3),
        }
    }
}

/**
 * Allows `Client::new("TOKEN")`: all other options default.
 */
impl From<&str> for Options {
    fn from(token: &str) -> Self {
        Self {
            token: token.to_string(),
            ..Default::default()
        }
    }
}

impl Options {
    /**
     * Reads `VEMETRIC_TOKEN` (required) and `VEMETRIC_HOST` (optional).
     */
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup("VEMETRIC_TOKEN")
            .ok_or_else(|| Error::Config("VEMETRIC_TOKEN is not set".into()))?;

        Ok(Self {
            token,
            host: lookup("VEMETRIC_HOST"),
            ..Default::default()
        })
    }

    /**
     * Checks the options and returns the resolved host.
     */
    fn validate(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(Error::Config("token required".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be non-zero".into()));
        }

        let host = match self.host.as_deref() {
            Some(host) if !host.is_empty() => host.trim_end_matches('/'),
            _ => DEFAULT_HOST,
        };
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(Error::Config(format!(
                "host must start with http:// or https://, got {host:?}"
            )));
        }

        if self.mode == DispatchMode::Async {
            if self.queue_capacity == 0 {
                return Err(Error::Config(
                    "queue_capacity must be at least 1 in async mode".into(),
                ));
            }
            if self.item_timeout.is_zero() {
                return Err(Error::Config("item_timeout must be non-zero".into()));
            }
        }

        Ok(host.to_string())
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/**
 * Async-mode machinery: the queue, its full policy, and the worker handle.
 */
struct Intake {
    queue: Arc<Queue<WorkItem>>,
    policy: QueueFullPolicy,

    /// Taken by the first `close()`.
    worker: Mutex<Option<Worker>>,
}

impl Intake {
    fn accept(&self, item: WorkItem, ctx: &Context) -> Result<()> {
        match self.policy {
            QueueFullPolicy::Block => self.queue.enqueue(item, ctx),
            QueueFullPolicy::Drop => self.queue.try_enqueue(item).inspect_err(|err| {
                if matches!(err, Error::QueueFull) {
                    warn!(capacity = self.queue.capacity(), "queue full, dropping request");
                }
            }),
        }
    }
}

/**
 * The Vemetric client.
 *
 * `Send + Sync`: share it between threads behind an `Arc`.
 *
 * # Example
 * ```no_run
 * use vemetric::{Client, Context, TrackEvent};
 *
 * let client = Client::new("PROJECT_TOKEN")?;
 * client.track_event(&Context::background(), &TrackEvent::new("SignupCompleted"))?;
 * client.close();
 * # Ok::<(), vemetric::Error>(())
 * ```
 */
pub struct Client {
    collector: Arc<Collector>,
    transport: Arc<dyn Transport>,
    timeout: Duration,

    /// `None` in sync mode.
    intake: Option<Intake>,

    state: Mutex<ClientState>,
}

impl Client {
    /**
     * Creates a client delivering over HTTP with `ureq`.
     *
     * Fails with `Error::Config` for a missing token, a malformed host, a
     * zero timeout, or a zero queue capacity in async mode.
     */
    pub fn new(options: impl Into<Options>) -> Result<Self> {
        let options = options.into();
        options.validate()?;
        let transport = Arc::new(UreqTransport::new(options.timeout));
        Self::with_transport(options, transport)
    }

    /**
     * Creates a client delivering through `transport`.
     */
    pub fn with_transport(options: impl Into<Options>, transport: Arc<dyn Transport>) -> Result<Self> {
        let options = options.into();
        let host = options.validate()?;
        let collector = Arc::new(Collector::new(host, options.token.as_str()));

        let intake = match options.mode {
            DispatchMode::Sync => None,
            DispatchMode::Async => {
                let queue = Arc::new(Queue::new(options.queue_capacity)?);
                let worker = Worker::spawn(
                    Arc::clone(&queue),
                    Delivery {
                        collector: Arc::clone(&collector),
                        transport: Arc::clone(&transport),
                        item_timeout: options.item_timeout,
                    },
                )?;
                Some(Intake {
                    queue,
                    policy: options.queue_full,
                    worker: Mutex::new(Some(worker)),
                })
            }
        };

        Ok(Self {
            collector,
            transport,
            timeout: options.timeout,
            intake,
            state: Mutex::new(ClientState::Running),
        })
    }

    pub fn mode(&self) -> DispatchMode {
        if self.intake.is_some() {
            DispatchMode::Async
        } else {
            DispatchMode::Sync
        }
    }

    pub fn state(&self) -> ClientState {
        *self.lock_state()
    }

    /**
     * Tracks a custom event.
     *
     * Fails with `Error::Validation` if the event name is empty; nothing is
     * sent or queued in that case. In sync mode the hub's outcome is
     * returned; in async mode `Ok` means the event was accepted.
     */
    pub fn track_event(&self, ctx: &Context, event: &TrackEvent) -> Result<()> {
        if event.name.is_empty() {
            return Err(Error::Validation("event name required"));
        }
        self.dispatch(ctx, Target::Event, event)
    }

    /**
     * Updates the data stored on a user.
     *
     * Fails with `Error::Validation` if the user identifier is empty.
     * Otherwise behaves like `track_event`.
     */
    pub fn update_user(&self, ctx: &Context, update: &UpdateUser) -> Result<()> {
        if update.user_identifier.is_empty() {
            return Err(Error::Validation("user identifier required"));
        }
        self.dispatch(ctx, Target::User, update)
    }

    /**
     * Stops intake and waits for the worker to deliver every accepted item.
     *
     * Has no timeout of its own; each remaining item is bounded by the
     * per-item timeout. Safe to call more than once and from several
     * threads: a call overlapping a drain in progress waits for it, and a
     * call after the client is closed returns immediately.
     */
    pub fn close(&self) {
        {
            let mut state = self.lock_state();
            match *state {
                ClientState::Closed => return,
                ClientState::Closing => {}
                ClientState::Running => {
                    *state = ClientState::Closing;
                    if let Some(intake) = &self.intake {
                        intake.queue.close_intake();
                        debug!(pending = intake.queue.len(), "intake closed, draining queue");
                    }
                }
            }
        }

        if let Some(intake) = &self.intake {
            // Held across the join so overlapping closers block until the
            // worker has exited.
            let mut worker = intake.worker.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(worker) = worker.take() {
                worker.join();
            }
        }

        *self.lock_state() = ClientState::Closed;
        debug!("client closed");
    }

    fn dispatch<P: Serialize>(&self, ctx: &Context, target: Target, payload: &P) -> Result<()> {
        if self.state() != ClientState::Running {
            return Err(Error::Closed);
        }

        let body = serde_json::to_vec(payload)?;

        match &self.intake {
            None => self.send_now(ctx, target, body),
            Some(intake) => intake.accept(
                WorkItem {
                    target,
                    body,
                    ctx: ctx.clone(),
                },
                ctx,
            ),
        }
    }

    /**
     * Performs one round trip for a synchronous call.
     *
     * With a cancellable context the request runs on a short-lived thread
     * so the caller can be released as soon as the context fires; the
     * abandoned request is still bounded by its own timeout.
     */
    fn send_now(&self, ctx: &Context, target: Target, body: Vec<u8>) -> Result<()> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let timeout = ctx
            .remaining()
            .map_or(self.timeout, |remaining| remaining.min(self.timeout));
        let request = self.collector.request(target, body, timeout);

        if !ctx.is_cancellable() {
            return Collector::classify(target, self.transport.execute(request));
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        let transport = Arc::clone(&self.transport);
        thread::Builder::new()
            .name("vemetric-request".into())
            .spawn(move || {
                let _ = tx.send(transport.execute(request));
            })
            .map_err(|e| Error::Spawn(e.to_string()))?;

        let done = ctx.done_receiver();
        let deadline = ctx.deadline_receiver();

        select! {
            recv(rx) -> outcome => {
                let outcome = outcome.unwrap_or_else(|_| {
                    Err(Error::Network("request thread exited without a response".into()))
                });
                Collector::classify(target, outcome)
            }
            recv(done) -> _ => Err(Error::Cancelled),
            recv(deadline) -> _ => Err(Error::DeadlineExceeded),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Client {
    /**
     * Closes the client so queued items are not lost when it goes out of
     * scope without an explicit `close()`.
     */
    fn drop(&mut self) {
        self.close();
    }
}
