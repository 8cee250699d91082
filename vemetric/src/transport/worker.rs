/**
 * Background worker thread that drains the queue and delivers each item
 * to the Vemetric hub.
 *
 * Architecture overview:
 *
 * ```text
 *  ┌──────────────┐   bounded Queue<WorkItem>   ┌─────────────────┐
 *  │  Client       │ ─────── WorkItem ─────────► │  Worker thread   │
 *  │  (any thread) │                             │  (single)        │
 *  └──────────────┘                             └────────┬────────┘
 *                                                        │
 *                                              Collector::post()
 *                                                        │
 *                                                 ┌──────▼──────┐
 *                                                 │     Hub      │
 *                                                 └─────────────┘
 * ```
 *
 * Each item gets its own execution budget derived from the context the
 * caller supplied at enqueue time: the earlier of the caller's deadline and
 * `item_timeout` from the moment the item is dequeued. An item whose caller
 * cancelled before it reached the front of the queue is skipped.
 *
 * Delivery is at most once. Failures are logged and dropped; they never
 * stop the loop or reach any caller. The loop ends when the queue reports
 * closed-and-drained.
 */
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, warn};

use super::http::{Collector, Transport};
use super::queue::Queue;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::protocol::types::Target;

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/**
 * One accepted unit of pending delivery.
 *
 * Owned by the queue until dequeued, then by the worker for a single
 * delivery attempt, then discarded.
 */
#[derive(Debug)]
pub struct WorkItem {
    pub target: Target,

    /// Serialized JSON payload.
    pub body: Vec<u8>,

    /// The caller's context, captured at enqueue time.
    pub ctx: Context,
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/**
 * Everything the worker thread needs to deliver an item.
 */
pub struct Delivery {
    pub collector: Arc<Collector>,
    pub transport: Arc<dyn Transport>,
    pub item_timeout: Duration,
}

/**
 * Handle to the background worker thread.
 */
pub struct Worker {
    handle: JoinHandle<()>,
}

impl Worker {
    /**
     * Spawns the worker thread draining `queue`.
     */
    pub fn spawn(queue: Arc<Queue<WorkItem>>, delivery: Delivery) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("vemetric-worker".into())
            .spawn(move || {
                debug!(capacity = queue.capacity(), "worker started");
                Self::run_loop(&queue, &delivery);
                debug!("worker drained queue and stopped");
            })
            .map_err(|e| Error::Spawn(e.to_string()))?;

        Ok(Self { handle })
    }

    /**
     * Blocks until the worker has drained the queue and exited.
     *
     * Only returns once intake was closed; callers close the queue first.
     */
    pub fn join(self) {
        if self.handle.join().is_err() {
            error!("worker thread panicked");
        }
    }

    fn run_loop(queue: &Queue<WorkItem>, delivery: &Delivery) {
        while let Some(item) = queue.dequeue() {
            /*
             * A panicking transport must not take the remaining items down
             * with it.
             */
            let target = item.target;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                Self::process(item, delivery)
            }));

            if result.is_err() {
                error!(path = target.path(), "delivery panicked, continuing with next item");
            }
        }
    }

    fn process(item: WorkItem, delivery: &Delivery) {
        let WorkItem { target, body, ctx } = item;
        let path = target.path();

        let ctx = ctx.with_timeout(delivery.item_timeout);
        if let Some(err) = ctx.err() {
            debug!(path, error = %err, "skipping item, caller context already done");
            return;
        }

        let timeout = ctx.remaining().unwrap_or(delivery.item_timeout);
        match delivery
            .collector
            .post(delivery.transport.as_ref(), target, body, timeout)
        {
            Ok(()) => debug!(path, "delivered"),
            Err(err) => warn!(path, error = %err, "delivery failed, dropping item"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::http::{Request, Response};
    use std::sync::Mutex;

    /// Records request URLs and bodies; answers with a fixed status.
    struct Recorder {
        status: u16,
        seen: Mutex<Vec<(String, Vec<u8>, Duration)>>,
    }

    impl Recorder {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn bodies(&self) -> Vec<Vec<u8>> {
            self.seen.lock().unwrap().iter().map(|(_, b, _)| b.clone()).collect()
        }
    }

    impl Transport for Recorder {
        fn execute(&self, request: Request) -> Result<Response> {
            self.seen
                .lock()
                .unwrap()
                .push((request.url, request.body, request.timeout));
            Ok(Response { status: self.status })
        }
    }

    /// Panics on a `boom` body; records every other body it executes.
    #[derive(Default)]
    struct Panicky {
        executed: Mutex<Vec<Vec<u8>>>,
    }

    impl Transport for Panicky {
        fn execute(&self, request: Request) -> Result<Response> {
            if request.body == b"boom" {
                panic!("transport exploded");
            }
            self.executed.lock().unwrap().push(request.body);
            Ok(Response { status: 200 })
        }
    }

    fn delivery(transport: Arc<dyn Transport>) -> Delivery {
        Delivery {
            collector: Arc::new(Collector::new("http://hub.test", "tok")),
            transport,
            item_timeout: Duration::from_secs(3),
        }
    }

    fn item(body: &[u8], ctx: Context) -> WorkItem {
        WorkItem {
            target: Target::Event,
            body: body.to_vec(),
            ctx,
        }
    }

    /**
     * Items are delivered in the order accepted, and `join` returns only
     * after the last one.
     */
    #[test]
    fn test_drains_in_fifo_order() {
        let recorder = Recorder::new(200);
        let queue = Arc::new(Queue::new(8).unwrap());
        for body in [b"A", b"B", b"C"] {
            queue.try_enqueue(item(body, Context::background())).unwrap();
        }

        let worker = Worker::spawn(Arc::clone(&queue), delivery(recorder.clone())).unwrap();
        queue.close_intake();
        worker.join();

        assert_eq!(recorder.bodies(), vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]);
    }

    #[test]
    fn test_failures_do_not_stop_the_loop() {
        let recorder = Recorder::new(500);
        let queue = Arc::new(Queue::new(4).unwrap());
        queue.try_enqueue(item(b"1", Context::background())).unwrap();
        queue.try_enqueue(item(b"2", Context::background())).unwrap();

        let worker = Worker::spawn(Arc::clone(&queue), delivery(recorder.clone())).unwrap();
        queue.close_intake();
        worker.join();

        assert_eq!(recorder.bodies().len(), 2);
    }

    #[test]
    fn test_panicking_item_is_isolated() {
        let queue = Arc::new(Queue::new(4).unwrap());
        queue.try_enqueue(item(b"boom", Context::background())).unwrap();
        queue.try_enqueue(item(b"fine", Context::background())).unwrap();

        let panicky = Arc::new(Panicky::default());
        let worker = Worker::spawn(Arc::clone(&queue), delivery(panicky.clone())).unwrap();
        queue.close_intake();
        worker.join();

        assert_eq!(queue.len(), 0);
        assert_eq!(*panicky.executed.lock().unwrap(), vec![b"fine".to_vec()]);
    }

    /**
     * The caller cancelled after the item was accepted but before the
     * worker reached it.
     */
    #[test]
    fn test_cancelled_item_is_skipped() {
        let recorder = Recorder::new(200);
        let queue = Arc::new(Queue::new(4).unwrap());

        let (ctx, handle) = Context::with_cancel();
        queue.try_enqueue(item(b"cancelled", ctx)).unwrap();
        queue.try_enqueue(item(b"kept", Context::background())).unwrap();
        handle.cancel();

        let worker = Worker::spawn(Arc::clone(&queue), delivery(recorder.clone())).unwrap();
        queue.close_intake();
        worker.join();

        assert_eq!(recorder.bodies(), vec![b"kept".to_vec()]);
    }

    /**
     * The per-item budget never exceeds `item_timeout`, and shrinks to the
     * caller's deadline when that is sooner.
     */
    #[test]
    fn test_item_timeout_is_bounded() {
        let recorder = Recorder::new(200);
        let queue = Arc::new(Queue::new(4).unwrap());
        queue.try_enqueue(item(b"open", Context::background())).unwrap();
        queue
            .try_enqueue(item(
                b"tight",
                Context::background().with_timeout(Duration::from_secs(1)),
            ))
            .unwrap();

        let worker = Worker::spawn(Arc::clone(&queue), delivery(recorder.clone())).unwrap();
        queue.close_intake();
        worker.join();

        let seen = recorder.seen.lock().unwrap();
        assert!(seen[0].2 <= Duration::from_secs(3));
        assert!(seen[0].2 > Duration::from_secs(2));
        assert!(seen[1].2 <= Duration::from_secs(1));
    }
}
