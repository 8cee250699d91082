/**
 * Transport layer: HTTP delivery, the bounded queue, and the background worker.
 *
 * Everything related to *how* payloads reach the Vemetric hub:
 * - `http`: the `Transport` capability, the `ureq` default, request building
 * - `queue`: bounded FIFO with a closable intake
 * - `worker`: background thread draining the queue
 */

pub mod http;
pub mod queue;
pub mod worker;

pub use http::{Collector, Request, Response, Transport, UreqTransport};
pub use queue::Queue;
pub use worker::{Delivery, WorkItem, Worker};
