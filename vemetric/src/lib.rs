/*!
 * Vemetric: Rust SDK for reporting analytics events and user updates.
 *
 * # Quick start
 *
 * ```no_run
 * use vemetric::{properties, Client, Context, TrackEvent, UpdateUser, UserData};
 *
 * fn main() -> Result<(), vemetric::Error> {
 *     let client = Client::new("PROJECT_TOKEN")?;
 *     let ctx = Context::background();
 *
 *     let mut event = TrackEvent::new("SignupCompleted");
 *     event.user_identifier = Some("user-42".into());
 *     event.custom_data = Some(properties([("plan", "Pro")]));
 *     client.track_event(&ctx, &event)?;
 *
 *     let mut update = UpdateUser::new("user-42");
 *     update.user_data = Some(UserData {
 *         set: Some(properties([("plan", "Business")])),
 *         ..Default::default()
 *     });
 *     client.update_user(&ctx, &update)?;
 *
 *     client.close();
 *     Ok(())
 * }
 * ```
 *
 * # Dispatch modes
 *
 * - `DispatchMode::Sync` (default): each call performs one HTTP round trip
 *   on the calling thread and returns its outcome.
 * - `DispatchMode::Async`: each call places the request on a bounded queue
 *   drained by one background thread, and returns as soon as the request
 *   is accepted. Delivery is at most once and failures are only logged.
 *   When the queue is full, `QueueFullPolicy` decides whether the caller
 *   waits (`Block`, default) or the request is rejected (`Drop`).
 *
 * `Client::close()` (or dropping the client) stops intake and waits until
 * every accepted request was attempted.
 *
 * # Module structure
 *
 * - `protocol/`: what we send: payload types, constants
 * - `transport/`: how we deliver: HTTP, bounded queue, background worker
 * - `context`: caller cancellation and deadlines
 * - `client`: options, dispatch, lifecycle
 */

mod client;
mod context;
mod error;
mod protocol;
mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use client::{Client, ClientState, DispatchMode, Options, QueueFullPolicy};
pub use context::{CancelHandle, Context};
pub use error::{Error, Result};
pub use protocol::constants::{DEFAULT_HOST, SDK_NAME, SDK_VERSION, USER_AGENT};
pub use protocol::types::{properties, Properties, TrackEvent, UpdateUser, UserData};
pub use transport::{Request, Response, Transport, UreqTransport};
