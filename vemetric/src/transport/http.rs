/*!
 * HTTP transport layer for sending payloads to the Vemetric hub.
 *
 * Split in two:
 * - `Transport`: the capability to execute one HTTP request. The default
 *   implementation is `UreqTransport`, a blocking `ureq` agent; tests swap
 *   in a recording double.
 * - `Collector`: everything specific to the hub: URL building, the fixed
 *   header set, serialized bodies, and classifying the response status.
 *
 * Design decisions:
 * - **Blocking HTTP**: the worker is a dedicated thread and synchronous
 *   dispatch blocks the caller anyway, so no async runtime is needed.
 * - **Single attempt**: no retries. A failed request is reported to the
 *   synchronous caller, or logged and dropped by the worker.
 */

use std::time::Duration;

use tracing::debug;
use ureq::Agent;

use crate::error::{Error, Result};
use crate::protocol::constants::{
    SDK_HEADER, SDK_NAME, SDK_VERSION, SDK_VERSION_HEADER, TOKEN_HEADER, USER_AGENT,
};
use crate::protocol::types::Target;

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/**
 * A fully built `POST` request.
 */
#[derive(Debug, Clone)]
pub struct Request {
    /// Absolute URL, e.g. `https://hub.vemetric.com/e`.
    pub url: String,

    pub headers: Vec<(&'static str, String)>,

    /// Serialized JSON body.
    pub body: Vec<u8>,

    /// Upper bound for the whole round trip.
    pub timeout: Duration,
}

impl Request {
    /// Looks up a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/**
 * Executes a single HTTP request.
 *
 * Implementations return `Ok(Response)` for any status the server sent,
 * including 4xx/5xx; status classification is the `Collector`'s job.
 * Connection-level failures map to `Error::Network`.
 */
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request) -> Result<Response>;
}

/**
 * Thin wrapper around `ureq::Agent`.
 *
 * Connection pooling and keep-alive are handled by the agent; each request
 * carries its own timeout so per-item budgets are honoured.
 */
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /**
     * Creates a transport whose requests default to `timeout`.
     */
    pub fn new(timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: Request) -> Result<Response> {
        let mut builder = self
            .agent
            .post(&request.url)
            .config()
            .timeout_global(Some(request.timeout))
            .build();

        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder
            .send(&request.body[..])
            .map_err(|err| Error::Network(err.to_string()))?;

        Ok(Response {
            status: response.status().as_u16(),
        })
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/**
 * Builds hub requests and classifies their outcome.
 *
 * Immutable after construction and shared between the dispatching threads
 * and the worker.
 */
pub struct Collector {
    host: String,
    token: String,
}

impl Collector {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
        }
    }

    /**
     * Builds the request for `target` with the fixed hub headers:
     * `Content-Type`, `Token`, `User-Agent`, `V-SDK`, `V-SDK-Version`.
     */
    pub fn request(&self, target: Target, body: Vec<u8>, timeout: Duration) -> Request {
        Request {
            url: format!("{}{}", self.host, target.path()),
            headers: vec![
                ("Content-Type", "application/json".to_string()),
                (TOKEN_HEADER, self.token.clone()),
                ("User-Agent", USER_AGENT.to_string()),
                (SDK_HEADER, SDK_NAME.to_string()),
                (SDK_VERSION_HEADER, SDK_VERSION.to_string()),
            ],
            body,
            timeout,
        }
    }

    /**
     * Maps a transport outcome to the SDK result: any non-2xx status
     * becomes `Error::BadStatus`.
     */
    pub fn classify(target: Target, outcome: Result<Response>) -> Result<()> {
        let response = outcome?;
        debug!(path = target.path(), status = response.status, "hub responded");

        if response.is_success() {
            Ok(())
        } else {
            Err(Error::BadStatus(response.status))
        }
    }

    /// Builds, executes and classifies one request.
    pub fn post(
        &self,
        transport: &dyn Transport,
        target: Target,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<()> {
        let request = self.request(target, body, timeout);
        Self::classify(target, transport.execute(request))
    }
}
