/**
 * Wire payloads for the Vemetric hub.
 *
 * Field names are fixed by the hub's JSON API:
 *
 * ```json
 * // POST /e
 * { "name": "...", "userIdentifier": "...", "displayName": "...",
 *   "customData": { ... }, "userData": { "set": {}, "setOnce": {}, "unset": [] } }
 *
 * // POST /u
 * { "userIdentifier": "...", "displayName": "...", "data": { ...UserData... } }
 * ```
 *
 * Optional fields are omitted from the body when unset.
 */
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::constants::{EVENT_PATH, USER_PATH};

/// Free-form key/value data attached to events and users.
pub type Properties = Map<String, Value>;

// ---------------------------------------------------------------------------
// Target: which endpoint a payload is delivered to
// ---------------------------------------------------------------------------

/**
 * Endpoint selector carried by every queued unit of work.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// `POST /e`
    Event,
    /// `POST /u`
    User,
}

impl Target {
    pub fn path(self) -> &'static str {
        match self {
            Target::Event => EVENT_PATH,
            Target::User => USER_PATH,
        }
    }
}

// ---------------------------------------------------------------------------
// TrackEvent
// ---------------------------------------------------------------------------

/**
 * A custom event, optionally attributed to a user.
 *
 * # Example
 * ```
 * use vemetric::TrackEvent;
 *
 * let mut event = TrackEvent::new("SignupCompleted");
 * event.user_identifier = Some("u1".into());
 * event.custom_data = Some(vemetric::properties([("plan", "Pro")]));
 * ```
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEvent {
    /// Event name. Required, must be non-empty.
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_identifier: Option<String>,

    /// Display name of the user the event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Key/value pairs stored on the event itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Properties>,

    /// Lets you mutate the user's data while tracking the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserData>,
}

impl TrackEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// UpdateUser
// ---------------------------------------------------------------------------

/**
 * An update to the data stored on a single user.
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    /// Identifier of the user to update. Required, must be non-empty.
    pub user_identifier: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(rename = "data")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserData>,
}

impl UpdateUser {
    pub fn new(user_identifier: impl Into<String>) -> Self {
        Self {
            user_identifier: user_identifier.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// UserData
// ---------------------------------------------------------------------------

/**
 * Mutations applied to a user's stored data.
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    /// Values written to the user, overwriting existing keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Properties>,

    /// Values written only if the key does not exist yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_once: Option<Properties>,

    /// Keys removed from the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unset: Option<Vec<String>>,
}

/**
 * Builds a `Properties` map from key/value pairs.
 *
 * ```
 * let props = vemetric::properties([("plan", "Pro"), ("seats", "5")]);
 * assert_eq!(props["plan"], "Pro");
 * ```
 */
pub fn properties<K, V, I>(pairs: I) -> Properties
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}
