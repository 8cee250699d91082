/**
 * SDK-wide constants.
 *
 * These values identify the SDK to the hub in every request and
 * describe where requests are sent.
 */

/// SDK family name, sent in the `V-SDK` header.
pub const SDK_NAME: &str = "rust";

/// SDK version, derived at compile time from the package version in `Cargo.toml`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` header value, e.g. `"vemetric-rust/0.1.0"`.
pub const USER_AGENT: &str = concat!("vemetric-rust/", env!("CARGO_PKG_VERSION"));

/// Hub used when `Options::host` is not set.
pub const DEFAULT_HOST: &str = "https://hub.vemetric.com";

/// Path for tracked events.
pub const EVENT_PATH: &str = "/e";

/// Path for user updates.
pub const USER_PATH: &str = "/u";

/// Header carrying the project token.
pub const TOKEN_HEADER: &str = "Token";

pub const SDK_HEADER: &str = "V-SDK";

pub const SDK_VERSION_HEADER: &str = "V-SDK-Version";
