/*!
 * Protocol layer: what we send to the Vemetric hub.
 *
 * - `types`: event and user-update payloads, user data mutations
 * - `constants`: SDK identification, default host, endpoint paths
 */

pub mod constants;
pub mod types;
