//! Authentication credential types.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One-time websocket credential as served by the auth endpoint.
///
/// The fields form the rosauth MAC septet and are passed verbatim to the
/// transport's `auth` operation; the client never inspects them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Credential {
    /// SHA-512 MAC over the remaining fields plus the shared secret.
    pub mac: String,
    /// Client address the MAC was issued for.
    pub client: String,
    /// Destination address of the backend container.
    pub dest: String,
    /// Random nonce.
    pub rand: String,
    /// Issue time (unix seconds).
    pub t: i64,
    /// Access level granted.
    pub level: String,
    /// Expiry time (unix seconds).
    pub end: i64,
}
