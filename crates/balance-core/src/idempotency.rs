use serde::{Deserialize, Serialize};

use crate::types::{IdempotencyKey, Timestamp};

/// A cached result of a previously executed idempotent command, keyed by the
/// caller-supplied [`IdempotencyKey`]. `request_fingerprint` lets a replayed
/// call be distinguished from a key reused with a different payload, which
/// is a conflict rather than a replay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: IdempotencyKey,
    pub request_fingerprint: String,
    /// Opaque JSON-encoded response, replayed verbatim on a matching retry.
    pub response_json: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl IdempotencyRecord {
    pub fn is_expired_at(&self, now_ms: Timestamp) -> bool {
        now_ms >= self.expires_at
    }
}
