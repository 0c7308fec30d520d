use serde::{Deserialize, Serialize};
use std::fmt;

/// Chip amount, smallest unit. Non-negative by construction at every call
/// site that accepts one from an external caller.
pub type Amount = u64;

/// Signed chip amount: positive for a credit, negative for a debit. Carried
/// on a ledger entry so the chain can be summed to recover a balance.
pub type SignedAmount = i64;

/// Unix timestamp, milliseconds.
pub type Timestamp = i64;

/// Optimistic-concurrency version counter on a stored record.
pub type Version = u64;

// ── AccountId ────────────────────────────────────────────────────────────────

macro_rules! opaque_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(AccountId, "Opaque per-user chip account identifier.");
opaque_id!(
    TransactionId,
    "Opaque identifier for a completed ledger transaction."
);
opaque_id!(ReservationId, "Opaque identifier for a buy-in reservation.");
opaque_id!(
    IdempotencyKey,
    "Caller-supplied key deduplicating a write command."
);
opaque_id!(LedgerEntryId, "Opaque identifier for a single ledger chain entry.");

// ── PotId ────────────────────────────────────────────────────────────────────

/// `tableId:handId` composite key identifying a single hand's pot.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PotId(pub String);

impl PotId {
    pub fn new(table_id: &str, hand_id: &str) -> Self {
        Self(format!("{table_id}:{hand_id}"))
    }

    pub fn table_id(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    pub fn hand_id(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or("")
    }
}

impl fmt::Display for PotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PotId({})", self.0)
    }
}

// ── Metadata ──────────────────────────────────────────────────────────────────

/// Tagged, fixed-shape metadata carried by transactions and ledger entries.
///
/// When a ledger entry is hashed, this struct is round-tripped through
/// `serde_json::Value` first; `serde_json::Map` is BTreeMap-backed, so its
/// keys come out lexicographically sorted on re-serialization regardless of
/// the field order declared below. See `balance_crypto::hash::ledger_checksum`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Metadata {
    pub fn with_reservation(reservation_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        Self {
            table_id: Some(table_id.into()),
            reservation_id: Some(reservation_id.into()),
            ..Default::default()
        }
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Default::default()
        }
    }
}
