use serde::Serialize;
use sha2::{Digest, Sha256};

/// Seed value for the first entry in any account's ledger chain.
pub const GENESIS_CHECKSUM: &str = "GENESIS";

/// Serialize `value` to canonical JSON: compact (no insignificant whitespace)
/// and with struct fields in declaration order, so the same logical value
/// always hashes to the same bytes regardless of serializer internals.
/// `serde_json` already preserves struct field order for non-map types,
/// which is sufficient here since every hashed type is a plain struct.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// SHA-256 of raw bytes, hex-encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// The fields of one ledger entry that feed its checksum, generic over the
/// metadata type `M` to avoid a circular dependency on `balance-core`.
pub struct LedgerChecksumInput<'a, M> {
    pub entry_id: &'a str,
    pub transaction_id: &'a str,
    pub account_id: &'a str,
    pub tx_type: &'a str,
    pub amount: i64,
    pub balance_before: u64,
    pub balance_after: u64,
    pub metadata: &'a M,
    pub timestamp: i64,
    pub previous_checksum: &'a str,
}

/// Compute a ledger entry's checksum: SHA-256 of its canonical JSON
/// encoding, hex-encoded.
///
/// The canonical form is a compact JSON object with a fixed field order —
/// `entryId, transactionId, accountId, type, amount, balanceBefore,
/// balanceAfter, metadata, timestamp, previousChecksum` — and zero
/// insignificant whitespace. That order is not alphabetical, so it is built
/// by hand rather than via a derived `Serialize` impl (which would sort or
/// reorder nothing on its own, but also gives no order guarantee against
/// future field additions). `metadata`'s own keys must sort
/// lexicographically; round-tripping it through `serde_json::Value` gets
/// that for free, since `serde_json::Map` is BTreeMap-backed by default.
pub fn ledger_checksum<M: Serialize>(input: &LedgerChecksumInput<'_, M>) -> Result<String, serde_json::Error> {
    let metadata_value = serde_json::to_value(input.metadata)?;
    let metadata_json = serde_json::to_string(&metadata_value)?;

    let canonical = format!(
        "{{\"entryId\":{},\"transactionId\":{},\"accountId\":{},\"type\":{},\"amount\":{},\"balanceBefore\":{},\"balanceAfter\":{},\"metadata\":{},\"timestamp\":{},\"previousChecksum\":{}}}",
        serde_json::to_string(input.entry_id)?,
        serde_json::to_string(input.transaction_id)?,
        serde_json::to_string(input.account_id)?,
        serde_json::to_string(input.tx_type)?,
        input.amount,
        input.balance_before,
        input.balance_after,
        metadata_json,
        input.timestamp,
        serde_json::to_string(input.previous_checksum)?,
    );

    Ok(sha256_hex(canonical.as_bytes()))
}
