pub mod hash;

pub use hash::{canonical_json, ledger_checksum, sha256_hex, LedgerChecksumInput, GENESIS_CHECKSUM};
