//! Transaction content hashing.

/// Content hash of raw transaction bytes, as lowercase hex.
///
/// This is the identifier recorded in the per-address history index; it is
/// deterministic for identical payloads.
pub fn tx_hash(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}
