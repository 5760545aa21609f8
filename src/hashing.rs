//! Hashing System - SHA-256 Fingerprints
//!
//! Deterministic fingerprints for layout blocks and generated artifacts,
//! used to prove append-only layouts and byte-identical regeneration.

use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data).iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// Fingerprint of one layout block
/// block_hash = sha256(version + ":" + JSON field list)
pub fn compute_block_fingerprint(version: &str, fields: &[String]) -> Result<String, serde_json::Error> {
    let fields = serde_json::to_string(fields)?;
    Ok(sha256_hex(format!("{}:{}", version, fields).as_bytes()))
}

/// Fingerprint of a generated artifact's exact text
pub fn compute_artifact_fingerprint(text: &str) -> String {
    sha256_hex(text.as_bytes())
}
