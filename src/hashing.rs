//! Hashing System - SHA-256 for Manifests
//!
//! Same dataset, template and options must give the same hashes on every run.

use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Compute SHA-256 hash of bytes, return lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            // Writing to a String cannot fail
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

/// Compact JSON with object keys in sorted order. Going through `Value`
/// puts struct fields and `HashMap` keys into serde_json's ordered map.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value: Value = serde_json::to_value(value)?;
    serde_json::to_string(&value)
}

/// Hash of the archive manifest (entry names and digests)
pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(manifest)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Fingerprint of a batch's inputs: the SHA-256 of the canonical JSON array
/// `[template, options, dataset, engine_version]`.
pub fn compute_job_hash(
    template: &str,
    options: &impl Serialize,
    dataset: &impl Serialize,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let job = json!([
        template,
        serde_json::to_value(options)?,
        serde_json::to_value(dataset)?,
        engine_version,
    ]);
    Ok(sha256_hex(canonical_json(&job)?.as_bytes()))
}
