use sha2::{Digest, Sha256};

/// Stable content fingerprint used to gate caching, reindexing and enrichment.
///
/// Hex encoding of the first 16 bytes of the SHA-256 digest.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for byte in &digest[..16] {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
