use sha2::{Digest, Sha256};

/// Digest of a document's raw content, e.g. `sha256:9f86d0...`.
pub fn content_digest(content: &str) -> String {
  format!("sha256:{:x}", Sha256::digest(content.as_bytes()))
}
