//! Content fingerprinting.

/// Lowercase hex MD5 of `content` (128 bits). Deterministic and used only to
/// spot duplicate text across publications, never for integrity.
pub fn content_hash(content: &str) -> String {
  format!("{:x}", md5::compute(content.as_bytes()))
}
