//! Job identifiers derived from source URLs.
//!
//! The producer names job files after this hash, so the canonicalization here
//! must stay byte-for-byte compatible with it: strip `&quot;` entities and quote
//! characters, cut at the first comma, then take the lowercase hex SHA-1.

use sha1::{Digest, Sha1};

/// Canonical form of a source URL as hashed by the producer.
pub fn canonical_url(url: &str) -> &str {
    url.split(',').next().unwrap_or(url)
}

/// Compute the job id for `url`, or `None` for an empty URL.
pub fn job_id_for_url(url: &str) -> Option<String> {
    let cleaned = url.replace("&quot;", "").replace('"', "");
    let canonical = canonical_url(&cleaned);
    if canonical.is_empty() {
        return None;
    }
    let digest = Sha1::digest(canonical.as_bytes());
    Some(hex::encode(digest))
}
