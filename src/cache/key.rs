//! Store keys and request fingerprints.

use crate::utils::sha256_hex;

/// Store key of the persisted rate-limit snapshot.
pub const RATE_LIMIT_KEY: &str = "rate-limit.cache";
/// Store key of the persisted call cache snapshot.
pub const CALL_CACHE_KEY: &str = "api-calls.cache";

/// Deterministic cache key of a fully resolved request URL.
pub fn fingerprint(url: &str) -> String {
    sha256_hex(url.as_bytes())
}
