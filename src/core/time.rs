//! Epoch-millisecond clock helpers.
//!
//! Expiry timestamps are absolute wall-clock milliseconds so that sibling
//! processes on the same machine agree on when an entry dies, regardless of
//! when each of them learned about it.

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Absolute expiry for a TTL starting now.
///
/// A TTL of zero means the entry is permanent.
pub fn expiry_for_ttl(now: u64, ttl_ms: u64) -> Option<u64> {
    (ttl_ms > 0).then(|| now.saturating_add(ttl_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_for_ttl() {
        assert_eq!(expiry_for_ttl(1_000, 0), None);
        assert_eq!(expiry_for_ttl(1_000, 250), Some(1_250));
        assert_eq!(expiry_for_ttl(u64::MAX, 10), Some(u64::MAX));
    }

    #[test]
    fn test_now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }
}
