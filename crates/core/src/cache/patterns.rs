//! Glob matching for cache keys.
//!
//! Used when listing keys for diagnostics. `*` matches any run of
//! characters, including none.

/// Checks if a cache key matches a glob pattern.
///
/// # Examples
///
/// ```
/// use ratecache_core::cache::pattern_matches;
///
/// assert!(pattern_matches("rate:*", "rate:magnificent-resort:1-king-bed:2024-10-28"));
/// assert!(pattern_matches("*:magnificent-resort:*", "lock:rate:magnificent-resort:1-king-bed:2024-10-28"));
/// assert!(!pattern_matches("lock:*", "rate:magnificent-resort:1-king-bed:2024-10-28"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let Some((head, rest)) = pattern.split_once('*') else {
        return pattern == key;
    };
    let Some(mut remaining) = key.strip_prefix(head) else {
        return false;
    };
    let (middle, tail) = rest.rsplit_once('*').unwrap_or(("", rest));

    // Earliest match for each inner piece leaves the most room for the rest.
    for piece in middle.split('*').filter(|piece| !piece.is_empty()) {
        match remaining.find(piece) {
            Some(pos) => remaining = &remaining[pos + piece.len()..],
            None => return false,
        }
    }

    remaining.ends_with(tail)
}
