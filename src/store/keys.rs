//! Key namespacing for the shared store.
//!
//! Each component is the only writer of its own prefix. Operators may inspect
//! or clear these keys by hand during incidents.

/// Prefix owned by circuit breakers.
pub const CIRCUIT_PREFIX: &str = "circuit:";
/// Prefix owned by result caches.
pub const CACHE_PREFIX: &str = "cache:";
/// Prefix owned by the dedup tracker.
pub const DEDUP_PREFIX: &str = "dedup:";

/// `circuit:<dependency>:state`
pub fn circuit_state_key(dependency: &str) -> String {
    format!("{CIRCUIT_PREFIX}{dependency}:state")
}

/// `cache:<namespace>:<keyHash>`
pub fn cache_entry_key(namespace: &str, key_hash: &str) -> String {
    format!("{CACHE_PREFIX}{}:{key_hash}", escape_segment(namespace))
}

/// `cache:<namespace>:` (every entry of one cache)
pub fn cache_namespace_prefix(namespace: &str) -> String {
    format!("{CACHE_PREFIX}{}:", escape_segment(namespace))
}

/// Escape `%` and `:` so a namespace never spans more than one key segment.
///
/// Without this, the prefix of `search` would also cover `search:v2`.
fn escape_segment(segment: &str) -> std::borrow::Cow<'_, str> {
    if !segment.contains([':', '%']) {
        return std::borrow::Cow::Borrowed(segment);
    }
    let mut escaped = String::with_capacity(segment.len() + 4);
    for c in segment.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            other => escaped.push(other),
        }
    }
    std::borrow::Cow::Owned(escaped)
}

/// `dedup:<eventId>`
pub fn dedup_key(event_id: &str) -> String {
    format!("{DEDUP_PREFIX}{event_id}")
}
