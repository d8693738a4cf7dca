//! Process-local cache of full result payloads behind opaque tokens.
//!
//! A summary response that trimmed its result list mints a token here; the
//! caller redeems it to get the full dataset without the first response
//! carrying the bulk inline. Entries expire on a TTL measured from
//! creation — redeeming a token does not renew it, so a chatty caller
//! cannot pin memory indefinitely.

use ahash::AHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use xxhash_rust::xxh3::xxh3_64;

struct Entry {
    payload: serde_json::Value,
    created: Instant,
    estimated_tokens: u32,
}

/// TTL'd token → payload cache.
pub struct DetailCache {
    entries: Mutex<AHashMap<String, Entry>>,
    ttl: Duration,
    sequence: AtomicU64,
}

impl DetailCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(AHashMap::new()),
            ttl,
            sequence: AtomicU64::new(1),
        }
    }

    /// Stores a payload and returns its redemption token.
    pub fn insert(&self, payload: serde_json::Value, estimated_tokens: u32) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let digest = xxh3_64(payload.to_string().as_bytes());
        let token = format!("detail-{seq:04x}{:012x}", digest & 0xffff_ffff_ffff);

        let mut entries = self.lock();
        Self::purge_expired(&mut entries, self.ttl);
        entries.insert(
            token.clone(),
            Entry {
                payload,
                created: Instant::now(),
                estimated_tokens,
            },
        );
        token
    }

    /// Redeems a token. Expired and unknown tokens both return `None`.
    #[must_use]
    pub fn fetch(&self, token: &str) -> Option<(serde_json::Value, u32)> {
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, self.ttl);
        entries
            .get(token)
            .map(|e| (e.payload.clone(), e.estimated_tokens))
    }

    /// Live entry count (diagnostics).
    #[must_use]
    pub fn len(&self) -> usize {
        let mut entries = self.lock();
        Self::purge_expired(&mut entries, self.ttl);
        entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AHashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn purge_expired(entries: &mut AHashMap<String, Entry>, ttl: Duration) {
        entries.retain(|_, e| e.created.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_fetch() {
        let cache = DetailCache::new(Duration::from_secs(60));
        let token = cache.insert(serde_json::json!({"results": [1, 2, 3]}), 12);
        assert!(token.starts_with("detail-"));

        let (payload, tokens) = cache.fetch(&token).unwrap();
        assert_eq!(payload["results"][2], 3);
        assert_eq!(tokens, 12);
    }

    #[test]
    fn test_unknown_token_is_none() {
        let cache = DetailCache::new(Duration::from_secs(60));
        assert!(cache.fetch("detail-bogus").is_none());
    }

    #[test]
    fn test_expiry() {
        let cache = DetailCache::new(Duration::from_millis(20));
        let token = cache.insert(serde_json::json!([]), 1);
        assert!(cache.fetch(&token).is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.fetch(&token).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fetch_does_not_renew_ttl() {
        let cache = DetailCache::new(Duration::from_millis(60));
        let token = cache.insert(serde_json::json!([]), 1);

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.fetch(&token).is_some());
        // A renewing cache would still hold the entry at +80ms.
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.fetch(&token).is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        let cache = DetailCache::new(Duration::from_secs(60));
        let a = cache.insert(serde_json::json!([1]), 1);
        let b = cache.insert(serde_json::json!([1]), 1);
        assert_ne!(a, b);
    }
}
