use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use crate::metrics::CACHE_SIZE;
use crate::models::{ContentRequest, GeneratedContent};

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub content: GeneratedContent,
    pub created_at: Instant,
}

// Create a cache key (hash of every field that shapes the prompt)
pub fn make_cache_key(req: &ContentRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(req.content_type.as_str());
    hasher.update([0u8]);
    hasher.update(req.topic.trim());
    for keyword in &req.keywords {
        hasher.update([0u8]);
        hasher.update(keyword.trim());
    }
    hasher.update([1u8]);
    hasher.update(req.word_count.unwrap_or(0).to_le_bytes());
    hasher.update(req.platform.as_deref().unwrap_or(""));
    hasher.update([2u8]);
    if let Some(details) = &req.product_details {
        hasher.update([1u8]);
        hasher.update(details.to_string());
    }
    format!("{:x}", hasher.finalize())
}

/// Generated content keyed by request, valid for `ttl`.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fresh entry for `key`; expired entries are evicted on the way.
    pub fn get(&self, key: &str) -> Option<GeneratedContent> {
        if let Some(entry) = self.entries.get(key) {
            if entry.created_at.elapsed() < self.ttl {
                return Some(entry.content.clone());
            }
        }
        if self.entries.remove(key).is_some() {
            CACHE_SIZE.set(self.entries.len() as f64);
        }
        None
    }

    /// Store `content` under `key`, dropping every entry past its TTL.
    pub fn insert(&self, key: String, content: GeneratedContent) {
        self.entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        self.entries.insert(key, CacheEntry {
            content,
            created_at: Instant::now(),
        });
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;
    use chrono::Utc;

    fn request() -> ContentRequest {
        ContentRequest {
            content_type: ContentKind::BlogPost,
            topic: "Knife storage".into(),
            keywords: vec!["magnetic strip".into()],
            word_count: Some(900),
            platform: None,
            product_details: None,
        }
    }

    fn content() -> GeneratedContent {
        GeneratedContent {
            title: "Store knives safely".into(),
            content: "Use a strip.".into(),
            meta_description: "storage".into(),
            keywords: vec![],
            word_count: 3,
            created_at: Utc::now(),
            content_type: ContentKind::BlogPost,
        }
    }

    #[test]
    fn key_tracks_prompt_fields() {
        let base = request();
        assert_eq!(make_cache_key(&base), make_cache_key(&base.clone()));

        let mut other = base.clone();
        other.word_count = Some(1000);
        assert_ne!(make_cache_key(&base), make_cache_key(&other));

        let mut other = base.clone();
        other.content_type = ContentKind::SocialPost;
        assert_ne!(make_cache_key(&base), make_cache_key(&other));

        // keyword boundaries matter
        let mut a = base.clone();
        a.keywords = vec!["ab".into(), "c".into()];
        let mut b = base.clone();
        b.keywords = vec!["a".into(), "bc".into()];
        assert_ne!(make_cache_key(&a), make_cache_key(&b));

        // platform text cannot bleed into product details
        let mut a = base.clone();
        a.platform = Some("x{}".into());
        let mut b = base.clone();
        b.platform = Some("x".into());
        b.product_details = Some(serde_json::json!({}));
        assert_ne!(make_cache_key(&a), make_cache_key(&b));
    }

    #[test]
    fn entries_expire() {
        let cache = ResponseCache::new(Duration::from_millis(20));
        let stored = content();
        cache.insert("k".into(), stored.clone());
        assert_eq!(cache.get("k"), Some(stored));
        assert_eq!(cache.len(), 1);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_sweeps_expired_entries() {
        let cache = ResponseCache::new(Duration::from_millis(50));
        for i in 0..200 {
            cache.insert(format!("stale-{i}"), content());
        }

        std::thread::sleep(Duration::from_millis(100));
        cache.insert("fresh".into(), content());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh").is_some());
    }
}
