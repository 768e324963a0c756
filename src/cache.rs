//! Key-value cache seam. The controller keeps one entry per tree-enabled table in it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn put(&self, key: &str, value: Value);

    /// Remove and return the entry.
    async fn pull(&self, key: &str) -> Option<Value>;
}

/// Process-local cache. No expiry and no size bound.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().ok()?.get(key).cloned()
    }

    async fn put(&self, key: &str, value: Value) {
        if let Ok(mut guard) = self.entries.write() {
            guard.insert(key.to_string(), value);
        }
    }

    async fn pull(&self, key: &str) -> Option<Value> {
        self.entries.write().ok()?.remove(key)
    }
}
