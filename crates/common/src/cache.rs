//! 带 TTL 的键值缓存
//!
//! `Cache` 是对外部缓存（进程内或远端）的抽象，值以 JSON 存储，
//! `CacheExt` 在其上提供类型化的读写。

use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// 类型化读写，对任意 `Cache`（包括 trait object）可用
#[async_trait]
pub trait CacheExt: Cache {
    /// 按 `T` 读取 `key`；无法反序列化为 `T` 的条目视为未命中
    async fn get_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let Some(value) = self.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "discarding malformed cache entry");
                Ok(None)
            }
        }
    }

    async fn set_as<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.set(key, value, ttl).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 进程内缓存，过期条目在读取时惰性清除
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 清理所有过期条目，返回清理数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        domain: String,
        id: i32,
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCache::new();
        cache
            .set("cert:a.example.com", json!({"id": 1}), Duration::from_secs(60))
            .await
            .unwrap();

        let value = cache.get("cert:a.example.com").await.unwrap();
        assert_eq!(value, Some(json!({"id": 1})));
        assert_eq!(cache.get("cert:b.example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let cache = MemoryCache::new();
        cache
            .set("k", json!("v"), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(cache.get("k").await.unwrap(), None);
        // 过期条目在读取时被清除
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_live_entries() {
        let cache = MemoryCache::new();
        cache.set("old", json!(1), Duration::ZERO).await.unwrap();
        cache
            .set("live", json!(2), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("live").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new();
        cache
            .set("k", json!(true), Duration::from_secs(60))
            .await
            .unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        // 删除不存在的键不报错
        cache.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_typed_access_through_trait_object() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let entry = Entry {
            domain: "example.com".to_string(),
            id: 7,
        };
        cache
            .set_as("cert:example.com", &entry, Duration::from_secs(60))
            .await
            .unwrap();

        let loaded: Option<Entry> = cache.get_as("cert:example.com").await.unwrap();
        assert_eq!(loaded, Some(entry));
    }

    #[tokio::test]
    async fn test_malformed_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache
            .set("cert:example.com", json!("not an entry"), Duration::from_secs(60))
            .await
            .unwrap();

        let loaded: Option<Entry> = cache.get_as("cert:example.com").await.unwrap();
        assert_eq!(loaded, None);
    }
}
