use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Notify, RwLock};

use super::{client::ArtifactStore, error::ApiError};

/// In-process artifact store. Stands in for the remote tier when running
/// offline, and can be switched to "unreachable" to exercise fallbacks.
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Value>>,
    offline: AtomicBool,
    puts: AtomicUsize,
    hold: AtomicBool,
    fetch_started: Notify,
    release: Notify,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a network error until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Store a value directly, bypassing the offline switch
    pub async fn seed(&self, key: &str, value: Value) {
        self.artifacts.write().await.insert(key.to_string(), value);
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.artifacts.read().await.get(key).cloned()
    }

    /// Hold every fetch after it has read its answer, until `release_fetches`.
    /// Simulates a slow remote whose reply goes stale while in flight.
    pub fn hold_fetches(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_fetches(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    /// Wait until a held fetch has read its answer
    pub async fn fetch_started(&self) {
        self.fetch_started.notified().await;
    }

    /// Number of successful writes so far
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), ApiError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::NetworkError("artifact store unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    fn store_name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, key: &str) -> Result<Value, ApiError> {
        self.check_online()?;
        let answer = self.get(key).await;

        if self.hold.load(Ordering::SeqCst) {
            self.fetch_started.notify_one();
            self.release.notified().await;
        }

        answer.ok_or_else(|| ApiError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, payload: &Value) -> Result<(), ApiError> {
        self.check_online()?;
        self.seed(key, payload.clone()).await;
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_then_fetch() {
        let store = MemoryArtifactStore::new();
        store.put("plan", &json!({ "a": 1 })).await.unwrap();

        assert_eq!(store.fetch("plan").await.unwrap(), json!({ "a": 1 }));
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_offline_fails_both_ways() {
        let store = MemoryArtifactStore::new();
        store.seed("plan", json!({})).await;
        store.set_offline(true);

        assert!(matches!(store.fetch("plan").await, Err(ApiError::NetworkError(_))));
        assert!(store.put("plan", &json!({})).await.is_err());
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_held_fetch_answers_with_snapshot() {
        let store = std::sync::Arc::new(MemoryArtifactStore::new());
        store.seed("plan", json!({ "v": 1 })).await;
        store.hold_fetches();

        let reader = std::sync::Arc::clone(&store);
        let pending = tokio::spawn(async move { reader.fetch("plan").await });

        store.fetch_started().await;
        store.put("plan", &json!({ "v": 2 })).await.unwrap();
        store.release_fetches();

        assert_eq!(pending.await.unwrap().unwrap(), json!({ "v": 1 }));
        assert_eq!(store.fetch("plan").await.unwrap(), json!({ "v": 2 }));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryArtifactStore::new();
        assert!(matches!(store.fetch("nope").await, Err(ApiError::NotFound(_))));
    }
}
