//! Keyed in-memory storage for debates.
//!
//! Each debate sits behind its own async mutex: that mutex is the single
//! writer for the debate, while different debates never contend with each
//! other. Nothing outlives the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use roundtable_core::Debate;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

pub type SharedDebate = Arc<Mutex<Debate>>;

#[async_trait]
pub trait DebateStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<SharedDebate>;

    async fn put(&self, id: Uuid, debate: SharedDebate);

    async fn remove(&self, id: Uuid) -> Option<SharedDebate>;

    async fn list(&self) -> Vec<SharedDebate>;

    /// Drop debates not accessed within `ttl`. Debates that are locked or
    /// have a turn streaming are kept. Returns the evicted ids.
    async fn evict_idle(&self, ttl: Duration) -> Vec<Uuid>;
}

struct StoredDebate {
    debate: SharedDebate,
    last_access: Instant,
}

#[derive(Default)]
pub struct InMemoryDebateStore {
    debates: RwLock<HashMap<Uuid, StoredDebate>>,
}

impl InMemoryDebateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.debates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.debates.read().await.is_empty()
    }
}

#[async_trait]
impl DebateStore for InMemoryDebateStore {
    async fn get(&self, id: Uuid) -> Option<SharedDebate> {
        let mut debates = self.debates.write().await;
        let stored = debates.get_mut(&id)?;
        stored.last_access = Instant::now();
        Some(Arc::clone(&stored.debate))
    }

    async fn put(&self, id: Uuid, debate: SharedDebate) {
        self.debates.write().await.insert(
            id,
            StoredDebate {
                debate,
                last_access: Instant::now(),
            },
        );
    }

    async fn remove(&self, id: Uuid) -> Option<SharedDebate> {
        self.debates.write().await.remove(&id).map(|s| s.debate)
    }

    async fn list(&self) -> Vec<SharedDebate> {
        self.debates
            .read()
            .await
            .values()
            .map(|s| Arc::clone(&s.debate))
            .collect()
    }

    async fn evict_idle(&self, ttl: Duration) -> Vec<Uuid> {
        let mut debates = self.debates.write().await;
        let now = Instant::now();

        let expired: Vec<Uuid> = debates
            .iter()
            .filter(|(_, stored)| now.duration_since(stored.last_access) >= ttl)
            .filter(|(_, stored)| match stored.debate.try_lock() {
                Ok(debate) => !debate.has_active_turn(),
                Err(_) => false,
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            debates.remove(id);
            debug!(debate_id = %id, "Evicted idle debate");
        }
        expired
    }
}
