//! # Redis
//!
//! Document store.
//!
//! Each collection is one Redis hash: field = record key, value = the record
//! as a JSON document. Every write touches a single hash field, so each
//! record update is one atomic store operation.
//!
//! ## Collections
//!
//! - `menu`: catalog items keyed by their store-assigned numeric id
//! - `orders`: orders keyed by their human-readable order id
//! - `users`: credentials keyed by username
//!
//! Unique-key enforcement comes from `HSETNX` (insert-if-absent), which is
//! what order-id collision detection and duplicate-username rejection rely
//! on. Store-assigned ids come from an `INCR` counter per collection.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tokio::sync::Mutex;

use crate::error::AppError;

pub const MENU: &str = "menu";
pub const ORDERS: &str = "orders";
pub const USERS: &str = "users";

/// The persistence seam. One production backend (Redis) and one in-memory
/// backend used by tests and redis-less local runs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<String>, AppError>;

    /// Unconditional write, creates or replaces.
    async fn put(&self, collection: &str, key: &str, document: String) -> Result<(), AppError>;

    /// Insert-if-absent. Returns `false` when the key was already taken.
    async fn insert(&self, collection: &str, key: &str, document: String)
    -> Result<bool, AppError>;

    /// Returns whether a record was actually removed.
    async fn remove(&self, collection: &str, key: &str) -> Result<bool, AppError>;

    async fn all(&self, collection: &str) -> Result<Vec<String>, AppError>;

    /// Store-assigned numeric ids, one counter per collection.
    async fn next_id(&self, collection: &str) -> Result<u64, AppError>;
}

pub async fn init_redis(redis_url: &str) -> ConnectionManager {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url).unwrap();
    let connection_manager = client
        .get_connection_manager_with_config(config)
        .await
        .unwrap();

    connection_manager
}

pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Self {
        Self {
            manager: init_redis(redis_url).await,
        }
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.manager.clone();
        let document: Option<String> = conn.hget(collection, key).await?;

        Ok(document)
    }

    async fn put(&self, collection: &str, key: &str, document: String) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: () = conn.hset(collection, key, document).await?;

        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        key: &str,
        document: String,
    ) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let inserted: bool = conn.hset_nx(collection, key, document).await?;

        Ok(inserted)
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let removed: u32 = conn.hdel(collection, key).await?;

        Ok(removed > 0)
    }

    async fn all(&self, collection: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.manager.clone();
        let documents: Vec<String> = conn.hvals(collection).await?;

        Ok(documents)
    }

    async fn next_id(&self, collection: &str) -> Result<u64, AppError> {
        let mut conn = self.manager.clone();
        let id: u64 = conn.incr(format!("{collection}:next_id"), 1).await?;

        Ok(id)
    }
}

/// Hash-per-collection store held in process memory. Same contract as
/// [`RedisStore`], no Redis round-trips.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, HashMap<String, String>>>,
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<String>, AppError> {
        let collections = self.collections.lock().await;

        Ok(collections
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn put(&self, collection: &str, key: &str, document: String) -> Result<(), AppError> {
        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document);

        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        key: &str,
        document: String,
    ) -> Result<bool, AppError> {
        let mut collections = self.collections.lock().await;
        let records = collections.entry(collection.to_string()).or_default();

        if records.contains_key(key) {
            return Ok(false);
        }

        records.insert(key.to_string(), document);
        Ok(true)
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<bool, AppError> {
        let mut collections = self.collections.lock().await;

        Ok(collections
            .get_mut(collection)
            .is_some_and(|records| records.remove(key).is_some()))
    }

    async fn all(&self, collection: &str) -> Result<Vec<String>, AppError> {
        let collections = self.collections.lock().await;

        Ok(collections
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn next_id(&self, collection: &str) -> Result<u64, AppError> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(collection.to_string()).or_insert(0);
        *counter += 1;

        Ok(*counter)
    }
}
