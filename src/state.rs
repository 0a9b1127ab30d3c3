use std::sync::Arc;

use crate::{
    assets::AssetStore,
    config::Config,
    database::{DocumentStore, RedisStore},
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub assets: AssetStore,
}

impl State {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store = Arc::new(RedisStore::connect(&config.redis_url).await);
        let assets = AssetStore::open(&config.uploads_dir)
            .await
            .expect("Uploads directory misconfigured!");

        Arc::new(Self {
            config,
            store,
            assets,
        })
    }

    /// Composition-root constructor: tests run the same router over a
    /// [`crate::database::MemoryStore`] and a temp uploads directory.
    pub fn with_parts(config: Config, store: Arc<dyn DocumentStore>, assets: AssetStore) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            assets,
        })
    }
}
