use std::sync::Arc;

use tracing::info;

use crate::ai::AiClient;
use crate::config::Config;
use crate::storage::{DbStorage, MemStorage, Storage};

pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub ai: AiClient,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let storage: Arc<dyn Storage> = match &config.database_url {
            Some(url) => {
                info!("Using sqlite storage at {url}");
                Arc::new(
                    DbStorage::connect(url)
                        .await
                        .expect("Database misconfigured!"),
                )
            }
            None => {
                info!("DATABASE_URL not set, using seeded in-memory storage");
                Arc::new(MemStorage::seeded())
            }
        };

        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: Config, storage: Arc<dyn Storage>) -> Arc<Self> {
        let ai = AiClient::new(&config);
        Arc::new(Self {
            config,
            storage,
            ai,
        })
    }
}
