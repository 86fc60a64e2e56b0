use crate::config::{AppConfig, StoreBackend};
use crate::users::{memory::MemoryUserStore, repo::PgUserStore, repo::UserStore};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

/// Shared per-request state: the store handle, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn UserStore> = match (config.store, &config.db) {
            (StoreBackend::Postgres, Some(db_cfg)) => {
                let db = PgPoolOptions::new()
                    .max_connections(db_cfg.max_connections)
                    .connect(&db_cfg.url)
                    .await
                    .context("connect to database")?;

                // Run migrations if present
                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>
            }
            (StoreBackend::Postgres, None) => {
                anyhow::bail!("postgres store selected without database config")
            }
            (StoreBackend::Memory, _) => {
                tracing::warn!("using in-memory user store; data is lost on shutdown");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        Ok(Self::from_store(store))
    }

    pub fn from_store(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::from_store(Arc::new(MemoryUserStore::new()))
    }
}
