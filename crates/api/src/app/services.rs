use std::sync::Arc;

use boardstock_core::Result;
use boardstock_infra::{
    InMemoryStockStore, PostgresStockStore, ProcurementMonitor, ProductionRecorder, StockStore,
};

/// The wired engine services shared by all handlers.
pub struct AppServices {
    store: Arc<dyn StockStore>,
    recorder: ProductionRecorder,
    monitor: ProcurementMonitor,
}

impl AppServices {
    pub fn from_store(store: Arc<dyn StockStore>) -> Self {
        Self {
            recorder: ProductionRecorder::new(store.clone()),
            monitor: ProcurementMonitor::new(store.clone()),
            store,
        }
    }

    /// In-memory backend (dev default, black-box tests).
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStockStore::new()))
    }

    /// Pick the backend from the environment: `DATABASE_URL` selects
    /// Postgres (schema bootstrapped on startup); unset falls back to the
    /// in-memory store.
    pub async fn from_env() -> Result<Self> {
        match std::env::var("DATABASE_URL") {
            Ok(url) => {
                let store = PostgresStockStore::connect(&url).await?;
                store.ensure_schema().await?;
                tracing::info!("using postgres stock store");
                Ok(Self::from_store(Arc::new(store)))
            }
            Err(_) => {
                tracing::warn!("DATABASE_URL not set; using in-memory stock store");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn StockStore> {
        &self.store
    }

    pub fn recorder(&self) -> &ProductionRecorder {
        &self.recorder
    }

    pub fn monitor(&self) -> &ProcurementMonitor {
        &self.monitor
    }
}
