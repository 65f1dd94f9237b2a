use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::{AppConfig, JwtConfig, StoreBackend};
use crate::db;
use crate::history::repo::{HistoryStore, PgHistoryStore};
use crate::memory::MemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub history: Arc<dyn HistoryStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        match &config.store {
            StoreBackend::Postgres { database_url } => {
                let db = db::connect(database_url).await?;
                db::migrate(&db).await?;
                info!("using postgres store");
                Ok(Self::from_parts(
                    config.clone(),
                    Arc::new(PgUserStore::new(db.clone())),
                    Arc::new(PgHistoryStore::new(db)),
                ))
            }
            StoreBackend::Memory => {
                warn!("using in-memory store; data is lost on restart");
                Ok(Self::in_memory(config.clone()))
            }
        }
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            config,
            users,
            history,
        }
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        let store = Arc::new(MemoryStore::default());
        Self::from_parts(config, store.clone(), store)
    }

    /// Memory-backed state with a fixed JWT config, for tests.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store: StoreBackend::Memory,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            client_url: None,
            normalize_email: false,
        });
        Self::in_memory(config)
    }
}
