mod config;
mod services;
mod stores;
mod system;

pub use config::{Config, StoreKind};
pub use services::FreeBusyNotifier;
pub use stores::document::{
    AlarmState, AlarmStateRepo, DocumentStore, FolderBackend, FolderInfo, ImapFolderBackend,
    InMemoryAlarmStateRepo, InMemoryFolderBackend, PostgresAlarmStateRepo,
};
pub use stores::relational::RelationalStore;
pub use stores::{Capabilities, EventStore};
pub use system::{FixedSys, ISys, RealSys};

use chrono::{DateTime, Utc};
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[derive(Clone)]
pub struct AlmanacContext {
    pub store: Arc<dyn EventStore>,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
}

impl AlmanacContext {
    pub fn new(store: Arc<dyn EventStore>, config: Config, sys: Arc<dyn ISys>) -> Self {
        Self { store, config, sys }
    }

    /// Context over the in-memory document backend; what tests run against.
    pub fn create_inmemory(owner: &str) -> Self {
        Self::create_inmemory_with_sys(owner, Arc::new(RealSys {}))
    }

    /// Same, with a pinned clock.
    pub fn create_inmemory_at(owner: &str, now: DateTime<Utc>) -> Self {
        Self::create_inmemory_with_sys(owner, Arc::new(FixedSys(now)))
    }

    fn create_inmemory_with_sys(owner: &str, sys: Arc<dyn ISys>) -> Self {
        let store = Arc::new(DocumentStore::new(
            Arc::new(InMemoryFolderBackend::new(owner)),
            Arc::new(InMemoryAlarmStateRepo::new()),
            FreeBusyNotifier::disabled(),
            sys.clone(),
            "Calendar",
        ));
        Self {
            store,
            config: Config::new(),
            sys,
        }
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> AlmanacContext {
    let config = Config::new();
    let sys: Arc<dyn ISys> = Arc::new(RealSys {});

    let store: Arc<dyn EventStore> = match config.store {
        StoreKind::Database => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&get_psql_connection_string())
                .await
                .expect("Postgres credentials must be set and valid");
            Arc::new(RelationalStore::new(pool, sys.clone()))
        }
        StoreKind::Imap => {
            // alarm dismiss/snooze state still lives in SQL next to the
            // document server
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&get_psql_connection_string())
                .await
                .expect("Postgres credentials must be set and valid");
            let backend = Arc::new(ImapFolderBackend::new(
                config.imap_host.clone(),
                config.imap_port,
                config.imap_user.clone(),
                config.imap_password.clone(),
                config.imap_calendar_root.clone(),
            ));
            Arc::new(DocumentStore::new(
                backend,
                Arc::new(PostgresAlarmStateRepo::new(pool)),
                FreeBusyNotifier::new(config.freebusy_trigger_url.clone()),
                sys.clone(),
                config.imap_calendar_root.clone(),
            ))
        }
    };

    AlmanacContext::new(store, config, sys)
}

fn get_psql_connection_string() -> String {
    const PSQL_CONNECTION_STRING: &str = "DATABASE_URL";

    std::env::var(PSQL_CONNECTION_STRING)
        .unwrap_or_else(|_| panic!("{} env var to be present.", PSQL_CONNECTION_STRING))
}

pub async fn run_migration() -> Result<(), MigrateError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&get_psql_connection_string())
        .await
        .expect("Postgres credentials must be set and valid");

    sqlx::migrate!("../../migrations").run(&pool).await
}
