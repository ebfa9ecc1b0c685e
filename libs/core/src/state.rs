//! Wiring of stores and services

use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    config::Config,
    db::{
        LinkStore, MemoryStore, PatientDirectory, PostgresLinkStore, PostgresPatientDirectory,
        PostgresVersionStore, VersionStore,
    },
    services::{LinkGraph, MatchEngine, ResourcePatcher, VersionService},
    Result,
};

/// The assembled record core. Cheap to clone.
#[derive(Clone)]
pub struct Core {
    pub config: Arc<Config>,
    /// Present when backed by PostgreSQL
    pub db_pool: Option<PgPool>,
    pub versions: Arc<VersionService>,
    pub patcher: Arc<ResourcePatcher>,
    pub matcher: Arc<MatchEngine>,
    pub links: Arc<LinkGraph>,
}

impl Core {
    /// Connect to PostgreSQL, run migrations if configured, and wire the services.
    pub async fn connect(config: Config) -> Result<Self> {
        tracing::info!("Initializing record core...");

        let db_pool = create_db_pool(&config).await?;

        if config.database.run_migrations {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&db_pool).await?;
        }

        Ok(Self::from_pool(config, db_pool))
    }

    /// Wire the services onto an existing pool. Migrations are the caller's concern.
    pub fn from_pool(config: Config, db_pool: PgPool) -> Self {
        let mut core = Self::from_stores(
            config,
            Arc::new(PostgresVersionStore::new(db_pool.clone())),
            Arc::new(PostgresPatientDirectory::new(db_pool.clone())),
            Arc::new(PostgresLinkStore::new(db_pool.clone())),
        );
        core.db_pool = Some(db_pool);
        core
    }

    /// Process-local stores, for tests and non-durable embedders.
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::from_stores(config, store.clone(), store.clone(), store)
    }

    pub fn from_stores(
        config: Config,
        version_store: Arc<dyn VersionStore>,
        directory: Arc<dyn PatientDirectory>,
        link_store: Arc<dyn LinkStore>,
    ) -> Self {
        let versions = Arc::new(VersionService::new(version_store, config.history.clone()));
        let patcher = Arc::new(ResourcePatcher::new(
            versions.clone(),
            config.patch.drop_narrative,
        ));
        let matcher = Arc::new(MatchEngine::new(
            directory,
            config.matching.candidate_pool_limit,
        ));
        let links = Arc::new(LinkGraph::new(link_store));

        Self {
            config: Arc::new(config),
            db_pool: None,
            versions,
            patcher,
            matcher,
            links,
        }
    }
}

async fn create_db_pool(config: &Config) -> Result<PgPool> {
    tracing::info!("Creating database connection pool...");

    let statement_timeout = config.database.statement_timeout_seconds;
    let lock_timeout = config.database.lock_timeout_seconds;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(config.database.pool_min_size)
        .max_connections(config.database.pool_max_size)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.pool_timeout_seconds,
        ))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET statement_timeout = '{}s'", statement_timeout))
                    .execute(&mut *conn)
                    .await?;

                // A writer waiting on a contended head row fails fast
                sqlx::query(&format!("SET lock_timeout = '{}s'", lock_timeout))
                    .execute(&mut *conn)
                    .await?;

                Ok(())
            })
        })
        .connect(&config.database.url)
        .await?;

    tracing::info!(
        "Database pool created (min: {}, max: {})",
        config.database.pool_min_size,
        config.database.pool_max_size
    );

    Ok(pool)
}
