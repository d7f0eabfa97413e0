mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Json, Router};
use clap::Args;
use temps_core::JobQueue;
use temps_ingest::{
    ApiDoc, AppState, CachedCredentialStore, CredentialCacheConfig, CredentialResolver,
    CredentialStore, DatabaseCredentialStore, GatewayConfig, IngestionGateway,
    StaticCredentialStore,
};
use temps_payload_cache::{
    CacheBackend, InMemoryPayloadCache, PayloadCache, PayloadCacheConfig, RedisPayloadCache,
};
use temps_queue::{spawn_job_logger, BroadcastQueueService};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use utoipa::OpenApi;

use shutdown::{drain_job_logger, shutdown_signal};

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1:3000", env = "TEMPS_ADDRESS")]
    pub address: String,

    /// Redis URL for the payload cache (in-memory cache when unset)
    #[arg(long, env = "TEMPS_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Database connection URL for the project_dsns credential store
    #[arg(long, env = "TEMPS_DATABASE_URL")]
    pub database_url: Option<String>,

    /// YAML file with static credentials, used instead of the database
    #[arg(long, env = "TEMPS_KEYS_FILE", conflicts_with = "database_url")]
    pub keys_file: Option<PathBuf>,

    /// Maximum event body size in bytes, compressed or not
    #[arg(long, default_value_t = temps_ingest::config::DEFAULT_MAX_EVENT_SIZE, env = "TEMPS_MAX_EVENT_SIZE")]
    pub max_event_size: usize,

    /// Seconds a resolved credential stays cached
    #[arg(long, default_value_t = 60, env = "TEMPS_CREDENTIAL_CACHE_TTL")]
    pub credential_cache_ttl: u64,

    /// Capacity of the in-process job queue
    #[arg(long, default_value_t = 1000, env = "TEMPS_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Reject browser submissions from origins a key does not allow
    #[arg(long, default_value_t = true, env = "TEMPS_ENFORCE_ORIGINS", action = clap::ArgAction::Set)]
    pub enforce_origins: bool,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let store = self.credential_store().await?;
        let store: Arc<dyn CredentialStore> = Arc::new(CachedCredentialStore::new(
            store,
            CredentialCacheConfig {
                ttl_secs: self.credential_cache_ttl,
            },
        ));

        let cache_config = PayloadCacheConfig {
            redis_url: self.redis_url.clone(),
            ..PayloadCacheConfig::default()
        };
        let cache = payload_cache(&cache_config).await?;

        let (queue, initial_receiver) =
            BroadcastQueueService::create_broadcast_channel(self.queue_capacity);
        let job_logger = spawn_job_logger(queue.subscribe());
        drop(initial_receiver);
        let queue: Arc<dyn JobQueue> = Arc::new(queue);

        let gateway = Arc::new(IngestionGateway::new(
            CredentialResolver::new(store),
            cache,
            queue,
            GatewayConfig {
                max_event_size: self.max_event_size,
                enforce_origins: self.enforce_origins,
                ..GatewayConfig::default()
            },
        ));

        let state = Arc::new(AppState { gateway });
        let app = Router::new()
            .nest("/api", temps_ingest::configure_routes().with_state(state))
            .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }));

        let listener = TcpListener::bind(&self.address)
            .await
            .with_context(|| format!("Failed to bind {}", self.address))?;
        info!("Event admission server listening on {}", self.address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        // The router owned the last queue sender; the logger sees the close
        drain_job_logger(job_logger, Duration::from_secs(5)).await;
        info!("Server stopped");
        Ok(())
    }

    async fn credential_store(&self) -> anyhow::Result<Arc<dyn CredentialStore>> {
        if let Some(path) = &self.keys_file {
            let store = StaticCredentialStore::from_yaml_file(path)
                .await
                .with_context(|| format!("Failed to load keys file {}", path.display()))?;
            if store.is_empty() {
                warn!("Keys file {} defines no credentials", path.display());
            }
            return Ok(Arc::new(store));
        }

        let Some(database_url) = &self.database_url else {
            anyhow::bail!("Either --database-url or --keys-file must be provided");
        };

        debug!("Initializing database connection...");
        let db = sea_orm::Database::connect(database_url.as_str())
            .await
            .context("Failed to connect to the credential database")?;
        info!("Using project_dsns table as credential store");
        Ok(Arc::new(DatabaseCredentialStore::new(Arc::new(db))))
    }
}

async fn payload_cache(config: &PayloadCacheConfig) -> anyhow::Result<Arc<dyn PayloadCache>> {
    match config.backend() {
        CacheBackend::Redis { url } => {
            let cache = RedisPayloadCache::connect(&url, config.key_prefix.clone())
                .await
                .context("Failed to connect to Redis payload cache")?;
            info!("Using Redis payload cache ({})", config.key_prefix);
            Ok(Arc::new(cache))
        }
        CacheBackend::Memory => {
            warn!("No Redis URL configured, payloads are cached in memory");
            Ok(Arc::new(InMemoryPayloadCache::new()))
        }
    }
}
