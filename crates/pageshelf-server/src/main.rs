//! Pageshelf HTTP API Server binary

use pageshelf::clock::{SharedClock, SystemClock};
use pageshelf::{Authenticator, SecretSet};
use pageshelf_registry::{
    BlobStorage, KvStorage, MemoryKvStorage, MemoryStorage, RateLimitConfig, RedisKvStorage,
    Registry, S3Storage,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info, warn};

use pageshelf_server::config::{ServerConfig, StorageBackend};
use pageshelf_server::error::{ApiError, Result};
use pageshelf_server::{AppState, create_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "pageshelf_server=debug,tower_http=debug".to_string()),
        )
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;
    info!(
        "Starting Pageshelf Server on {}:{} ({:?} storage)",
        config.host, config.port, config.storage_backend
    );

    let clock: SharedClock = Arc::new(SystemClock);
    let (blobs, kv) = storage_backends(&config, clock.clone()).await?;

    let registry = Registry::builder(blobs, kv)
        .with_clock(clock.clone())
        .with_rate_limit(RateLimitConfig {
            window_seconds: config.rate_limit_window_seconds,
            limit: config.rate_limit_max,
        })
        .build();

    let authenticator = Authenticator::new(
        SecretSet::from_csv(&config.publish_secret),
        config.signature_tolerance_ms,
        clock,
    )
    .require_signature(config.require_signature);
    if !authenticator.is_enforced() {
        warn!("PUBLISH_SECRET is not set; anyone can publish and roll back pages");
    } else if config.publish_secret.trim().is_empty() {
        warn!("REQUIRE_SIGNATURE is set without PUBLISH_SECRET; every mutation will be rejected");
    }

    let state = AppState {
        registry: Arc::new(registry),
        authenticator: Arc::new(authenticator),
        config: config.clone(),
    };

    let app = create_router(state);

    let ip: std::net::IpAddr = config
        .host
        .parse()
        .map_err(|_| ApiError::Config(format!("Invalid HOST value: {}", config.host)))?;
    let addr = SocketAddr::from((ip, config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn storage_backends(
    config: &ServerConfig,
    clock: SharedClock,
) -> Result<(Arc<dyn BlobStorage>, Arc<dyn KvStorage>)> {
    match config.storage_backend {
        StorageBackend::Memory => Ok((
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryKvStorage::with_clock(clock)),
        )),
        StorageBackend::S3 => {
            let s3 = S3Storage::from_env()
                .map_err(|e| ApiError::Config(format!("S3 storage: {e}")))?;
            if let Err(e) = s3.ensure_bucket().await {
                error!("Failed to ensure S3 bucket exists: {}", e);
            }

            let redis_url = config.redis_url.as_deref().ok_or_else(|| {
                ApiError::Config("REDIS_URL is required with STORAGE_BACKEND=s3".to_string())
            })?;
            let redis = RedisKvStorage::connect(redis_url)
                .await
                .map_err(|e| ApiError::Config(format!("Redis: {e}")))?;

            Ok((Arc::new(s3), Arc::new(redis)))
        }
    }
}
