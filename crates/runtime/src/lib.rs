use std::sync::Arc;

use anyhow::{Context, Result};
use parley_auth::Authenticator;
use parley_backend_api::{ApiSettings, AppState};
use parley_config::AppConfig;
use parley_database::{initialize_database, MessageRepository};
use parley_media::LocalBlobStore;
use parley_realtime::{DeliveryDispatcher, MessageService, PresenceRegistry};
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Install the global subscriber. `RUST_LOG` overrides the `info` default.
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the HTTP layer needs, wired from one config.
///
/// Presence starts empty on every boot and fills from new connections.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub repository: MessageRepository,
    pub blobs: Arc<LocalBlobStore>,
    pub registry: Arc<PresenceRegistry>,
    pub messages: MessageService,
    settings: ApiSettings,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let authenticator = Authenticator::new(db_pool.clone(), config.auth.clone());
        let repository = MessageRepository::new(db_pool.clone());

        let blobs = Arc::new(LocalBlobStore::new(&config.media));
        blobs
            .ensure_root()
            .await
            .with_context(|| format!("failed to create media root {}", blobs.root().display()))?;

        let registry = Arc::new(PresenceRegistry::new());
        let messages = MessageService::new(
            Arc::new(repository.clone()),
            blobs.clone(),
            DeliveryDispatcher::new(Arc::clone(&registry)),
        );

        info!(
            database = %config.database.url,
            media_root = %blobs.root().display(),
            "backend services ready"
        );

        Ok(Self {
            db_pool,
            authenticator,
            repository,
            blobs,
            registry,
            messages,
            settings: ApiSettings::from_config(config),
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.authenticator.clone(),
            self.repository.clone(),
            self.messages.clone(),
            self.settings.clone(),
        )
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
