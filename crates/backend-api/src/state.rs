use std::path::PathBuf;
use std::sync::Arc;

use parley_auth::{AuthSession, Authenticator, User};
use parley_config::{AppConfig, RealtimeConfig};
use parley_database::MessageRepository;
use parley_realtime::{MessageService, PresenceRegistry};
use tokio::sync::watch;

use crate::ApiError;

/// Router-level knobs taken from the application config.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub body_limit_bytes: usize,
    pub media_root: PathBuf,
    pub realtime: RealtimeConfig,
}

impl ApiSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            body_limit_bytes: config.http.body_limit_bytes,
            media_root: config.media.root_dir.clone(),
            realtime: config.realtime.clone(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Clone)]
pub struct AppState {
    authenticator: Authenticator,
    repository: MessageRepository,
    messages: MessageService,
    settings: Arc<ApiSettings>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(
        authenticator: Authenticator,
        repository: MessageRepository,
        messages: MessageService,
        settings: ApiSettings,
    ) -> Self {
        Self {
            authenticator,
            repository,
            messages,
            settings: Arc::new(settings),
            shutdown: Arc::new(watch::channel(false).0),
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn repository(&self) -> &MessageRepository {
        &self.repository
    }

    pub fn messages(&self) -> &MessageService {
        &self.messages
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        self.messages.dispatcher().registry()
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// Ask every open WebSocket to close. Connections opened afterwards close immediately.
    pub fn shutdown_connections(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub async fn authenticate(&self, token: &str) -> Result<(User, AuthSession), ApiError> {
        self.authenticator
            .authenticate_token(token)
            .await
            .map_err(ApiError::from)
    }
}
