use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parley_auth::AuthError;
use parley_database::DatabaseError;
use parley_media::MediaError;
use parley_realtime::{RealtimeError, SendError};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        error!(error = ?error, "internal error");
        Self::internal_server_error(error.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match error {
            AuthError::InvalidCredentials
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
            AuthError::UserExists | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Database(_) | AuthError::PasswordHash(_) => {
                error!(error = ?error, "auth error");
                return Self::internal_server_error("internal authentication error");
            }
        };
        warn!(%error, %status, "auth request rejected");
        Self::new(status, error.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(error: DatabaseError) -> Self {
        error!(error = ?error, "database error");
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "message store unavailable")
    }
}

impl From<SendError> for ApiError {
    fn from(error: SendError) -> Self {
        match error {
            SendError::Malformed(message) => Self::bad_request(message),
            SendError::UnknownRecipient => Self::not_found(error.to_string()),
            SendError::Media(media) => {
                let status = match media {
                    MediaError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    MediaError::InvalidEncoding(_) | MediaError::UnsupportedType(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    MediaError::Io(_) => {
                        error!(error = ?media, "media storage failed");
                        return Self::internal_server_error("failed to store image");
                    }
                };
                Self::new(status, media.to_string())
            }
            SendError::StoreUnavailable(source) => Self::from(source),
        }
    }
}

impl From<RealtimeError> for ApiError {
    fn from(error: RealtimeError) -> Self {
        match error {
            RealtimeError::MissingCredential => Self::unauthorized("missing session token"),
            RealtimeError::Authentication(auth) => Self::from(auth),
            RealtimeError::InvalidTransition { .. } => {
                error!(%error, "connection lifecycle violated");
                Self::internal_server_error("connection setup failed")
            }
        }
    }
}
