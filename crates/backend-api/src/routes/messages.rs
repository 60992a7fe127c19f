use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use parley_auth::User;
use parley_realtime::SendMessageRequest;
use tracing::debug;

use crate::{
    routes::models::{
        MarkReadResponse, MessageResponse, MessagesResponse, SendMessageBody, SidebarResponse,
        SidebarUser,
    },
    util::require_token,
    ApiError, AppState,
};

async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = require_token(headers)?;
    let (user, _session) = state.authenticate(&token).await?;
    Ok(user)
}

#[utoipa::path(
    get,
    path = "/api/messages/users",
    tag = "Messages",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Everyone else, with presence and unread counts", body = SidebarResponse),
        (status = 401, description = "Missing or invalid session", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_sidebar_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SidebarResponse>, ApiError> {
    let user = current_user(&state, &headers).await?;

    let others = state
        .authenticator()
        .list_users_except(&user.public_id)
        .await?;
    let unseen_messages = state.repository().unseen_counts(&user.public_id).await?;

    let registry = state.registry();
    let users = others
        .into_iter()
        .map(|other| SidebarUser {
            online: registry.is_online(&other.public_id),
            user: other.into(),
        })
        .collect();

    Ok(Json(SidebarResponse {
        users,
        unseen_messages,
    }))
}

#[utoipa::path(
    get,
    path = "/api/messages/{user_id}",
    tag = "Messages",
    security(("bearerAuth" = [])),
    params(("user_id" = String, Path, description = "The other participant")),
    responses(
        (status = 200, description = "Conversation, oldest first", body = MessagesResponse),
        (status = 401, description = "Missing or invalid session", body = crate::error::ErrorResponse),
        (status = 404, description = "No such user", body = crate::error::ErrorResponse),
        (status = 503, description = "Message store unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessagesResponse>, ApiError> {
    let user = current_user(&state, &headers).await?;
    let peer = state.authenticator().user_profile(&peer_id).await?;

    let messages = state
        .messages()
        .conversation(&user.public_id, &peer.public_id)
        .await?;

    // Only what this response shows counts as read.
    let shown_up_to = messages
        .iter()
        .filter(|message| message.sender_id == peer.public_id)
        .map(|message| message.id)
        .max();
    if let Some(shown_up_to) = shown_up_to {
        let cursor = state
            .repository()
            .mark_conversation_read(&user.public_id, &peer.public_id, Some(shown_up_to))
            .await?;
        debug!(user_id = %user.public_id, peer_id = %peer.public_id, cursor, "conversation read");
    }

    Ok(Json(MessagesResponse {
        messages: messages.into_iter().map(MessageResponse::from).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/messages/mark/{user_id}",
    tag = "Messages",
    security(("bearerAuth" = [])),
    params(("user_id" = String, Path, description = "Sender whose messages are now read")),
    responses(
        (status = 200, description = "Read cursor after the update", body = MarkReadResponse),
        (status = 401, description = "Missing or invalid session", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let user = current_user(&state, &headers).await?;
    let last_read_id = state
        .repository()
        .mark_conversation_read(&user.public_id, &peer_id, None)
        .await?;
    Ok(Json(MarkReadResponse { last_read_id }))
}

#[utoipa::path(
    post,
    path = "/api/messages/send/{user_id}",
    tag = "Messages",
    security(("bearerAuth" = [])),
    params(("user_id" = String, Path, description = "Receiver")),
    request_body = SendMessageBody,
    responses(
        (status = 201, description = "Persisted message", body = MessageResponse),
        (status = 400, description = "Neither or both of text and image", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = crate::error::ErrorResponse),
        (status = 404, description = "Receiver does not exist", body = crate::error::ErrorResponse),
        (status = 413, description = "Image too large", body = crate::error::ErrorResponse),
        (status = 503, description = "Message store unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Path(receiver_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SendMessageBody>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let user = current_user(&state, &headers).await?;

    let message = state
        .messages()
        .send(
            &user.public_id,
            SendMessageRequest {
                receiver_id,
                text: body.text,
                image: body.image,
                image_url: body.image_url,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message.into())))
}
