use parley_auth::User;
use parley_database::{format_timestamp, Message};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub bio: String,
    pub profile_pic: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            id: value.public_id,
            email: value.email,
            full_name: value.full_name,
            bio: value.bio,
            profile_pic: value.profile_pic,
            created_at: value.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SidebarUser {
    #[serde(flatten)]
    pub user: UserResponse,
    pub online: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SidebarResponse {
    pub users: Vec<SidebarUser>,
    /// Unread message count keyed by sender id. Peers with nothing unread are omitted.
    pub unseen_messages: std::collections::HashMap<String, i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(value: Message) -> Self {
        Self {
            id: value.id,
            sender_id: value.sender_id,
            receiver_id: value.receiver_id,
            text: value.text,
            image_url: value.image_url,
            created_at: format_timestamp(&value.created_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResponse {
    pub last_read_id: i64,
}

/// Body of `POST /api/messages/send/{user_id}`. Exactly one of the image
/// fields or `text` must be set.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SendMessageBody {
    pub text: Option<String>,
    /// Inline image as a base64 `data:` URI.
    pub image: Option<String>,
    pub image_url: Option<String>,
}
