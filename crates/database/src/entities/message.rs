//! Message entity definitions

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A persisted direct message. Rows are append-only; nothing updates them.
///
/// Exactly one of `text` and `image_url` is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn content(&self) -> Option<MessageContent> {
        match (&self.text, &self.image_url) {
            (Some(text), None) => Some(MessageContent::Text(text.clone())),
            (None, Some(url)) => Some(MessageContent::ImageUrl(url.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContent {
    Text(String),
    ImageUrl(String),
}

impl MessageContent {
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::ImageUrl(_) => None,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            MessageContent::Text(_) => None,
            MessageContent::ImageUrl(url) => Some(url),
        }
    }
}

/// Input to [`crate::MessageStore::append`]; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: MessageContent,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            content,
            created_at: Utc::now(),
        }
    }

    pub fn into_message(self, id: i64) -> Message {
        let (text, image_url) = match self.content {
            MessageContent::Text(text) => (Some(text), None),
            MessageContent::ImageUrl(url) => (None, Some(url)),
        };

        Message {
            id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            text,
            image_url,
            created_at: self.created_at,
        }
    }
}

/// Fixed-width RFC 3339 so timestamps sort lexically in SQLite.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_message_splits_content_into_columns() {
        let text = NewMessage::new("alice", "bob", MessageContent::Text("hi".into())).into_message(1);
        assert_eq!(text.text.as_deref(), Some("hi"));
        assert!(text.image_url.is_none());

        let image = NewMessage::new(
            "alice",
            "bob",
            MessageContent::ImageUrl("/media/a.png".into()),
        )
        .into_message(2);
        assert!(image.text.is_none());
        assert_eq!(image.content(), Some(MessageContent::ImageUrl("/media/a.png".into())));
    }

    #[test]
    fn timestamps_sort_lexically() {
        let early = DateTime::parse_from_rfc3339("2026-01-01T09:00:00Z").unwrap().with_timezone(&Utc);
        let late = DateTime::parse_from_rfc3339("2026-01-01T10:00:00.5Z").unwrap().with_timezone(&Utc);
        assert!(format_timestamp(&early) < format_timestamp(&late));
        assert_eq!(format_timestamp(&early), "2026-01-01T09:00:00.000000Z");
    }

    #[test]
    fn serialized_message_omits_missing_content_column() {
        let message = NewMessage::new("alice", "bob", MessageContent::Text("hi".into())).into_message(7);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["text"], "hi");
        assert!(json.get("image_url").is_none());
    }
}
