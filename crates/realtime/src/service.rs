//! The send pipeline: validate, store the image, persist, then push live.

use std::sync::Arc;

use parley_database::{Message, MessageContent, MessageStore, NewMessage};
use parley_media::BlobStore;
use serde::Deserialize;
use tracing::{error, info};

use crate::dispatcher::DeliveryDispatcher;
use crate::error::SendError;

/// Body of a send request. Exactly one of `text` and an image is required;
/// the image is either inline base64 data (`image`) or an existing URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

enum Payload {
    Text(String),
    InlineImage(String),
    ImageUrl(String),
}

impl SendMessageRequest {
    fn into_payload(self) -> Result<Payload, SendError> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        match (present(self.text), present(self.image), present(self.image_url)) {
            (Some(text), None, None) => Ok(Payload::Text(text)),
            (None, Some(image), None) => Ok(Payload::InlineImage(image)),
            (None, None, Some(url)) => Ok(Payload::ImageUrl(url)),
            (None, None, None) => Err(SendError::Malformed(
                "message needs text or an image".into(),
            )),
            _ => Err(SendError::Malformed(
                "message must carry either text or an image, not both".into(),
            )),
        }
    }
}

#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn MessageStore>,
    blobs: Arc<dyn BlobStore>,
    dispatcher: DeliveryDispatcher,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        blobs: Arc<dyn BlobStore>,
        dispatcher: DeliveryDispatcher,
    ) -> Self {
        Self {
            store,
            blobs,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &DeliveryDispatcher {
        &self.dispatcher
    }

    /// Persist a message from `sender_id` and push it to the receiver if online.
    ///
    /// The message is durable before any push is attempted; a failed append
    /// means nothing is pushed. Push failures never fail the send.
    pub async fn send(
        &self,
        sender_id: &str,
        request: SendMessageRequest,
    ) -> Result<Message, SendError> {
        let receiver_id = request.receiver_id.trim().to_string();
        if receiver_id.is_empty() {
            return Err(SendError::Malformed("receiver is required".into()));
        }

        let content = match request.into_payload()? {
            Payload::Text(text) => MessageContent::Text(text),
            Payload::ImageUrl(url) => MessageContent::ImageUrl(url),
            Payload::InlineImage(data) => MessageContent::ImageUrl(self.blobs.store(&data).await?),
        };

        let message = self
            .store
            .append(NewMessage::new(sender_id, receiver_id, content))
            .await
            .map_err(|err| {
                let err = SendError::from(err);
                if let SendError::StoreUnavailable(source) = &err {
                    error!(sender_id, error = %source, "message append failed");
                }
                err
            })?;

        let report = self.dispatcher.dispatch(&message);
        info!(
            message_id = message.id,
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            pushed = report.delivered,
            "message sent"
        );

        Ok(message)
    }

    /// Both directions of the conversation between `a` and `b`, oldest first.
    pub async fn conversation(&self, a: &str, b: &str) -> Result<Vec<Message>, SendError> {
        self.store
            .query_conversation(a, b)
            .await
            .map_err(SendError::StoreUnavailable)
    }
}
