//! Chat-facing layer: message types, reply rendering, the dispatcher that
//! turns one inbound message into replies, and the Telegram transport.

pub mod dispatcher;
pub mod replies;
pub mod telegram;

pub use dispatcher::Dispatcher;
pub use telegram::TelegramClient;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors raised by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request never got an HTTP answer.
    Http(String),
    /// The API answered with `ok: false` or a non-success status.
    Api(String),
    /// The answer could not be decoded.
    Decode(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Http(e) => write!(f, "http error: {e}"),
            TransportError::Api(e) => write!(f, "api error: {e}"),
            TransportError::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Sender {
    /// `@username` when set, otherwise the full name.
    pub fn display_name(&self) -> String {
        match self.username.as_deref() {
            Some(username) if !username.is_empty() => format!("@{username}"),
            _ => format!(
                "{} {}",
                self.first_name,
                self.last_name.as_deref().unwrap_or_default()
            )
            .trim()
            .to_string(),
        }
    }
}

/// A photo or document sent along with a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime: Option<String>,
    /// Size reported by the chat service, if any.
    pub size: Option<u64>,
    pub is_photo: bool,
}

impl Attachment {
    /// Extension used when naming the stored copy.
    pub fn extension(&self) -> String {
        if self.is_photo {
            return ".jpg".to_string();
        }
        self.file_name
            .as_deref()
            .and_then(|name| name.rfind('.').map(|i| name[i..].to_string()))
            .unwrap_or_default()
    }

    pub fn mime_type(&self) -> &str {
        match self.mime.as_deref() {
            Some(mime) => mime,
            None if self.is_photo => "image/jpeg",
            None => "application/octet-stream",
        }
    }
}

/// One message received from the chat service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    /// Forum topic the message was posted in.
    pub thread_id: Option<i64>,
    pub sender: Sender,
    /// Message text, or the caption when an attachment is present.
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
    pub date: DateTime<Utc>,
}

/// A reply to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub thread_id: Option<i64>,
    pub reply_to: Option<i64>,
    pub text: String,
}

impl OutboundMessage {
    /// A reply threaded under `msg`.
    pub fn reply(msg: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            chat_id: msg.chat_id,
            thread_id: msg.thread_id,
            reply_to: Some(msg.message_id),
            text: text.into(),
        }
    }
}

/// Fetches the bytes of an attachment by its file id.
pub trait FileSource {
    fn download(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_username() {
        let mut sender = Sender {
            id: 1,
            username: Some("budi".into()),
            first_name: "Budi".into(),
            last_name: Some("Santoso".into()),
        };
        assert_eq!(sender.display_name(), "@budi");
        sender.username = None;
        assert_eq!(sender.display_name(), "Budi Santoso");
        sender.last_name = None;
        assert_eq!(sender.display_name(), "Budi");
    }

    #[test]
    fn photos_are_jpegs() {
        let photo = Attachment {
            is_photo: true,
            ..Default::default()
        };
        assert_eq!(photo.extension(), ".jpg");
        assert_eq!(photo.mime_type(), "image/jpeg");

        let doc = Attachment {
            file_name: Some("nota.final.pdf".into()),
            ..Default::default()
        };
        assert_eq!(doc.extension(), ".pdf");
    }
}
