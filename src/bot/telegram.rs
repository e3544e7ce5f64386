//! Telegram Bot API client: long polling, replies and file downloads.

use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode, header};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};
use yup_oauth2::hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};

use super::{
    Attachment, ChatKind, FileSource, InboundMessage, OutboundMessage, Sender, TransportError,
};

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    message_id: i64,
    date: i64,
    chat: Chat,
    from: Option<User>,
    message_thread_id: Option<i64>,
    text: Option<String>,
    caption: Option<String>,
    photo: Option<Vec<PhotoSize>>,
    document: Option<Document>,
}

#[derive(Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: ChatKind,
}

#[derive(Deserialize)]
struct User {
    id: i64,
    username: Option<String>,
    #[serde(default)]
    first_name: String,
    last_name: Option<String>,
}

#[derive(Deserialize)]
struct PhotoSize {
    file_id: String,
    file_size: Option<u64>,
}

#[derive(Deserialize)]
struct Document {
    file_id: String,
    file_name: Option<String>,
    mime_type: Option<String>,
    file_size: Option<u64>,
}

#[derive(Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

impl Message {
    fn into_inbound(self) -> InboundMessage {
        // Telegram lists photo sizes smallest first.
        let attachment = match (self.document, self.photo) {
            (Some(doc), _) => Some(Attachment {
                file_id: doc.file_id,
                file_name: doc.file_name,
                mime: doc.mime_type,
                size: doc.file_size,
                is_photo: false,
            }),
            (None, Some(sizes)) => sizes.into_iter().last().map(|p| Attachment {
                file_id: p.file_id,
                file_name: None,
                mime: None,
                size: p.file_size,
                is_photo: true,
            }),
            (None, None) => None,
        };
        let sender = self
            .from
            .map(|u| Sender {
                id: u.id,
                username: u.username,
                first_name: u.first_name,
                last_name: u.last_name,
            })
            .unwrap_or_default();
        InboundMessage {
            message_id: self.message_id,
            chat_id: self.chat.id,
            chat_kind: self.chat.kind,
            thread_id: self.message_thread_id,
            sender,
            text: if attachment.is_some() {
                self.caption
            } else {
                self.text
            },
            attachment,
            date: DateTime::<Utc>::from_timestamp(self.date, 0).unwrap_or_default(),
        }
    }
}

/// Blocking client for the Bot API. Owns its own runtime like the storage
/// adapters so the polling loop stays synchronous.
pub struct TelegramClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    rt: tokio::runtime::Runtime,
    base_url: String,
    token: String,
    offset: i64,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_base_url(token, "https://api.telegram.org/")
    }

    /// Client against a custom API root (ends with `/`).
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let rt = tokio::runtime::Runtime::new().map_err(|e| TransportError::Http(e.to_string()))?;
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| TransportError::Http(e.to_string()))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https);
        Ok(Self {
            client,
            rt,
            base_url: base_url.into(),
            token: token.into(),
            offset: 0,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}bot{}/{}", self.base_url, self.token, method)
    }

    async fn fetch(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Bytes), TransportError> {
        let mut builder = Request::builder().method(method).uri(url);
        let payload = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Full::from(Bytes::from(json.to_string()))
            }
            None => Full::new(Bytes::new()),
        };
        let req = builder
            .body(payload)
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?
            .to_bytes();
        Ok((status, bytes))
    }

    /// Bot API errors come back as `ok: false` with a description, whatever
    /// the status code.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
    ) -> Result<T, TransportError> {
        let url = self.method_url(method);
        let (status, bytes) = self.fetch(Method::POST, &url, Some(body)).await?;
        if status.is_server_error() {
            return Err(TransportError::Api(format!("{method} returned {status}")));
        }
        let res: ApiResponse<T> =
            serde_json::from_slice(&bytes[..]).map_err(|e| TransportError::Decode(e.to_string()))?;
        if !res.ok {
            return Err(TransportError::Api(
                res.description.unwrap_or_else(|| format!("{method} failed")),
            ));
        }
        res.result
            .ok_or_else(|| TransportError::Decode(format!("{method} returned no result")))
    }

    /// Long-polls for new messages, waiting up to `timeout_secs`. Updates are
    /// acknowledged by the next call.
    pub fn get_updates(
        &mut self,
        timeout_secs: u64,
    ) -> Result<Vec<InboundMessage>, TransportError> {
        let body = json!({
            "offset": self.offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let updates: Vec<Update> = self.rt.block_on(self.call("getUpdates", body))?;
        if let Some(last) = updates.last() {
            self.offset = last.update_id + 1;
        }
        debug!(count = updates.len(), offset = self.offset, "Polled updates");
        Ok(updates
            .into_iter()
            .filter_map(|u| u.message)
            .map(Message::into_inbound)
            .collect())
    }

    pub fn send(&self, msg: &OutboundMessage) -> Result<(), TransportError> {
        let mut body = json!({"chat_id": msg.chat_id, "text": msg.text});
        if let Some(thread) = msg.thread_id {
            body["message_thread_id"] = json!(thread);
        }
        if let Some(reply_to) = msg.reply_to {
            body["reply_parameters"] = json!({
                "message_id": reply_to,
                "allow_sending_without_reply": true,
            });
        }
        let result: Result<Value, TransportError> =
            self.rt.block_on(self.call("sendMessage", body));
        if let Err(e) = &result {
            warn!(chat_id = msg.chat_id, error = %e, "sendMessage failed");
        }
        result.map(|_| ())
    }
}

impl FileSource for TelegramClient {
    fn download(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        self.rt.block_on(async {
            let info: FileInfo = self.call("getFile", json!({"file_id": file_id})).await?;
            let path = info
                .file_path
                .ok_or_else(|| TransportError::Api(format!("file {file_id} has no path")))?;
            let url = format!("{}file/bot{}/{}", self.base_url, self.token, path);
            let (status, bytes) = self.fetch(Method::GET, &url, None).await?;
            if !status.is_success() {
                return Err(TransportError::Api(format!("download returned {status}")));
            }
            debug!(file_id, size = bytes.len(), "Downloaded file");
            Ok(bytes.to_vec())
        })
    }
}
