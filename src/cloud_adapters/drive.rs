//! Attachment storage: Google Drive folders per group, plus an in-memory
//! store for tests.

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, header};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;
use yup_oauth2::hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};

use super::auth::{DRIVE_SCOPE, TokenProvider};

/// Largest attachment accepted, 10 MiB.
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Errors raised while storing an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    TooLarge { size: u64, limit: u64 },
    Transient(String),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::TooLarge { size, limit } => {
                write!(f, "attachment of {size} bytes exceeds the {limit} byte limit")
            }
            UploadError::Transient(e) => write!(f, "upload failed: {e}"),
        }
    }
}

impl std::error::Error for UploadError {}

/// Stores a file and returns a stable link to it.
pub trait AttachmentStore {
    fn upload(
        &mut self,
        folder_id: &str,
        name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError>;
}

fn check_size(bytes: &[u8]) -> Result<(), UploadError> {
    let size = bytes.len() as u64;
    if size > MAX_ATTACHMENT_BYTES {
        return Err(UploadError::TooLarge {
            size,
            limit: MAX_ATTACHMENT_BYTES,
        });
    }
    Ok(())
}

/// One file kept by [`MemoryAttachmentStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub folder_id: String,
    pub name: String,
    pub mime: String,
    pub size: usize,
    pub url: String,
}

/// In-memory attachment store. URLs are `memory://{folder}/{name}`.
#[derive(Debug, Default)]
pub struct MemoryAttachmentStore {
    uploads: Vec<StoredAttachment>,
    failing: bool,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following upload fail with a transient error.
    pub fn fail_uploads(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn uploads(&self) -> &[StoredAttachment] {
        &self.uploads
    }
}

impl AttachmentStore for MemoryAttachmentStore {
    fn upload(
        &mut self,
        folder_id: &str,
        name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        check_size(bytes)?;
        if self.failing {
            return Err(UploadError::Transient("store unavailable".into()));
        }
        let url = format!("memory://{folder_id}/{name}");
        self.uploads.push(StoredAttachment {
            folder_id: folder_id.to_string(),
            name: name.to_string(),
            mime: mime.to_string(),
            size: bytes.len(),
            url: url.clone(),
        });
        Ok(url)
    }
}

/// Attachment store backed by the Google Drive v3 upload endpoint.
pub struct GoogleDriveStore {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    auth: Box<dyn TokenProvider>,
    rt: tokio::runtime::Runtime,
    upload_base_url: String,
}

impl GoogleDriveStore {
    /// Creates a store using the public Drive upload endpoint.
    pub fn new<A: TokenProvider>(auth: A) -> Result<Self, UploadError> {
        Self::with_base_url(auth, "https://www.googleapis.com/upload/drive/v3/")
    }

    /// Creates a store against a custom upload base URL (ends with `/`).
    pub fn with_base_url<A: TokenProvider>(
        auth: A,
        upload_base_url: impl Into<String>,
    ) -> Result<Self, UploadError> {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| UploadError::Transient(e.to_string()))?;
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| UploadError::Transient(e.to_string()))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https);
        Ok(Self {
            client,
            auth: Box::new(auth),
            rt,
            upload_base_url: upload_base_url.into(),
        })
    }

    async fn upload_async(
        &self,
        folder_id: &str,
        name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        let token = self
            .auth
            .token(&[DRIVE_SCOPE])
            .await
            .map_err(|e| UploadError::Transient(e.to_string()))?;
        let boundary = format!("ledger-{}", Uuid::new_v4().simple());
        let metadata = json!({"name": name, "parents": [folder_id]});
        debug!(folder_id, name, mime, size = bytes.len(), "Drive upload request");

        let mut body = Vec::with_capacity(bytes.len() + 512);
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let url = format!(
            "{}files?uploadType=multipart&fields=id,webViewLink&supportsAllDrives=true",
            self.upload_base_url
        );
        let req = Request::builder()
            .method(Method::POST)
            .uri(&url)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(Full::from(Bytes::from(body)))
            .map_err(|e| UploadError::Transient(e.to_string()))?;
        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| UploadError::Transient(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| UploadError::Transient(e.to_string()))?
            .to_bytes();
        if !status.is_success() {
            return Err(UploadError::Transient(format!(
                "drive returned {status}: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }
        let body: serde_json::Value = serde_json::from_slice(&bytes[..])
            .map_err(|e| UploadError::Transient(e.to_string()))?;
        let link = match (body["webViewLink"].as_str(), body["id"].as_str()) {
            (Some(link), _) => link.to_string(),
            (None, Some(id)) => format!("https://drive.google.com/file/d/{id}/view"),
            (None, None) => return Err(UploadError::Transient("response without file id".into())),
        };
        info!(folder_id, name, link = %link, "Uploaded attachment");
        Ok(link)
    }
}

impl AttachmentStore for GoogleDriveStore {
    fn upload(
        &mut self,
        folder_id: &str,
        name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        check_size(bytes)?;
        self.rt
            .block_on(self.upload_async(folder_id, name, mime, bytes))
    }
}
