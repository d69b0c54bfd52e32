//! Request/response endpoints of a bot provider.

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::config::EdgeServerConfig;
use crate::errors::{ClientError, remote_error_message};
use crate::message::{Blob, BotMessage, BotReply};
use crate::stream::{AbortHandle, BotStream};

/// Header carrying the bot provider API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const DEFAULT_PART_MIME: &str = "application/octet-stream";
const MAX_ERROR_BODY_CHARS: usize = 512;

const OP_SEND_MESSAGE: &str = "send message";
const OP_TRIGGER_JSON: &str = "trigger json";
const OP_TRIGGER_FORM: &str = "trigger form";
const OP_UPLOAD_BLOB: &str = "upload blob";

/// Response wrapper used by every synchronous endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default)]
    pub is_success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

type FileReader = Pin<Box<dyn AsyncRead + Send + Sync + 'static>>;

/// File attached to a multipart request.
///
/// The reader is consumed while the request body is being sent; nothing is
/// buffered up front.
pub struct FormFile {
    file_name: String,
    mime: Option<String>,
    reader: FileReader,
}

impl FormFile {
    pub fn from_reader(
        file_name: impl Into<String>,
        reader: impl AsyncRead + Send + Sync + 'static,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime: None,
            reader: Box::pin(reader),
        }
    }

    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self::from_reader(file_name, std::io::Cursor::new(bytes.into()))
    }

    /// Opens `path` for streaming; the part is named after the file.
    pub async fn open(path: impl AsRef<Path>, mime: Option<String>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ClientError::Io(format!("failed to open {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("file")
            .to_string();
        Ok(Self::from_reader(file_name, file).mime_opt(mime))
    }

    pub fn mime(self, mime: impl Into<String>) -> Self {
        self.mime_opt(Some(mime.into()))
    }

    fn mime_opt(mut self, mime: Option<String>) -> Self {
        self.mime = mime.filter(|m| !m.trim().is_empty());
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn into_part(self) -> Result<Part, ClientError> {
        let mime = self.mime.unwrap_or_else(|| DEFAULT_PART_MIME.to_string());
        let body = reqwest::Body::wrap_stream(ReaderStream::new(self.reader));
        Part::stream(body)
            .file_name(self.file_name)
            .mime_str(&mime)
            .map_err(|e| ClientError::Validation(format!("invalid mime type {mime:?}: {e}")))
    }
}

impl std::fmt::Debug for FormFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormFile")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .finish_non_exhaustive()
    }
}

/// HTTP client bound to one namespace and bot provider.
#[derive(Clone, Debug)]
pub struct BotProviderClient {
    http: reqwest::Client,
    config: Arc<EdgeServerConfig>,
}

impl BotProviderClient {
    pub fn new(config: EdgeServerConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = config.build_http_client()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &EdgeServerConfig {
        &self.config
    }

    /// Starts streaming a conversational turn. See [`BotStream::open`].
    pub async fn new_stream(
        &self,
        message: BotMessage,
        abort: AbortHandle,
    ) -> Result<BotStream, ClientError> {
        BotStream::start(self.http.clone(), &self.config, message, abort)
    }

    /// Sends a message and waits for the complete reply.
    pub async fn send_message(
        &self,
        message: &BotMessage,
        is_debug: bool,
    ) -> Result<BotReply, ClientError> {
        message.validate()?;
        let mut url = self.config.endpoint(&["message"])?;
        if is_debug {
            url.query_pairs_mut().append_pair("is_debug", "true");
        }
        debug!(
            event = "api.request",
            domain = "edgeserver",
            operation = OP_SEND_MESSAGE,
            channel_id = %message.custom_channel_id,
            message_id = %message.custom_message_id,
            is_debug
        );
        let request = self.http.post(url).json(message);
        let reply: Option<BotReply> = self.execute(OP_SEND_MESSAGE, request).await?;
        Ok(reply.unwrap_or_default())
    }

    /// Runs the provider's JSON trigger. `Ok(None)` when the server returned
    /// no data.
    pub async fn trigger_json(
        &self,
        payload: &Map<String, Value>,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.config.endpoint(&["json"])?;
        debug!(
            event = "api.request",
            domain = "edgeserver",
            operation = OP_TRIGGER_JSON,
            payload_keys = payload.len() as u64
        );
        let request = self.http.post(url).json(payload);
        self.execute(OP_TRIGGER_JSON, request).await
    }

    /// Runs the provider's form trigger: the payload goes in the `json` field,
    /// the optional file in the `file` part.
    pub async fn trigger_form(
        &self,
        payload: &Map<String, Value>,
        file: Option<FormFile>,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.config.endpoint(&["form"])?;
        let json = serde_json::to_string(payload).map_err(|e| {
            ClientError::Validation(format!("failed to serialize form payload: {e}"))
        })?;
        debug!(
            event = "api.request",
            domain = "edgeserver",
            operation = OP_TRIGGER_FORM,
            has_file = file.is_some()
        );
        let mut form = Form::new().text("json", json);
        if let Some(file) = file {
            form = form.part("file", file.into_part()?);
        }
        let request = self.http.post(url).multipart(form);
        self.execute(OP_TRIGGER_FORM, request).await
    }

    /// Uploads a file into a channel and returns its blob metadata.
    pub async fn upload_blob(&self, channel_id: &str, file: FormFile) -> Result<Blob, ClientError> {
        if channel_id.trim().is_empty() {
            return Err(ClientError::Validation(
                "custom channel id must not be empty".into(),
            ));
        }
        let url = self.config.endpoint(&["blob"])?;
        debug!(
            event = "api.request",
            domain = "edgeserver",
            operation = OP_UPLOAD_BLOB,
            channel_id = %channel_id,
            file_name = %file.file_name
        );
        let form = Form::new()
            .text("customChannelId", channel_id.to_string())
            .part("file", file.into_part()?);
        let request = self.http.post(url).multipart(form);
        let blobs: Option<Vec<Blob>> = self.execute(OP_UPLOAD_BLOB, request).await?;
        blobs
            .and_then(|blobs| blobs.into_iter().next())
            .ok_or_else(|| ClientError::Api {
                operation: OP_UPLOAD_BLOB,
                status: StatusCode::OK.as_u16(),
                message: "upload succeeded but no blob metadata returned".into(),
            })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, ClientError> {
        let response = request
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| ClientError::transport(operation, e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            ClientError::transport(operation, format!("failed to read response body: {e}"))
        })?;
        let result = decode_envelope(operation, status, &body);
        if let Err(err) = &result {
            warn!(
                event = "api.failed",
                domain = "edgeserver",
                operation,
                status = status.as_u16(),
                error = %err
            );
        }
        result
    }
}

fn decode_envelope<T: DeserializeOwned>(
    operation: &'static str,
    status: StatusCode,
    body: &[u8],
) -> Result<Option<T>, ClientError> {
    let envelope: Envelope<T> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        // Proxies and gateways answer errors with non-envelope bodies.
        Err(_) if status != StatusCode::OK => {
            return Err(ClientError::Api {
                operation,
                status: status.as_u16(),
                message: body_excerpt(body),
            });
        }
        Err(err) => return Err(ClientError::decode(operation, err)),
    };
    if status != StatusCode::OK || !envelope.is_success {
        return Err(ClientError::Api {
            operation,
            status: status.as_u16(),
            message: remote_error_message(envelope.error.as_deref(), envelope.error_code.as_deref()),
        });
    }
    Ok(envelope.data)
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "empty response body".to_string();
    }
    text.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
