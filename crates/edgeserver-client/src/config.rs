use std::fmt;
use std::time::Duration;

use crate::errors::ClientError;
use crate::policy::ReconnectPolicy;

/// Default whole-request timeout, including long-lived SSE responses.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
/// Default capacity of the producer/consumer event channel.
pub const DEFAULT_STREAM_BUFFER_CAPACITY: usize = 100;
/// Largest single SSE frame accepted before the stream fails.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_HOST: &str = "http://localhost:8080";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_BOT_PROVIDER_NAME: &str = "default-bot";

/// What the stream producer does with a frame whose payload is not a valid
/// event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameErrorPolicy {
    /// Deliver a decode error and end the stream.
    #[default]
    Terminate,
    /// Log the frame and continue with the next one.
    Skip,
}

/// Connection parameters shared by every EdgeServer call.
#[derive(Clone)]
pub struct EdgeServerConfig {
    /// Server base URL, e.g. `https://edge.example.com`.
    pub host: String,
    pub namespace: String,
    pub bot_provider_name: String,
    /// Pre-issued key sent in the `x-api-key` header.
    pub api_key: String,
    /// Whole-request timeout used when the client builds its own HTTP client.
    pub timeout: Duration,
    /// Injected HTTP client; takes precedence over `timeout`.
    pub http_client: Option<reqwest::Client>,
    pub reconnect: ReconnectPolicy,
    pub frame_error_policy: FrameErrorPolicy,
    pub stream_buffer_capacity: usize,
    pub max_frame_bytes: usize,
}

impl EdgeServerConfig {
    pub fn new(
        host: impl Into<String>,
        namespace: impl Into<String>,
        bot_provider_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            namespace: namespace.into(),
            bot_provider_name: bot_provider_name.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            http_client: None,
            reconnect: ReconnectPolicy::default(),
            frame_error_policy: FrameErrorPolicy::default(),
            stream_buffer_capacity: DEFAULT_STREAM_BUFFER_CAPACITY,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Builds a config from `EDGE_SERVER_HOST`, `NAMESPACE`,
    /// `BOT_PROVIDER_NAME` and `BOT_PROVIDER_API_KEY`.
    ///
    /// Only the API key is required; the others fall back to local defaults.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = env_or("BOT_PROVIDER_API_KEY", "");
        if api_key.trim().is_empty() {
            return Err(ClientError::Config(
                "missing BOT_PROVIDER_API_KEY for EdgeServer client".into(),
            ));
        }
        Ok(Self::new(
            env_or("EDGE_SERVER_HOST", DEFAULT_HOST),
            env_or("NAMESPACE", DEFAULT_NAMESPACE),
            env_or("BOT_PROVIDER_NAME", DEFAULT_BOT_PROVIDER_NAME),
            api_key,
        ))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn frame_error_policy(mut self, policy: FrameErrorPolicy) -> Self {
        self.frame_error_policy = policy;
        self
    }

    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity;
        self
    }

    pub fn max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let url = reqwest::Url::parse(self.host.trim())
            .map_err(|e| ClientError::Config(format!("invalid host {:?}: {e}", self.host)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "host must be an http(s) URL, got {:?}",
                self.host
            )));
        }
        if self.namespace.trim().is_empty() {
            return Err(ClientError::Config("namespace must not be empty".into()));
        }
        if self.bot_provider_name.trim().is_empty() {
            return Err(ClientError::Config(
                "bot provider name must not be empty".into(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(ClientError::Config("api key must not be empty".into()));
        }
        if self.stream_buffer_capacity == 0 {
            return Err(ClientError::Config(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(ClientError::Config(
                "max_frame_bytes must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn build_http_client(&self) -> Result<reqwest::Client, ClientError> {
        if let Some(client) = &self.http_client {
            return Ok(client.clone());
        }
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))
    }

    /// `{host}/ns/{namespace}/bot-provider/{provider}/{tail...}` with every
    /// segment percent-escaped.
    pub(crate) fn endpoint(&self, tail: &[&str]) -> Result<reqwest::Url, ClientError> {
        let mut url = reqwest::Url::parse(self.host.trim())
            .map_err(|e| ClientError::Config(format!("invalid host {:?}: {e}", self.host)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ClientError::Config(format!("host {:?} cannot be used as a base URL", self.host))
            })?;
            segments.pop_if_empty().extend([
                "ns",
                self.namespace.as_str(),
                "bot-provider",
                self.bot_provider_name.as_str(),
            ]);
            segments.extend(tail);
        }
        Ok(url)
    }
}

impl fmt::Debug for EdgeServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeServerConfig")
            .field("host", &self.host)
            .field("namespace", &self.namespace)
            .field("bot_provider_name", &self.bot_provider_name)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("http_client", &self.http_client.is_some())
            .field("reconnect", &self.reconnect)
            .field("frame_error_policy", &self.frame_error_policy)
            .field("stream_buffer_capacity", &self.stream_buffer_capacity)
            .field("max_frame_bytes", &self.max_frame_bytes)
            .finish()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
