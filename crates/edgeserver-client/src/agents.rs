//! Narrow facades over [`BotProviderClient`] for the two kinds of provider.
//!
//! Conversational providers are driven through [`BotAgent`], one-shot
//! workflows through [`FunctionAgent`]. Applications that only need one side
//! depend on the trait and can swap in a fake for tests.

use serde_json::{Map, Value};

use crate::api::{BotProviderClient, FormFile};
use crate::config::EdgeServerConfig;
use crate::errors::ClientError;
use crate::message::{Blob, BotMessage, BotReply};
use crate::stream::{AbortHandle, BotStream};

/// Conversational API: streamed turns, request/response turns, blob upload.
#[async_trait::async_trait]
pub trait BotAgent: Send + Sync {
    async fn new_stream(
        &self,
        message: BotMessage,
        abort: AbortHandle,
    ) -> Result<BotStream, ClientError>;

    async fn send_message(
        &self,
        message: &BotMessage,
        is_debug: bool,
    ) -> Result<BotReply, ClientError>;

    async fn upload_blob(&self, channel_id: &str, file: FormFile) -> Result<Blob, ClientError>;
}

/// One-shot trigger API.
#[async_trait::async_trait]
pub trait FunctionAgent: Send + Sync {
    async fn trigger_json(&self, payload: &Map<String, Value>)
    -> Result<Option<Value>, ClientError>;

    async fn trigger_form(
        &self,
        payload: &Map<String, Value>,
        file: Option<FormFile>,
    ) -> Result<Option<Value>, ClientError>;
}

#[derive(Clone, Debug)]
pub struct EdgeBotAgent {
    client: BotProviderClient,
}

impl EdgeBotAgent {
    pub fn new(
        host: impl Into<String>,
        namespace: impl Into<String>,
        bot_provider_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_config(EdgeServerConfig::new(
            host,
            namespace,
            bot_provider_name,
            api_key,
        ))
    }

    pub fn with_config(config: EdgeServerConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: BotProviderClient::new(config)?,
        })
    }
}

#[async_trait::async_trait]
impl BotAgent for EdgeBotAgent {
    async fn new_stream(
        &self,
        message: BotMessage,
        abort: AbortHandle,
    ) -> Result<BotStream, ClientError> {
        self.client.new_stream(message, abort).await
    }

    async fn send_message(
        &self,
        message: &BotMessage,
        is_debug: bool,
    ) -> Result<BotReply, ClientError> {
        self.client.send_message(message, is_debug).await
    }

    async fn upload_blob(&self, channel_id: &str, file: FormFile) -> Result<Blob, ClientError> {
        self.client.upload_blob(channel_id, file).await
    }
}

#[derive(Clone, Debug)]
pub struct EdgeFunctionAgent {
    client: BotProviderClient,
}

impl EdgeFunctionAgent {
    pub fn new(
        host: impl Into<String>,
        namespace: impl Into<String>,
        bot_provider_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_config(EdgeServerConfig::new(
            host,
            namespace,
            bot_provider_name,
            api_key,
        ))
    }

    pub fn with_config(config: EdgeServerConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: BotProviderClient::new(config)?,
        })
    }
}

#[async_trait::async_trait]
impl FunctionAgent for EdgeFunctionAgent {
    async fn trigger_json(
        &self,
        payload: &Map<String, Value>,
    ) -> Result<Option<Value>, ClientError> {
        self.client.trigger_json(payload).await
    }

    async fn trigger_form(
        &self,
        payload: &Map<String, Value>,
        file: Option<FormFile>,
    ) -> Result<Option<Value>, ClientError> {
        self.client.trigger_form(payload, file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_validate_config() {
        assert!(EdgeBotAgent::new("http://localhost:8080", "ns", "bot", "key").is_ok());
        assert!(matches!(
            EdgeBotAgent::new("http://localhost:8080", "ns", "bot", ""),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            EdgeFunctionAgent::new("not a url", "ns", "bot", "key"),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn agents_are_object_safe() {
        let bot: Box<dyn BotAgent> =
            Box::new(EdgeBotAgent::new("http://localhost:8080", "ns", "bot", "key").expect("bot"));
        let function: Box<dyn FunctionAgent> = Box::new(
            EdgeFunctionAgent::new("http://localhost:8080", "ns", "bot", "key").expect("function"),
        );
        drop((bot, function));
    }
}
