use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error_detail::ErrorDetail;
use crate::errors::ClientError;
use crate::serde_util::null_as_default;
use crate::template::MessageTemplate;

/// Post-back action carried by an outbound message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostBackAction {
    #[default]
    None,
    /// Drops the conversation state of the channel before handling the text.
    ResetChannel,
}

/// One user-originated turn sent to the bot provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotMessage {
    pub custom_channel_id: String,
    pub custom_message_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default)]
    pub action: PostBackAction,
    /// Ids of blobs previously uploaded to the same channel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blob_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
}

impl BotMessage {
    pub fn new(
        channel_id: impl Into<String>,
        message_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            custom_channel_id: channel_id.into(),
            custom_message_id: message_id.into(),
            text: text.into(),
            action: PostBackAction::None,
            blob_ids: Vec::new(),
            payload: None,
        }
    }

    /// Builds a `RESET_CHANNEL` message.
    pub fn reset(
        channel_id: impl Into<String>,
        message_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(channel_id, message_id, text).with_action(PostBackAction::ResetChannel)
    }

    pub fn with_action(mut self, action: PostBackAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_blob_ids(mut self, blob_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.blob_ids = blob_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Checks the fields the server requires before any request is built.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.custom_channel_id.trim().is_empty() {
            return Err(ClientError::Validation(
                "message customChannelId must not be empty".into(),
            ));
        }
        if self.custom_message_id.trim().is_empty() {
            return Err(ClientError::Validation(
                "message customMessageId must not be empty".into(),
            ));
        }
        if self.blob_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ClientError::Validation(
                "message blobIds must not contain empty ids".into(),
            ));
        }
        Ok(())
    }
}

/// Message produced by the bot, received either inside stream events or in a
/// synchronous reply.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BufferedMessage {
    #[serde(deserialize_with = "null_as_default")]
    pub message_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub reply_to_custom_message_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
    pub payload: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub is_debug: bool,
    pub idx: Option<i64>,
    pub template: Option<MessageTemplate>,
}

/// Payload returned by the synchronous `/message` endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotReply {
    #[serde(deserialize_with = "null_as_default")]
    pub request_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub namespace: String,
    #[serde(deserialize_with = "null_as_default")]
    pub bot_provider_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub custom_channel_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub messages: Vec<BufferedMessage>,
    pub error_detail: Option<ErrorDetail>,
}

/// Server-side classification of an uploaded file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    #[default]
    Binary,
    Image,
    Video,
    Audio,
    Document,
}

/// Metadata of an uploaded blob.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Blob {
    pub channel_id: String,
    pub blob_id: String,
    pub file_type: FileType,
    pub file_name: Option<String>,
    pub size: i64,
    pub mime: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_message_omits_empty_optionals() {
        let msg = BotMessage::new("c1", "m1", "hi");
        let encoded = serde_json::to_value(&msg).expect("encode");
        assert_eq!(
            encoded,
            serde_json::json!({
                "customChannelId": "c1",
                "customMessageId": "m1",
                "text": "hi",
                "action": "NONE"
            })
        );
    }

    #[test]
    fn reset_message_carries_blobs_and_payload() {
        let mut payload = Map::new();
        payload.insert("lang".into(), Value::from("en"));
        let msg = BotMessage::reset("c1", "m2", "")
            .with_blob_ids(["b1", "b2"])
            .with_payload(payload);
        let encoded = serde_json::to_value(&msg).expect("encode");
        assert_eq!(encoded["action"], "RESET_CHANNEL");
        assert_eq!(encoded["blobIds"], serde_json::json!(["b1", "b2"]));
        assert_eq!(encoded["payload"]["lang"], "en");
        assert!(encoded.get("text").is_none());
    }

    #[test]
    fn outbound_message_round_trips() {
        let msg = BotMessage::new("c1", "m1", "hi").with_blob_ids(["b1"]);
        let text = serde_json::to_string(&msg).expect("encode");
        let decoded: BotMessage = serde_json::from_str(&text).expect("decode");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn validate_rejects_missing_ids() {
        assert!(matches!(
            BotMessage::new("", "m1", "hi").validate(),
            Err(ClientError::Validation(msg)) if msg.contains("customChannelId")
        ));
        assert!(matches!(
            BotMessage::new("c1", " ", "hi").validate(),
            Err(ClientError::Validation(msg)) if msg.contains("customMessageId")
        ));
        assert!(BotMessage::new("c1", "m1", "").validate().is_ok());
    }

    #[test]
    fn buffered_message_tolerates_nulls() {
        let msg: BufferedMessage = serde_json::from_value(serde_json::json!({
            "messageId": "s1",
            "replyToCustomMessageId": null,
            "text": "Hello",
            "payload": null,
            "isDebug": null,
            "idx": 3,
            "template": null
        }))
        .expect("decode");
        assert_eq!(msg.message_id, "s1");
        assert_eq!(msg.reply_to_custom_message_id, "");
        assert_eq!(msg.idx, Some(3));
        assert!(msg.template.is_none());
        assert!(msg.payload.is_null());
    }

    #[test]
    fn blob_decodes_file_type() {
        let blob: Blob = serde_json::from_value(serde_json::json!({
            "channelId": "c1",
            "blobId": "b1",
            "fileType": "IMAGE",
            "fileName": "cat.png",
            "size": 42,
            "mime": "image/png"
        }))
        .expect("decode");
        assert_eq!(blob.file_type, FileType::Image);
        assert_eq!(blob.file_name.as_deref(), Some("cat.png"));
    }
}
