//! Typed events decoded from the `message/sse` stream.
//!
//! On the wire every event carries an `eventType` and a `fact` object with one
//! member per event kind. Here the fact is an enum, so an event can only ever
//! hold the payload that matches its type; [`BotEvent::event_type`] is derived
//! from it.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_detail::ErrorDetail;
use crate::message::BufferedMessage;
use crate::serde_util::null_as_default;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "asgard.run.init", alias = "run.init")]
    RunInit,
    #[serde(rename = "asgard.run.done", alias = "run.done")]
    RunDone,
    #[serde(rename = "asgard.run.error", alias = "run.error")]
    RunError,
    #[serde(rename = "asgard.process.start", alias = "process.start")]
    ProcessStart,
    #[serde(rename = "asgard.process.complete", alias = "process.complete")]
    ProcessComplete,
    #[serde(rename = "asgard.message.start", alias = "message.start")]
    MessageStart,
    #[serde(rename = "asgard.message.delta", alias = "message.delta")]
    MessageDelta,
    #[serde(rename = "asgard.message.complete", alias = "message.complete")]
    MessageComplete,
    #[serde(rename = "asgard.tool_call.start", alias = "tool_call.start")]
    ToolCallStart,
    #[serde(rename = "asgard.tool_call.complete", alias = "tool_call.complete")]
    ToolCallComplete,
}

impl EventType {
    /// Wire literal of this event type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RunInit => "asgard.run.init",
            Self::RunDone => "asgard.run.done",
            Self::RunError => "asgard.run.error",
            Self::ProcessStart => "asgard.process.start",
            Self::ProcessComplete => "asgard.process.complete",
            Self::MessageStart => "asgard.message.start",
            Self::MessageDelta => "asgard.message.delta",
            Self::MessageComplete => "asgard.message.complete",
            Self::ToolCallStart => "asgard.tool_call.start",
            Self::ToolCallComplete => "asgard.tool_call.complete",
        }
    }

    /// Whether the run ends with this event.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::RunDone | Self::RunError)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool invocation descriptor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCall {
    #[serde(deserialize_with = "null_as_default")]
    pub toolset_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tool_name: String,
    pub parameter: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessStartFact {
    #[serde(deserialize_with = "null_as_default")]
    pub process_id: String,
    /// Opaque task description.
    pub task: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessCompleteFact {
    #[serde(deserialize_with = "null_as_default")]
    pub process_id: String,
    /// Opaque task result.
    pub task_result: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCallStartFact {
    #[serde(deserialize_with = "null_as_default")]
    pub process_id: String,
    /// Sequence number of the call within its process.
    pub call_seq: i64,
    pub tool_call: ToolCall,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCallCompleteFact {
    #[serde(deserialize_with = "null_as_default")]
    pub process_id: String,
    pub call_seq: i64,
    pub tool_call: ToolCall,
    pub tool_call_result: Value,
}

/// Event payload, one variant per [`EventType`].
#[derive(Clone, Debug, PartialEq)]
pub enum EventFact {
    RunInit,
    RunDone,
    RunError(ErrorDetail),
    ProcessStart(ProcessStartFact),
    ProcessComplete(ProcessCompleteFact),
    MessageStart(BufferedMessage),
    MessageDelta(BufferedMessage),
    MessageComplete(BufferedMessage),
    ToolCallStart(ToolCallStartFact),
    ToolCallComplete(ToolCallCompleteFact),
}

impl EventFact {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::RunInit => EventType::RunInit,
            Self::RunDone => EventType::RunDone,
            Self::RunError(_) => EventType::RunError,
            Self::ProcessStart(_) => EventType::ProcessStart,
            Self::ProcessComplete(_) => EventType::ProcessComplete,
            Self::MessageStart(_) => EventType::MessageStart,
            Self::MessageDelta(_) => EventType::MessageDelta,
            Self::MessageComplete(_) => EventType::MessageComplete,
            Self::ToolCallStart(_) => EventType::ToolCallStart,
            Self::ToolCallComplete(_) => EventType::ToolCallComplete,
        }
    }
}

/// One event of a bot run, in server-send order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct BotEvent {
    pub request_id: String,
    pub event_id: String,
    pub namespace: String,
    pub bot_provider_name: String,
    pub custom_channel_id: String,
    pub fact: EventFact,
}

impl BotEvent {
    pub fn event_type(&self) -> EventType {
        self.fact.event_type()
    }

    pub fn is_terminal(&self) -> bool {
        self.event_type().is_terminal()
    }

    /// The message carried by `message.start`, `message.delta` and
    /// `message.complete` events.
    pub fn message(&self) -> Option<&BufferedMessage> {
        match &self.fact {
            EventFact::MessageStart(message)
            | EventFact::MessageDelta(message)
            | EventFact::MessageComplete(message) => Some(message),
            _ => None,
        }
    }

    pub fn run_error(&self) -> Option<&ErrorDetail> {
        match &self.fact {
            EventFact::RunError(detail) => Some(detail),
            _ => None,
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct EmptyFact {}

#[derive(Serialize, Deserialize)]
struct RunErrorWire {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Serialize, Deserialize)]
struct MessageWire {
    #[serde(default)]
    message: BufferedMessage,
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_init: Option<EmptyFact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_done: Option<EmptyFact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_error: Option<RunErrorWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    process_start: Option<ProcessStartFact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    process_complete: Option<ProcessCompleteFact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_start: Option<MessageWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_delta: Option<MessageWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_complete: Option<MessageWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_start: Option<ToolCallStartFact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_complete: Option<ToolCallCompleteFact>,
}

impl WireFact {
    fn populated(&self) -> usize {
        [
            self.run_init.is_some(),
            self.run_done.is_some(),
            self.run_error.is_some(),
            self.process_start.is_some(),
            self.process_complete.is_some(),
            self.message_start.is_some(),
            self.message_delta.is_some(),
            self.message_complete.is_some(),
            self.tool_call_start.is_some(),
            self.tool_call_complete.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    event_type: EventType,
    #[serde(default, deserialize_with = "null_as_default")]
    request_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    event_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    namespace: String,
    #[serde(default, deserialize_with = "null_as_default")]
    bot_provider_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    custom_channel_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    fact: WireFact,
}

fn missing_fact(event_type: EventType, field: &str) -> String {
    format!("{event_type} event has no fact.{field}")
}

impl TryFrom<WireEvent> for BotEvent {
    type Error = String;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let event_type = wire.event_type;
        let mut fact = wire.fact;
        let populated = fact.populated();

        let decoded = match event_type {
            EventType::RunInit => EventFact::RunInit,
            EventType::RunDone => EventFact::RunDone,
            EventType::RunError => fact
                .run_error
                .take()
                .map(|wire| EventFact::RunError(wire.error))
                .ok_or_else(|| missing_fact(event_type, "runError"))?,
            EventType::ProcessStart => fact
                .process_start
                .take()
                .map(EventFact::ProcessStart)
                .ok_or_else(|| missing_fact(event_type, "processStart"))?,
            EventType::ProcessComplete => fact
                .process_complete
                .take()
                .map(EventFact::ProcessComplete)
                .ok_or_else(|| missing_fact(event_type, "processComplete"))?,
            EventType::MessageStart => fact
                .message_start
                .take()
                .map(|wire| EventFact::MessageStart(wire.message))
                .ok_or_else(|| missing_fact(event_type, "messageStart"))?,
            EventType::MessageDelta => fact
                .message_delta
                .take()
                .map(|wire| EventFact::MessageDelta(wire.message))
                .ok_or_else(|| missing_fact(event_type, "messageDelta"))?,
            EventType::MessageComplete => fact
                .message_complete
                .take()
                .map(|wire| EventFact::MessageComplete(wire.message))
                .ok_or_else(|| missing_fact(event_type, "messageComplete"))?,
            EventType::ToolCallStart => fact
                .tool_call_start
                .take()
                .map(EventFact::ToolCallStart)
                .ok_or_else(|| missing_fact(event_type, "toolCallStart"))?,
            EventType::ToolCallComplete => fact
                .tool_call_complete
                .take()
                .map(EventFact::ToolCallComplete)
                .ok_or_else(|| missing_fact(event_type, "toolCallComplete"))?,
        };

        // Empty run.init/run.done facts may be omitted entirely.
        let expected = match (&decoded, fact.run_init.is_some(), fact.run_done.is_some()) {
            (EventFact::RunInit, true, _) | (EventFact::RunDone, _, true) => 1,
            (EventFact::RunInit | EventFact::RunDone, _, _) => 0,
            _ => 1,
        };
        if populated > expected {
            return Err(format!("{event_type} event carries more than one fact"));
        }

        Ok(BotEvent {
            request_id: wire.request_id,
            event_id: wire.event_id,
            namespace: wire.namespace,
            bot_provider_name: wire.bot_provider_name,
            custom_channel_id: wire.custom_channel_id,
            fact: decoded,
        })
    }
}

impl From<BotEvent> for WireEvent {
    fn from(event: BotEvent) -> Self {
        let event_type = event.event_type();
        let mut fact = WireFact::default();
        match event.fact {
            EventFact::RunInit => fact.run_init = Some(EmptyFact {}),
            EventFact::RunDone => fact.run_done = Some(EmptyFact {}),
            EventFact::RunError(error) => fact.run_error = Some(RunErrorWire { error }),
            EventFact::ProcessStart(start) => fact.process_start = Some(start),
            EventFact::ProcessComplete(complete) => fact.process_complete = Some(complete),
            EventFact::MessageStart(message) => fact.message_start = Some(MessageWire { message }),
            EventFact::MessageDelta(message) => fact.message_delta = Some(MessageWire { message }),
            EventFact::MessageComplete(message) => {
                fact.message_complete = Some(MessageWire { message })
            }
            EventFact::ToolCallStart(start) => fact.tool_call_start = Some(start),
            EventFact::ToolCallComplete(complete) => fact.tool_call_complete = Some(complete),
        }
        WireEvent {
            event_type,
            request_id: event.request_id,
            event_id: event.event_id,
            namespace: event.namespace,
            bot_provider_name: event.bot_provider_name,
            custom_channel_id: event.custom_channel_id,
            fact,
        }
    }
}
