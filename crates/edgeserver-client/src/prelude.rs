//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, BotAgent, BotEvent, BotMessage, BotProviderClient, BotReply, BotStream,
    ClientError, EdgeBotAgent, EdgeFunctionAgent, EdgeServerConfig, EventFact, EventType,
    FormFile, FunctionAgent, StreamError, StreamState,
};
