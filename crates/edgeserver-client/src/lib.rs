//! Async client for EdgeServer bot providers.
//!
//! A bot provider lives at `{host}/ns/{namespace}/bot-provider/{name}` and
//! exposes conversational endpoints (streamed or request/response turns, blob
//! upload) and one-shot triggers (JSON or multipart form).
//!
//! # Streaming a turn
//!
//! ```no_run
//! use edgeserver_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let config = EdgeServerConfig::from_env()?;
//! let message = BotMessage::new("channel-1", "message-1", "Hello");
//! let stream = BotStream::open(&config, message, AbortHandle::new()).await?;
//!
//! while stream.advance().await {
//!     if let Some(event) = stream.current()
//!         && event.event_type() == EventType::MessageDelta
//!         && let Some(message) = event.message()
//!     {
//!         print!("{}", message.text);
//!     }
//! }
//! if let Some(err) = stream.last_error() {
//!     eprintln!("stream ended with error: {err}");
//! }
//! # Ok(())
//! # }
//! ```

/// Facade traits and their EdgeServer implementations.
pub mod agents;
/// Request/response endpoints and multipart file parts.
pub mod api;
/// Connection configuration.
pub mod config;
pub mod error_detail;
/// Public error types.
pub mod errors;
/// Streamed event model.
pub mod event;
/// Outbound messages, replies and blobs.
pub mod message;
/// Process-wide logging setup for binaries.
pub mod observability;
pub mod policy;
/// Common imports.
pub mod prelude;
mod serde_util;
mod sse;
/// Pull-based event stream and cancellation handle.
pub mod stream;
pub mod template;

pub use agents::{BotAgent, EdgeBotAgent, EdgeFunctionAgent, FunctionAgent};
pub use api::{API_KEY_HEADER, BotProviderClient, Envelope, FormFile};
pub use config::{EdgeServerConfig, FrameErrorPolicy};
pub use error_detail::{ErrorDetail, ErrorLocation};
pub use errors::{ClientError, StreamError};
pub use event::{
    BotEvent, EventFact, EventType, ProcessCompleteFact, ProcessStartFact, ToolCall,
    ToolCallCompleteFact, ToolCallStartFact,
};
pub use message::{Blob, BotMessage, BotReply, BufferedMessage, FileType, PostBackAction};
pub use policy::ReconnectPolicy;
pub use stream::{AbortHandle, BotStream, StreamState};
pub use template::MessageTemplate;
