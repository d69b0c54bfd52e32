use crate::error_detail::ErrorDetail;

/// Terminal failure of an event stream, surfaced through
/// `BotStream::last_error` after `advance` returned `false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Connection could not be established, the server rejected the request,
    /// or the body failed mid-stream.
    #[error("SSE connection failed: {message}")]
    Transport {
        message: String,
        /// HTTP status when the server answered with a non-success code.
        status: Option<u16>,
    },
    /// A frame's payload was not a valid event.
    #[error("failed to decode event: {message}")]
    Decode { message: String },
    /// The remote run reported a failure through a `run.error` event.
    #[error("SSE stream error: {detail}")]
    Run {
        request_id: String,
        event_id: String,
        detail: ErrorDetail,
    },
    /// The caller aborted the stream.
    #[error("stream cancelled")]
    Cancelled,
}

impl StreamError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether this error was raised by the transport rather than the payload.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid input to an operation, detected before any I/O.
    #[error("validation error: {0}")]
    Validation(String),
    /// The request could not be sent or its response could not be read.
    #[error("{operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    /// The response body was not the expected shape.
    #[error("{operation} response could not be decoded: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
    /// The server answered with a non-200 status or `isSuccess=false`.
    #[error("{operation} failed ({status}): {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },
    /// Local file access failed.
    #[error("io error: {0}")]
    Io(String),
    /// Terminal failure of an event stream, when consumed through a
    /// collecting helper.
    #[error(transparent)]
    Stream(StreamError),
}

impl ClientError {
    pub(crate) fn transport(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            operation,
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            operation,
            message: err.to_string(),
        }
    }
}

impl From<StreamError> for ClientError {
    fn from(value: StreamError) -> Self {
        ClientError::Stream(value)
    }
}

/// Renders the remote `error`/`errorCode` pair of a failed envelope.
pub(crate) fn remote_error_message(error: Option<&str>, code: Option<&str>) -> String {
    match (error, code) {
        (Some(error), Some(code)) => format!("{error} ({code})"),
        (Some(error), None) => error.to_string(),
        (None, Some(code)) => code.to_string(),
        (None, None) => "unknown error".to_string(),
    }
}
