use edgeserver_client::{ClientError, StreamError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Bad flag combination or REPL command usage.
    #[error("{0}")]
    Usage(String),
    #[error("invalid trigger payload: {0}")]
    Payload(String),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
    #[error("interrupted")]
    Interrupted,
}
