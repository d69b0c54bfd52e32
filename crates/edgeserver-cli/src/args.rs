use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use edgeserver_client::config::{DEFAULT_BOT_PROVIDER_NAME, DEFAULT_HOST, DEFAULT_NAMESPACE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AgentMode {
    /// Interactive conversation (message / sse / blob).
    Bot,
    /// One-shot trigger (json / form).
    Function,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Sse,
    Rest,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::Rest => "rest",
        }
    }
}

/// Talk to an EdgeServer bot provider from the terminal.
#[derive(Debug, Parser)]
#[command(name = "edgeserver-cli", version)]
pub struct Cli {
    /// EdgeServer host URL.
    #[arg(long, env = "EDGE_SERVER_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(long, env = "NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Bot provider name.
    #[arg(long = "bot", env = "BOT_PROVIDER_NAME", default_value = DEFAULT_BOT_PROVIDER_NAME)]
    pub bot_provider_name: String,

    /// Bot provider API key.
    #[arg(long = "apikey", env = "BOT_PROVIDER_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, value_enum, default_value_t = AgentMode::Bot)]
    pub agent: AgentMode,

    /// Conversation channel id (generated when omitted).
    #[arg(long)]
    pub channel: Option<String>,

    /// Initial message transport.
    #[arg(long, value_enum, default_value_t = Transport::Sse)]
    pub transport: Transport,

    /// Initial debug flag for REST turns.
    #[arg(long)]
    pub debug: bool,

    /// Function agent: call the /json trigger.
    #[arg(long)]
    pub json_trigger: bool,

    /// Function agent: call the /form trigger.
    #[arg(long)]
    pub form_trigger: bool,

    /// Function agent: payload as a JSON object string.
    #[arg(long)]
    pub trigger_payload: Option<String>,

    /// Function agent: path to a JSON object payload.
    #[arg(long)]
    pub trigger_payload_file: Option<PathBuf>,

    /// Function agent: file attached to the /form trigger.
    #[arg(long)]
    pub form_file: Option<PathBuf>,

    /// Function agent: MIME type of --form-file.
    #[arg(long)]
    pub form_mime: Option<String>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Debug logging plus per-event dumps.
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    /// Effective log filter; `--verbose` forces `debug`.
    pub fn effective_log_level(&self) -> &str {
        if self.verbose { "debug" } else { &self.log_level }
    }
}
