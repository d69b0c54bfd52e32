//! REPL command grammar. Parsing is pure; `bot` executes the result.

use crate::args::Transport;
use crate::errors::CliError;

pub const HELP: &str = "\
BotAgent commands:
  /help                      Show help
  /exit                      Exit
  /transport sse|rest        Switch message transport
  /debug on|off              Toggle debug for REST /message
  /blob <path> [mime]        Upload blob and attach to conversation
  /blobs                     Show attached blob IDs
  /clear-blobs               Clear attached blob IDs
  /channel [id]              Show or switch channel
  /reset [text]              Send RESET_CHANNEL message
  <any text>                 Send normal message";

const DEFAULT_RESET_TEXT: &str = "reset";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Transport(Transport),
    Debug(bool),
    Blob { path: String, mime: Option<String> },
    Blobs,
    ClearBlobs,
    /// `None` shows the current channel.
    Channel(Option<String>),
    Reset(String),
    /// Plain text sent as a normal message.
    Say(String),
}

/// Parses one trimmed, non-empty input line.
pub fn parse_command(input: &str) -> Result<Command, CliError> {
    let input = input.trim();
    if !input.starts_with('/') {
        return Ok(Command::Say(input.to_string()));
    }

    let mut parts = input.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match name {
        "/help" => Ok(Command::Help),
        "/exit" | "/quit" => Ok(Command::Exit),
        "/transport" => match args.as_slice() {
            ["sse"] => Ok(Command::Transport(Transport::Sse)),
            ["rest"] => Ok(Command::Transport(Transport::Rest)),
            _ => Err(usage("/transport sse|rest")),
        },
        "/debug" => match args.as_slice() {
            ["on"] => Ok(Command::Debug(true)),
            ["off"] => Ok(Command::Debug(false)),
            _ => Err(usage("/debug on|off")),
        },
        "/blob" => match args.as_slice() {
            [path] => Ok(Command::Blob {
                path: (*path).to_string(),
                mime: None,
            }),
            [path, mime, ..] => Ok(Command::Blob {
                path: (*path).to_string(),
                mime: Some((*mime).to_string()),
            }),
            [] => Err(usage("/blob <path> [mime]")),
        },
        "/blobs" => Ok(Command::Blobs),
        "/clear-blobs" => Ok(Command::ClearBlobs),
        "/channel" => Ok(Command::Channel(args.first().map(|id| (*id).to_string()))),
        "/reset" => {
            let text = input["/reset".len()..].trim();
            Ok(Command::Reset(if text.is_empty() {
                DEFAULT_RESET_TEXT.to_string()
            } else {
                text.to_string()
            }))
        }
        other => Err(CliError::Usage(format!(
            "unknown command: {other} (use /help)"
        ))),
    }
}

fn usage(text: &str) -> CliError {
    CliError::Usage(format!("usage: {text}"))
}
