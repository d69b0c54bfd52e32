//! Interactive conversation mode.

use std::io::Write as _;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use edgeserver_client::message::PostBackAction;
use edgeserver_client::{AbortHandle, BotAgent, BotMessage, EdgeServerConfig, EventFact, FormFile};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::{debug, info, warn};

use crate::args::{Cli, Transport};
use crate::commands::{Command, HELP, parse_command};
use crate::errors::CliError;
use crate::interrupt::{AbortOnInterrupt, until_interrupted};

const PROMPT: &str = "bot> ";

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Mutable state of one REPL session.
#[derive(Debug)]
pub struct BotSession {
    pub channel_id: String,
    pub transport: Transport,
    pub debug: bool,
    pub blob_ids: Vec<String>,
    pub verbose: bool,
    seq: u64,
}

impl BotSession {
    pub fn new(channel: Option<&str>, transport: Transport, debug: bool, verbose: bool) -> Self {
        let channel_id = channel
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("cli-channel-{}", unix_now()));
        Self {
            channel_id,
            transport,
            debug,
            blob_ids: Vec::new(),
            verbose,
            seq: 0,
        }
    }

    /// Builds the next outbound message, carrying the attached blobs.
    pub fn next_message(&mut self, text: &str, action: PostBackAction) -> BotMessage {
        self.seq += 1;
        let message_id = format!("cli-message-{}-{}", unix_now(), self.seq);
        BotMessage::new(self.channel_id.clone(), message_id, text)
            .with_action(action)
            .with_blob_ids(self.blob_ids.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub async fn run(cli: &Cli, config: EdgeServerConfig) -> Result<(), CliError> {
    let mut session = BotSession::new(cli.channel.as_deref(), cli.transport, cli.debug, cli.verbose);
    info!(
        event = "cli.bot_start",
        domain = "edgeserver",
        host = %config.host,
        namespace = %config.namespace,
        bot_provider = %config.bot_provider_name,
        channel_id = %session.channel_id,
        transport = session.transport.as_str(),
        debug = session.debug
    );
    let agent = edgeserver_client::EdgeBotAgent::with_config(config)?;
    println!("{HELP}");
    repl(&agent, &mut session).await
}

async fn repl(agent: &dyn BotAgent, session: &mut BotSession) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{PROMPT}");
        std::io::stdout().flush()?;

        let line = match until_interrupted(lines.next_line()).await {
            Ok(line) => line?,
            Err(CliError::Interrupted) => return Ok(()),
            Err(err) => return Err(err),
        };
        let Some(line) = line else {
            info!(event = "cli.input_closed", domain = "edgeserver", "input closed, exiting");
            return Ok(());
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let command = match parse_command(input) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        match execute(agent, session, command).await {
            Ok(Flow::Exit) => return Ok(()),
            Ok(Flow::Continue) => {}
            Err(err) => eprintln!("error: {err}"),
        }
    }
}

/// Applies one parsed command to the session.
pub async fn execute(
    agent: &dyn BotAgent,
    session: &mut BotSession,
    command: Command,
) -> Result<Flow, CliError> {
    match command {
        Command::Help => println!("{HELP}"),
        Command::Exit => {
            println!("Bye");
            return Ok(Flow::Exit);
        }
        Command::Transport(transport) => {
            session.transport = transport;
            println!("Transport -> {}", transport.as_str());
        }
        Command::Debug(debug) => {
            session.debug = debug;
            println!("Debug -> {debug}");
        }
        Command::Blob { path, mime } => {
            let file = FormFile::open(&path, mime).await?;
            let blob = until_interrupted(agent.upload_blob(&session.channel_id, file)).await??;
            println!("Blob attached: {}", blob.blob_id);
            session.blob_ids.push(blob.blob_id);
        }
        Command::Blobs => {
            if session.blob_ids.is_empty() {
                println!("No attached blobs");
            } else {
                println!("Attached blobs: {}", session.blob_ids.join(", "));
            }
        }
        Command::ClearBlobs => {
            session.blob_ids.clear();
            println!("Attached blobs cleared");
        }
        Command::Channel(None) => println!("Current channel: {}", session.channel_id),
        Command::Channel(Some(id)) => {
            session.channel_id = id;
            println!("Channel -> {}", session.channel_id);
        }
        Command::Reset(text) => send(agent, session, &text, PostBackAction::ResetChannel).await?,
        Command::Say(text) => send(agent, session, &text, PostBackAction::None).await?,
    }
    Ok(Flow::Continue)
}

async fn send(
    agent: &dyn BotAgent,
    session: &mut BotSession,
    text: &str,
    action: PostBackAction,
) -> Result<(), CliError> {
    let message = session.next_message(text, action);
    debug!(
        event = "cli.send",
        domain = "edgeserver",
        channel_id = %message.custom_channel_id,
        message_id = %message.custom_message_id,
        transport = session.transport.as_str(),
        action = ?action,
        blobs = message.blob_ids.len() as u64
    );
    match session.transport {
        Transport::Rest => send_by_rest(agent, &message, session.debug, session.verbose).await,
        Transport::Sse => send_by_sse(agent, message, session.verbose).await,
    }
}

async fn send_by_rest(
    agent: &dyn BotAgent,
    message: &BotMessage,
    debug: bool,
    verbose: bool,
) -> Result<(), CliError> {
    let started = Instant::now();
    let reply = until_interrupted(agent.send_message(message, debug)).await??;
    debug!(
        event = "cli.rest_done",
        domain = "edgeserver",
        request_id = %reply.request_id,
        messages = reply.messages.len() as u64,
        elapsed_ms = started.elapsed().as_millis() as u64
    );
    for message in &reply.messages {
        if !message.text.is_empty() {
            println!("{}", message.text);
        }
        if let Some(template) = &message.template {
            debug!(template = ?template.template_type, "reply template");
        }
        if verbose {
            debug!(reply_message = ?message, "reply message");
        }
    }
    if let Some(detail) = &reply.error_detail {
        warn!(event = "cli.reply_error", domain = "edgeserver", error = %detail);
    }
    Ok(())
}

async fn send_by_sse(
    agent: &dyn BotAgent,
    message: BotMessage,
    verbose: bool,
) -> Result<(), CliError> {
    let abort = AbortHandle::new();
    let _interrupt = AbortOnInterrupt::arm(abort.clone());
    let stream = agent.new_stream(message, abort).await?;

    let mut stdout = std::io::stdout();
    while stream.advance().await {
        let Some(event) = stream.current() else {
            continue;
        };
        if verbose {
            debug!(bot_event = ?event, "stream event");
        }
        match &event.fact {
            EventFact::MessageDelta(message) if !message.text.is_empty() => {
                print!("{}", message.text);
                stdout.flush()?;
            }
            EventFact::MessageComplete(message) => {
                println!();
                if let Some(template) = &message.template {
                    debug!(template = ?template.template_type, "message template");
                }
            }
            _ => {}
        }
    }

    let outcome = stream.last_error();
    stream.close()?;
    match outcome {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgeserver_client::{Blob, BotReply, BotStream, ClientError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeAgent {
        sent: Mutex<Vec<(BotMessage, bool)>>,
    }

    impl FakeAgent {
        fn sent(&self) -> Vec<(BotMessage, bool)> {
            self.sent.lock().expect("lock").clone()
        }
    }

    #[async_trait::async_trait]
    impl BotAgent for FakeAgent {
        async fn new_stream(
            &self,
            _message: BotMessage,
            _abort: AbortHandle,
        ) -> Result<BotStream, ClientError> {
            Err(ClientError::Validation("streaming unavailable".into()))
        }

        async fn send_message(
            &self,
            message: &BotMessage,
            is_debug: bool,
        ) -> Result<BotReply, ClientError> {
            self.sent.lock().expect("lock").push((message.clone(), is_debug));
            Ok(BotReply::default())
        }

        async fn upload_blob(&self, channel_id: &str, file: FormFile) -> Result<Blob, ClientError> {
            Ok(Blob {
                channel_id: channel_id.to_string(),
                blob_id: format!("blob-{}", file.file_name()),
                ..Default::default()
            })
        }
    }

    fn session() -> BotSession {
        BotSession::new(Some("c1"), Transport::Rest, false, false)
    }

    #[test]
    fn session_defaults_channel_and_numbers_messages() {
        let mut generated = BotSession::new(None, Transport::Sse, false, false);
        assert!(generated.channel_id.starts_with("cli-channel-"));

        let first = generated.next_message("a", PostBackAction::None);
        let second = generated.next_message("b", PostBackAction::None);
        assert!(first.custom_message_id.starts_with("cli-message-"));
        assert!(first.custom_message_id.ends_with("-1"));
        assert!(second.custom_message_id.ends_with("-2"));
    }

    #[tokio::test]
    async fn state_commands_update_session() {
        let agent = FakeAgent::default();
        let mut session = session();

        execute(&agent, &mut session, Command::Transport(Transport::Sse))
            .await
            .expect("transport");
        assert_eq!(session.transport, Transport::Sse);

        execute(&agent, &mut session, Command::Debug(true))
            .await
            .expect("debug");
        assert!(session.debug);

        execute(&agent, &mut session, Command::Channel(Some("c2".into())))
            .await
            .expect("channel");
        assert_eq!(session.channel_id, "c2");

        assert_eq!(
            execute(&agent, &mut session, Command::Exit).await.expect("exit"),
            Flow::Exit
        );
    }

    #[tokio::test]
    async fn blobs_attach_to_following_messages() {
        let agent = FakeAgent::default();
        let mut session = session();
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let path = file.path().to_string_lossy().to_string();
        let file_name = file
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name")
            .to_string();

        execute(&agent, &mut session, Command::Blob { path, mime: None })
            .await
            .expect("blob");
        assert_eq!(session.blob_ids, vec![format!("blob-{file_name}")]);

        execute(&agent, &mut session, Command::Say("look".into()))
            .await
            .expect("say");
        execute(&agent, &mut session, Command::ClearBlobs)
            .await
            .expect("clear");
        execute(&agent, &mut session, Command::Say("again".into()))
            .await
            .expect("say");

        let sent = agent.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0.blob_ids, vec![format!("blob-{file_name}")]);
        assert!(sent[1].0.blob_ids.is_empty());
    }

    #[tokio::test]
    async fn missing_blob_file_is_an_error() {
        let agent = FakeAgent::default();
        let mut session = session();
        let err = execute(
            &agent,
            &mut session,
            Command::Blob {
                path: "/definitely/not/here.png".into(),
                mime: None,
            },
        )
        .await
        .expect_err("missing file");
        assert!(matches!(err, CliError::Client(ClientError::Io(_))));
        assert!(session.blob_ids.is_empty());
    }

    #[tokio::test]
    async fn reset_sends_reset_channel_over_rest_with_debug() {
        let agent = FakeAgent::default();
        let mut session = session();
        session.debug = true;

        execute(&agent, &mut session, Command::Reset("start over".into()))
            .await
            .expect("reset");

        let sent = agent.sent();
        assert_eq!(sent.len(), 1);
        let (message, is_debug) = &sent[0];
        assert_eq!(message.action, PostBackAction::ResetChannel);
        assert_eq!(message.text, "start over");
        assert_eq!(message.custom_channel_id, "c1");
        assert!(*is_debug);
    }

    #[tokio::test]
    async fn stream_open_failure_is_reported() {
        let agent = FakeAgent::default();
        let mut session = BotSession::new(Some("c1"), Transport::Sse, false, false);
        let err = execute(&agent, &mut session, Command::Say("hi".into()))
            .await
            .expect_err("stream unavailable");
        assert!(matches!(err, CliError::Client(ClientError::Validation(_))));
    }
}
