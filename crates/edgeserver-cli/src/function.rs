//! One-shot trigger mode.

use std::path::Path;
use std::time::Instant;

use edgeserver_client::{EdgeServerConfig, FormFile, FunctionAgent};
use serde_json::{Map, Value};
use tracing::info;

use crate::args::Cli;
use crate::errors::CliError;
use crate::interrupt::until_interrupted;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Json,
    Form,
}

/// Exactly one of `--json-trigger` / `--form-trigger` must be set.
pub fn select_trigger(json: bool, form: bool) -> Result<Trigger, CliError> {
    match (json, form) {
        (true, false) => Ok(Trigger::Json),
        (false, true) => Ok(Trigger::Form),
        _ => Err(CliError::Usage(
            "function agent requires exactly one trigger mode: --json-trigger or --form-trigger"
                .into(),
        )),
    }
}

/// Reads the trigger payload from an inline string or a file. No payload
/// means an empty object.
pub fn parse_trigger_payload(
    inline: Option<&str>,
    file: Option<&Path>,
) -> Result<Map<String, Value>, CliError> {
    let raw = match (inline, file) {
        (Some(_), Some(_)) => {
            return Err(CliError::Payload(
                "use either --trigger-payload or --trigger-payload-file, not both".into(),
            ));
        }
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
            CliError::Payload(format!("failed to read {}: {e}", path.display()))
        })?,
        (Some(inline), None) => inline.to_string(),
        (None, None) => return Ok(Map::new()),
    };
    serde_json::from_str::<Map<String, Value>>(&raw)
        .map_err(|e| CliError::Payload(format!("payload must be a valid JSON object: {e}")))
}

/// Renders a trigger result the way the CLI prints it.
pub fn render_result(result: Option<&Value>) -> String {
    match result {
        None => "null".to_string(),
        Some(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    }
}

pub async fn run(cli: &Cli, config: EdgeServerConfig) -> Result<(), CliError> {
    let trigger = select_trigger(cli.json_trigger, cli.form_trigger)?;
    let payload =
        parse_trigger_payload(cli.trigger_payload.as_deref(), cli.trigger_payload_file.as_deref())?;

    info!(
        event = "cli.function_start",
        domain = "edgeserver",
        host = %config.host,
        namespace = %config.namespace,
        bot_provider = %config.bot_provider_name,
        trigger = ?trigger
    );
    let agent = edgeserver_client::EdgeFunctionAgent::with_config(config)?;
    let result = run_once(&agent, trigger, &payload, cli).await?;
    println!("{}", render_result(result.as_ref()));
    Ok(())
}

async fn run_once(
    agent: &dyn FunctionAgent,
    trigger: Trigger,
    payload: &Map<String, Value>,
    cli: &Cli,
) -> Result<Option<Value>, CliError> {
    let started = Instant::now();
    let result = match trigger {
        Trigger::Json => until_interrupted(agent.trigger_json(payload)).await?,
        Trigger::Form => {
            let file = match &cli.form_file {
                Some(path) => Some(FormFile::open(path, cli.form_mime.clone()).await?),
                None => None,
            };
            until_interrupted(agent.trigger_form(payload, file)).await?
        }
    }?;
    info!(
        event = "cli.function_done",
        domain = "edgeserver",
        elapsed_ms = started.elapsed().as_millis() as u64
    );
    Ok(result)
}
