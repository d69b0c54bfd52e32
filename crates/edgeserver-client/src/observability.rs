use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_JSON_LOG_FILE: &str = "edgeserver.logs.jsonl";

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn observability_enabled() -> bool {
    std::env::var("EDGESERVER_OBSERVABILITY_ENABLED")
        .ok()
        .and_then(|value| parse_bool_env(&value))
        .unwrap_or(true)
}

fn resolve_env_filter(level_override: Option<&str>) -> EnvFilter {
    let explicit = level_override
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .and_then(|level| EnvFilter::try_new(level).ok());
    if let Some(filter) = explicit {
        return filter;
    }
    if let Ok(level) = std::env::var("EDGESERVER_LOG_LEVEL")
        && let Ok(filter) = EnvFilter::try_new(level)
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Initialize logging once per process, with filters taken from the
/// environment.
///
/// Environment variables:
/// - `EDGESERVER_OBSERVABILITY_ENABLED`: optional enable/disable flag (default enabled).
/// - `EDGESERVER_LOG_LEVEL`: optional level/filter override (`info`, `debug`, etc.).
/// - `EDGESERVER_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file.
///   If unset, logs are emitted to stderr in a compact console format.
/// - `RUST_LOG`: fallback filter.
pub fn init_observability() {
    init_observability_with_level(None);
}

/// Like [`init_observability`], but `level` (when set and parseable) takes
/// precedence over the environment filters.
pub fn init_observability_with_level(level: Option<&str>) {
    INIT.get_or_init(|| {
        if !observability_enabled() {
            return;
        }

        let env_filter = resolve_env_filter(level);
        if let Ok(path_raw) = std::env::var("EDGESERVER_JSON_LOG_PATH") {
            let (dir, file_name) = split_log_path(Path::new(&path_raw));
            let _ = std::fs::create_dir_all(&dir);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            // stdout belongs to the conversation output.
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}
