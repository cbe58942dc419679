use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadboard_core::config::{AppConfig, LoadOptions, SlaThresholdConfig};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: String,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &str, value: impl ToString, env_keys: &'static [&'static str]) -> Self {
        Self { key: key.to_string(), value: value.to_string(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            &field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(&field.key, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    let pipeline = &config.pipeline;
    let mut fields = vec![
        Field::new("database.url", &config.database.url, &["LEADBOARD_DATABASE_URL"]),
        Field::new(
            "database.max_connections",
            config.database.max_connections,
            &["LEADBOARD_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs,
            &["LEADBOARD_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["LEADBOARD_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port, &["LEADBOARD_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs,
            &["LEADBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "pipeline.poll_interval_secs",
            pipeline.poll_interval_secs,
            &["LEADBOARD_PIPELINE_POLL_INTERVAL_SECS"],
        ),
        Field::new(
            "pipeline.move_timeout_secs",
            pipeline.move_timeout_secs,
            &["LEADBOARD_PIPELINE_MOVE_TIMEOUT_SECS"],
        ),
        Field::new(
            "pipeline.terminal_retention_days",
            pipeline.terminal_retention_days,
            &["LEADBOARD_PIPELINE_TERMINAL_RETENTION_DAYS"],
        ),
        Field::new("pipeline.sla_fallback", render_threshold(pipeline.sla_fallback), &[]),
    ];

    for (stage, threshold) in &pipeline.sla {
        fields.push(Field::new(
            &format!("pipeline.sla.{}", stage.as_str()),
            render_threshold(*threshold),
            &[],
        ));
    }

    let admin_token = match &config.auth.admin_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };
    fields.extend([
        Field::new(
            "links.messaging_base_url",
            &config.links.messaging_base_url,
            &["LEADBOARD_LINKS_MESSAGING_BASE_URL"],
        ),
        Field::new(
            "links.quote_viewer_base_url",
            &config.links.quote_viewer_base_url,
            &["LEADBOARD_LINKS_QUOTE_VIEWER_BASE_URL"],
        ),
        Field::new("auth.admin_token", admin_token, &["LEADBOARD_AUTH_ADMIN_TOKEN"]),
        Field::new("client.base_url", &config.client.base_url, &["LEADBOARD_CLIENT_BASE_URL"]),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["LEADBOARD_LOGGING_LEVEL", "LEADBOARD_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["LEADBOARD_LOGGING_FORMAT", "LEADBOARD_LOG_FORMAT"],
        ),
    ]);

    fields
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("leadboard.toml"), PathBuf::from("config/leadboard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn render_threshold(threshold: SlaThresholdConfig) -> String {
    format!(
        "warning after {}m, overdue after {}m",
        threshold.warning_after_mins, threshold.overdue_after_mins
    )
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    format!("<redacted, {} chars>", trimmed.chars().count())
}
