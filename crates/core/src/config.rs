use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::stage::Stage;
use crate::pipeline::aggregator::PipelineAggregator;
use crate::pipeline::presentation::LinkSettings;
use crate::pipeline::sla::{SlaPolicy, SlaThreshold};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub links: LinksConfig,
    pub auth: AuthConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub poll_interval_secs: u64,
    pub move_timeout_secs: u64,
    pub terminal_retention_days: u32,
    pub sla_fallback: SlaThresholdConfig,
    pub sla: BTreeMap<Stage, SlaThresholdConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaThresholdConfig {
    pub warning_after_mins: u64,
    pub overdue_after_mins: u64,
}

#[derive(Clone, Debug)]
pub struct LinksConfig {
    pub messaging_base_url: String,
    pub quote_viewer_base_url: String,
}

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub admin_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub poll_interval_secs: Option<u64>,
    pub client_base_url: Option<String>,
    pub admin_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl SlaThresholdConfig {
    pub fn to_threshold(self) -> SlaThreshold {
        SlaThreshold::new(
            Duration::minutes(clamp_minutes(self.warning_after_mins)),
            Duration::minutes(clamp_minutes(self.overdue_after_mins)),
        )
    }
}

impl From<SlaThreshold> for SlaThresholdConfig {
    fn from(threshold: SlaThreshold) -> Self {
        Self {
            warning_after_mins: threshold.warning_after.num_minutes().max(0) as u64,
            overdue_after_mins: threshold.overdue_after.num_minutes().max(0) as u64,
        }
    }
}

fn clamp_minutes(minutes: u64) -> i64 {
    i64::try_from(minutes).unwrap_or(i64::MAX / 60_000).min(i64::MAX / 60_000)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let defaults = SlaPolicy::default();
        Self {
            poll_interval_secs: 30,
            move_timeout_secs: 10,
            terminal_retention_days: 30,
            sla_fallback: defaults.fallback().into(),
            sla: defaults
                .thresholds()
                .map(|(stage, threshold)| (stage, SlaThresholdConfig::from(threshold)))
                .collect(),
        }
    }
}

impl PipelineConfig {
    pub fn sla_policy(&self) -> SlaPolicy {
        let mut policy = SlaPolicy::new(self.sla_fallback.to_threshold());
        for (stage, threshold) in &self.sla {
            policy.set_threshold(*stage, threshold.to_threshold());
        }
        policy
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    pub fn move_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.move_timeout_secs)
    }
}

impl LinksConfig {
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            messaging_base_url: self.messaging_base_url.clone(),
            quote_viewer_base_url: self.quote_viewer_base_url.clone(),
        }
    }
}

impl AuthConfig {
    /// True when no admin token is configured or `presented` matches it.
    pub fn permits_force(&self, presented: Option<&str>) -> bool {
        match &self.admin_token {
            None => true,
            Some(expected) => presented.is_some_and(|token| token == expected.expose_secret()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let links = LinkSettings::default();
        Self {
            database: DatabaseConfig {
                url: "sqlite://leadboard.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            pipeline: PipelineConfig::default(),
            links: LinksConfig {
                messaging_base_url: links.messaging_base_url,
                quote_viewer_base_url: links.quote_viewer_base_url,
            },
            auth: AuthConfig::default(),
            client: ClientConfig { base_url: "http://127.0.0.1:8080".to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadboard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn aggregator(&self) -> PipelineAggregator {
        PipelineAggregator::new(self.pipeline.sla_policy(), self.links.link_settings())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(poll_interval_secs) = pipeline.poll_interval_secs {
                self.pipeline.poll_interval_secs = poll_interval_secs;
            }
            if let Some(move_timeout_secs) = pipeline.move_timeout_secs {
                self.pipeline.move_timeout_secs = move_timeout_secs;
            }
            if let Some(terminal_retention_days) = pipeline.terminal_retention_days {
                self.pipeline.terminal_retention_days = terminal_retention_days;
            }
            if let Some(fallback) = pipeline.sla_fallback {
                self.pipeline.sla_fallback = fallback;
            }
            for (raw_stage, threshold) in pipeline.sla {
                let stage = Stage::parse(&raw_stage).ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "pipeline.sla.{raw_stage} does not name a known stage"
                    ))
                })?;
                self.pipeline.sla.insert(stage, threshold);
            }
        }

        if let Some(links) = patch.links {
            if let Some(messaging_base_url) = links.messaging_base_url {
                self.links.messaging_base_url = messaging_base_url;
            }
            if let Some(quote_viewer_base_url) = links.quote_viewer_base_url {
                self.links.quote_viewer_base_url = quote_viewer_base_url;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(admin_token_value) = auth.admin_token {
                self.auth.admin_token = Some(secret_value(admin_token_value));
            }
        }

        if let Some(client) = patch.client {
            if let Some(base_url) = client.base_url {
                self.client.base_url = base_url;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEADBOARD_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LEADBOARD_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("LEADBOARD_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LEADBOARD_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LEADBOARD_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADBOARD_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LEADBOARD_SERVER_PORT") {
            self.server.port = parse_u16("LEADBOARD_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LEADBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LEADBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADBOARD_PIPELINE_POLL_INTERVAL_SECS") {
            self.pipeline.poll_interval_secs =
                parse_u64("LEADBOARD_PIPELINE_POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADBOARD_PIPELINE_MOVE_TIMEOUT_SECS") {
            self.pipeline.move_timeout_secs =
                parse_u64("LEADBOARD_PIPELINE_MOVE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADBOARD_PIPELINE_TERMINAL_RETENTION_DAYS") {
            self.pipeline.terminal_retention_days =
                parse_u32("LEADBOARD_PIPELINE_TERMINAL_RETENTION_DAYS", &value)?;
        }

        if let Some(value) = read_env("LEADBOARD_LINKS_MESSAGING_BASE_URL") {
            self.links.messaging_base_url = value;
        }
        if let Some(value) = read_env("LEADBOARD_LINKS_QUOTE_VIEWER_BASE_URL") {
            self.links.quote_viewer_base_url = value;
        }

        if let Some(value) = read_env("LEADBOARD_AUTH_ADMIN_TOKEN") {
            self.auth.admin_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("LEADBOARD_CLIENT_BASE_URL") {
            self.client.base_url = value;
        }

        let log_level =
            read_env("LEADBOARD_LOGGING_LEVEL").or_else(|| read_env("LEADBOARD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEADBOARD_LOGGING_FORMAT").or_else(|| read_env("LEADBOARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(poll_interval_secs) = overrides.poll_interval_secs {
            self.pipeline.poll_interval_secs = poll_interval_secs;
        }
        if let Some(base_url) = overrides.client_base_url {
            self.client.base_url = base_url;
        }
        if let Some(admin_token) = overrides.admin_token {
            self.auth.admin_token = Some(secret_value(admin_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_pipeline(&self.pipeline)?;
        validate_links(&self.links)?;
        validate_auth(&self.auth)?;
        validate_client(&self.client)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadboard.toml"), PathBuf::from("config/leadboard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.poll_interval_secs == 0 || pipeline.poll_interval_secs > 3600 {
        return Err(ConfigError::Validation(
            "pipeline.poll_interval_secs must be in range 1..=3600".to_string(),
        ));
    }

    if pipeline.move_timeout_secs == 0 || pipeline.move_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "pipeline.move_timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    if pipeline.terminal_retention_days == 0 || pipeline.terminal_retention_days > 3650 {
        return Err(ConfigError::Validation(
            "pipeline.terminal_retention_days must be in range 1..=3650".to_string(),
        ));
    }

    let fallback = std::iter::once(("sla_fallback".to_string(), pipeline.sla_fallback));
    let per_stage = pipeline
        .sla
        .iter()
        .map(|(stage, threshold)| (format!("sla.{stage}"), *threshold));
    for (key, threshold) in fallback.chain(per_stage) {
        if threshold.warning_after_mins > threshold.overdue_after_mins {
            return Err(ConfigError::Validation(format!(
                "pipeline.{key}.warning_after_mins must not exceed overdue_after_mins"
            )));
        }
    }

    Ok(())
}

fn validate_links(links: &LinksConfig) -> Result<(), ConfigError> {
    let url = links.messaging_base_url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "links.messaging_base_url must start with http:// or https://".to_string(),
        ));
    }

    if links.quote_viewer_base_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "links.quote_viewer_base_url must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    let blank = auth
        .admin_token
        .as_ref()
        .map(|token| token.expose_secret().trim().is_empty())
        .unwrap_or(false);
    if blank {
        return Err(ConfigError::Validation(
            "auth.admin_token must not be blank when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_client(client: &ClientConfig) -> Result<(), ConfigError> {
    let url = client.base_url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "client.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    pipeline: Option<PipelinePatch>,
    links: Option<LinksPatch>,
    auth: Option<AuthPatch>,
    client: Option<ClientPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    poll_interval_secs: Option<u64>,
    move_timeout_secs: Option<u64>,
    terminal_retention_days: Option<u32>,
    sla_fallback: Option<SlaThresholdConfig>,
    #[serde(default)]
    sla: BTreeMap<String, SlaThresholdConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct LinksPatch {
    messaging_base_url: Option<String>,
    quote_viewer_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    admin_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ClientPatch {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use chrono::Duration;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::domain::stage::Stage;
    use crate::pipeline::sla::SlaStatus;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_match_builtin_sla_policy() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;

        let policy = config.pipeline.sla_policy();
        ensure(
            policy.classify(Stage::QuoteSent, Duration::minutes(10)) == SlaStatus::Ok,
            "quote_sent should be ok after ten minutes",
        )?;
        ensure(
            policy.classify(Stage::QuoteSent, Duration::hours(5)) == SlaStatus::Overdue,
            "quote_sent should be overdue after five hours",
        )?;
        ensure(config.pipeline.poll_interval_secs == 30, "default poll interval is 30s")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_LEADBOARD_ADMIN_TOKEN", "from-env-token");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadboard.toml");
            fs::write(
                &path,
                r#"
[auth]
admin_token = "${TEST_LEADBOARD_ADMIN_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let token = config.auth.admin_token.as_ref().map(|token| token.expose_secret());
            ensure(token == Some("from-env-token"), "admin token should be interpolated")?;
            ensure(config.auth.permits_force(Some("from-env-token")), "matching token permits")?;
            ensure(!config.auth.permits_force(Some("wrong")), "wrong token is refused")?;
            ensure(!config.auth.permits_force(None), "missing token is refused")
        })();

        clear_vars(&["TEST_LEADBOARD_ADMIN_TOKEN"]);
        result
    }

    #[test]
    fn sla_tables_are_read_from_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("leadboard.toml");
        fs::write(
            &path,
            r#"
[pipeline]
poll_interval_secs = 15

[pipeline.sla_fallback]
warning_after_mins = 120
overdue_after_mins = 360

[pipeline.sla.quote_sent]
warning_after_mins = 30
overdue_after_mins = 90
"#,
        )
        .map_err(|err| err.to_string())?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;
        let policy = config.pipeline.sla_policy();

        ensure(config.pipeline.poll_interval_secs == 15, "poll interval from file")?;
        ensure(
            policy.classify(Stage::QuoteSent, Duration::minutes(45)) == SlaStatus::Warning,
            "quote_sent threshold from file",
        )?;
        ensure(
            policy.classify(Stage::Lost, Duration::minutes(200)) == SlaStatus::Warning,
            "unmapped stage uses fallback from file",
        )?;
        ensure(
            policy.classify(Stage::NewLead, Duration::minutes(20)) == SlaStatus::Warning,
            "built-in stage thresholds survive a partial file",
        )
    }

    #[test]
    fn unknown_sla_stage_in_file_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("leadboard.toml");
        fs::write(
            &path,
            r#"
[pipeline.sla.archived]
warning_after_mins = 1
overdue_after_mins = 2
"#,
        )
        .map_err(|err| err.to_string())?;

        match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
            Ok(_) => Err("expected unknown stage to be rejected".to_string()),
            Err(error) => {
                let names_stage = matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("archived")
                );
                ensure(names_stage, "validation failure should name the stage")
            }
        }
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADBOARD_LOG_LEVEL", "warn");
        env::set_var("LEADBOARD_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["LEADBOARD_LOG_LEVEL", "LEADBOARD_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADBOARD_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("LEADBOARD_SERVER_PORT", "9090");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadboard.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[server]
port = 7070

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.server.port == 9090, "env port should win over file and defaults")?;
            Ok(())
        })();

        clear_vars(&["LEADBOARD_DATABASE_URL", "LEADBOARD_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADBOARD_PIPELINE_POLL_INTERVAL_SECS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("poll_interval_secs")
            );
            ensure(has_message, "validation failure should mention poll_interval_secs")
        })();

        clear_vars(&["LEADBOARD_PIPELINE_POLL_INTERVAL_SECS"]);
        result
    }

    #[test]
    fn terminal_retention_is_bounded() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.pipeline.terminal_retention_days = 3650;
        config.validate().map_err(|err| err.to_string())?;

        for days in [0, 3651, 1_000_000_000] {
            config.pipeline.terminal_retention_days = days;
            let rejected = matches!(
                config.validate(),
                Err(ConfigError::Validation(ref message))
                    if message.contains("terminal_retention_days")
            );
            ensure(rejected, "out-of-range retention should fail validation")?;
        }
        Ok(())
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADBOARD_SERVER_PORT", "eighty");
        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override".to_string()),
            Err(error) => {
                let names_key = matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "LEADBOARD_SERVER_PORT"
                );
                ensure(names_key, "error should name the offending variable")
            }
        };

        clear_vars(&["LEADBOARD_SERVER_PORT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADBOARD_AUTH_ADMIN_TOKEN", "admin-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("admin-secret-value"),
                "debug output should not contain the admin token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["LEADBOARD_AUTH_ADMIN_TOKEN"]);
        result
    }
}
