//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{
    CliArgs, Command, CredentialOverrides, LoggingOverrides, PublishArgs, ServeArgs,
    ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pagesmith";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_PAGES_DOMAIN: &str = "github.io";
const DEFAULT_GITHUB_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GENERATOR_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_GENERATOR_MODEL: &str = "gpt-4o-mini";
const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 120;
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(**redacted**)")
    }
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub auth: AuthSettings,
    pub github: GithubSettings,
    pub generator: GeneratorSettings,
    pub notify: NotifySettings,
    pub publish: PublishDocumentSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub secret: Secret,
}

#[derive(Debug, Clone)]
pub struct GithubSettings {
    pub api_base: Url,
    pub token: Secret,
    pub owner: String,
    pub branch: String,
    pub pages_domain: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorBackend {
    /// Offline template renderer.
    Static,
    /// OpenAI-compatible chat completions endpoint.
    OpenAi,
}

impl FromStr for GeneratorBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown backend `{other}` (expected static|openai)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub backend: GeneratorBackend,
    pub endpoint: Url,
    pub api_key: Option<Secret>,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PublishDocumentSettings {
    pub license_holder: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("missing required configuration `{key}`")]
    Missing { key: &'static str },
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }

    fn missing(key: &'static str) -> Self {
        Self::Missing { key }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PAGESMITH").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_credential_overrides(&cli.credentials);
    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Publish(args)) => raw.apply_logging_overrides(&args.logging),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    auth: RawAuthSettings,
    github: RawGithubSettings,
    generator: RawGeneratorSettings,
    notify: RawNotifySettings,
    publish: RawPublishSettings,
}

impl RawSettings {
    fn apply_credential_overrides(&mut self, overrides: &CredentialOverrides) {
        if let Some(secret) = overrides.secret.as_ref() {
            self.auth.secret = Some(secret.clone());
        }
        if let Some(token) = overrides.github_token.as_ref() {
            self.github.token = Some(token.clone());
        }
        if let Some(user) = overrides.github_user.as_ref() {
            self.github.owner = Some(user.clone());
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(backend) = overrides.generator_backend.as_ref() {
            self.generator.backend = Some(backend.clone());
        }

        self.apply_logging_overrides(&overrides.logging);
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            auth,
            github,
            generator,
            notify,
            publish,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let auth = build_auth_settings(auth)?;
        let github = build_github_settings(github)?;
        let generator = build_generator_settings(generator)?;
        let notify = build_notify_settings(notify)?;
        let publish = build_publish_settings(publish, &github.owner);

        Ok(Self {
            server,
            logging,
            auth,
            github,
            generator,
            notify,
            publish,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_shutdown = non_zero_seconds(
        server.graceful_shutdown_seconds,
        DEFAULT_GRACEFUL_SHUTDOWN_SECS,
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let secret = required(auth.secret, "auth.secret")?;
    Ok(AuthSettings {
        secret: Secret::new(secret),
    })
}

fn build_github_settings(github: RawGithubSettings) -> Result<GithubSettings, LoadError> {
    let token = required(github.token, "github.token")?;
    let owner = required(github.owner, "github.owner")?;

    let api_base = parse_url(
        github.api_base.as_deref().unwrap_or(DEFAULT_GITHUB_API_BASE),
        "github.api_base",
    )?;

    let branch = non_empty_or(github.branch, DEFAULT_BRANCH);
    let pages_domain = non_empty_or(github.pages_domain, DEFAULT_PAGES_DOMAIN);

    let timeout = non_zero_seconds(
        github.timeout_seconds,
        DEFAULT_GITHUB_TIMEOUT_SECS,
        "github.timeout_seconds",
    )?;

    Ok(GithubSettings {
        api_base,
        token: Secret::new(token),
        owner,
        branch,
        pages_domain,
        timeout,
    })
}

fn build_generator_settings(
    generator: RawGeneratorSettings,
) -> Result<GeneratorSettings, LoadError> {
    let backend = match generator.backend.as_deref() {
        Some(value) => GeneratorBackend::from_str(value)
            .map_err(|reason| LoadError::invalid("generator.backend", reason))?,
        None => GeneratorBackend::Static,
    };

    let endpoint = parse_url(
        generator
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_GENERATOR_ENDPOINT),
        "generator.endpoint",
    )?;

    let api_key = generator.api_key.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| Secret::new(trimmed))
    });
    if backend == GeneratorBackend::OpenAi && api_key.is_none() {
        return Err(LoadError::missing("generator.api_key"));
    }

    let model = non_empty_or(generator.model, DEFAULT_GENERATOR_MODEL);

    let timeout = non_zero_seconds(
        generator.timeout_seconds,
        DEFAULT_GENERATOR_TIMEOUT_SECS,
        "generator.timeout_seconds",
    )?;

    Ok(GeneratorSettings {
        backend,
        endpoint,
        api_key,
        model,
        timeout,
    })
}

fn build_notify_settings(notify: RawNotifySettings) -> Result<NotifySettings, LoadError> {
    let timeout = non_zero_seconds(
        notify.timeout_seconds,
        DEFAULT_NOTIFY_TIMEOUT_SECS,
        "notify.timeout_seconds",
    )?;
    Ok(NotifySettings { timeout })
}

fn build_publish_settings(publish: RawPublishSettings, owner: &str) -> PublishDocumentSettings {
    PublishDocumentSettings {
        license_holder: non_empty_or(publish.license_holder, owner),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGithubSettings {
    api_base: Option<String>,
    token: Option<String>,
    owner: Option<String>,
    branch: Option<String>,
    pages_domain: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGeneratorSettings {
    backend: Option<String>,
    endpoint: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNotifySettings {
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPublishSettings {
    license_holder: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid url `{value}`: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, LoadError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| LoadError::missing(key))
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn non_zero_seconds(
    value: Option<u64>,
    default: u64,
    key: &'static str,
) -> Result<Duration, LoadError> {
    let seconds = value.unwrap_or(default);
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
}
