use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;
use url::Url;

use crate::relay::{CompletionsSettings, DEFAULT_UPSTREAM_TIMEOUT};
use crate::widget::{
    ConcurrencyPolicy, DEFAULT_ERROR_TEXT, DEFAULT_FALLBACK_TEXT, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_MODEL, WidgetOptions,
};

/// Prefix of the layered environment source, e.g. `MCP_CHAT_SERVER__PORT`.
pub const ENV_PREFIX: &str = "MCP_CHAT";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Model identifier sent by the widget
    #[arg(long, env = "CHAT_MODEL")]
    pub model: Option<String>,

    /// Chat endpoint the widget posts to
    #[arg(long, env = "CHAT_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Relay backend: auto, echo or completions
    #[arg(long, env = "RELAY_BACKEND")]
    pub backend: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub widget: WidgetConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WidgetConfig {
    /// Chat endpoint URL; defaults to this server's own `/chat`.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    pub model: String,
    pub fallback_text: String,
    pub error_text: String,
    pub concurrency: ConcurrencyPolicy,
    /// Optional per-call timeout. Unset means a call may wait forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    pub idle_timeout_secs: u64,
}

/// Which backend answers `/chat`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Completions when an API key is configured, echo otherwise.
    Auto,
    Echo,
    Completions,
}

#[derive(Deserialize, Clone)]
pub struct RelayConfig {
    pub backend: BackendKind,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub referer: Option<String>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("referer", &self.referer)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// File mirrored by `GET /logs`. Unset disables the file sink.
    #[serde(default)]
    pub file: Option<String>,
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("widget.model", DEFAULT_MODEL)?
            .set_default("widget.fallback_text", DEFAULT_FALLBACK_TEXT)?
            .set_default("widget.error_text", DEFAULT_ERROR_TEXT)?
            .set_default("widget.concurrency", "concurrent")?
            .set_default("widget.idle_timeout_secs", DEFAULT_IDLE_TIMEOUT.as_secs())?
            .set_default("relay.backend", "auto")?
            .set_default("relay.base_url", "https://openrouter.ai")?
            .set_default("relay.referer", "http://localhost:8000")?
            .set_default("relay.timeout_secs", DEFAULT_UPSTREAM_TIMEOUT.as_secs())?
            .set_default("logging.file", "mcp_logs.txt")?
            .set_default("logging.json", false)?;

        // 2. Config file: explicit path, else ./config.* when present
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // 3. Environment variables, e.g. MCP_CHAT_SERVER__PORT=9000
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // The upstream key keeps its conventional name.
        if let Ok(key) = env::var("OPENROUTER_API_KEY") {
            if !key.trim().is_empty() {
                builder = builder.set_override("relay.api_key", key)?;
            }
        }

        // 4. CLI flags (and their env aliases) win
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(model) = cli.model {
            builder = builder.set_override("widget.model", model)?;
        }
        if let Some(url) = cli.endpoint_url {
            builder = builder.set_override("widget.endpoint_url", url)?;
        }
        if let Some(backend) = cli.backend {
            builder = builder.set_override("relay.backend", backend)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.widget.model.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "widget.model cannot be empty".to_string(),
            ));
        }
        self.widget_endpoint_url()?;
        if self.relay.backend == BackendKind::Completions && self.relay.api_key.is_none() {
            return Err(config::ConfigError::Message(
                "relay.backend=completions requires an API key (OPENROUTER_API_KEY)".to_string(),
            ));
        }
        Ok(())
    }

    /// URL the widget posts to.
    pub fn widget_endpoint_url(&self) -> Result<Url, config::ConfigError> {
        let raw = self
            .widget
            .endpoint_url
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}/chat", self.server.port));
        Url::parse(&raw).map_err(|e| {
            config::ConfigError::Message(format!("invalid widget.endpoint_url {raw:?}: {e}"))
        })
    }

    /// Options injected into every widget.
    #[must_use]
    pub fn widget_options(&self) -> WidgetOptions {
        WidgetOptions {
            model: self.widget.model.clone(),
            fallback_text: self.widget.fallback_text.clone(),
            error_text: self.widget.error_text.clone(),
            concurrency: self.widget.concurrency,
        }
    }

    /// Per-call widget timeout, if any.
    #[must_use]
    pub fn widget_timeout(&self) -> Option<Duration> {
        self.widget.timeout_secs.map(Duration::from_secs)
    }

    /// Effective relay backend after resolving `auto`.
    #[must_use]
    pub fn relay_backend(&self) -> BackendKind {
        match self.relay.backend {
            BackendKind::Auto if self.relay.api_key.is_some() => BackendKind::Completions,
            BackendKind::Auto => BackendKind::Echo,
            other => other,
        }
    }

    /// Upstream settings for the completions backend.
    #[must_use]
    pub fn completions_settings(&self) -> CompletionsSettings {
        CompletionsSettings {
            base_url: self.relay.base_url.clone(),
            api_key: self.relay.api_key.clone(),
            referer: self.relay.referer.clone(),
            timeout: Duration::from_secs(self.relay.timeout_secs),
        }
    }
}
