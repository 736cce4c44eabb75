use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use crate::domain::Symbol;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub ws_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Channel name carrying level-2 book data.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Depth limit applied to returned views; full depth is always retained
    /// internally.
    pub depth: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
    pub name: String,
    pub venue_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_channel() -> String {
    "level2".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            depth: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.network.ws_url.is_empty() {
            return Err(ConfigError::MissingField { field: "ws_url" }.into());
        }
        let url = url::Url::parse(&self.network.ws_url)
            .map_err(|e| ConfigError::InvalidValue {
                field: "ws_url",
                reason: e.to_string(),
            })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidValue {
                field: "ws_url",
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }
            .into());
        }
        if self.feed.channel.is_empty() {
            return Err(ConfigError::MissingField { field: "channel" }.into());
        }
        for symbol in &self.symbols {
            if symbol.venue_id.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "symbols",
                    reason: format!("empty venue_id for '{}'", symbol.name),
                }
                .into());
            }
        }
        Ok(())
    }

    /// The configured symbol table.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols
            .iter()
            .map(|s| Symbol::new(s.name.clone(), s.venue_id.clone()))
            .collect()
    }

    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                ws_url: "wss://ws-feed.example.com".into(),
            },
            feed: FeedConfig::default(),
            symbols: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}
