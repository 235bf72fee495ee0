//! Configuration
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. Config file (`rill.toml` in the working directory, or an explicit path)
//! 3. Environment variables (`RILL_ENGINE__WAIT_TIMEOUT_MS`, ...)
//! 4. Builder overrides (CLI flags)
//!
//! A `.env` file is loaded first, so its values count as environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Engine behaviour
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// How long a directive may wait on a variable before the host is told.
    /// Unset means wait forever.
    #[serde(default)]
    pub wait_timeout_ms: Option<u64>,

    /// Flush writer sinks after every chunk
    #[serde(default)]
    pub flush_each_chunk: bool,
}

impl EngineConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default sources
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    wait_timeout_ms: Option<u64>,
    flush_each_chunk: Option<bool>,
}

impl ConfigBuilder {
    /// Explicit config file; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn wait_timeout_ms(mut self, ms: Option<u64>) -> Self {
        self.wait_timeout_ms = ms;
        self
    }

    pub fn flush_each_chunk(mut self, flush: Option<bool>) -> Self {
        self.flush_each_chunk = flush;
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let config_path = self
            .config_path
            .or_else(|| std::env::var("RILL_CONFIG_PATH").ok().map(PathBuf::from));

        let file = match &config_path {
            Some(path) => ::config::File::from(path.clone()).required(true),
            None => ::config::File::with_name("rill").required(false),
        };

        let mut config: Config = ::config::Config::builder()
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix("RILL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| match &config_path {
                Some(path) => format!("Failed to load config file {}", path.display()),
                None => "Failed to load configuration".to_string(),
            })?
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(ms) = self.wait_timeout_ms {
            config.engine.wait_timeout_ms = Some(ms);
        }
        if let Some(flush) = self.flush_each_chunk {
            config.engine.flush_each_chunk = flush;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("rill-{}-{}.toml", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.wait_timeout(), None);
        assert!(!config.engine.flush_each_chunk);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_load_from_file() {
        let path = write_temp_config(
            "file",
            "[engine]\nwait_timeout_ms = 250\nflush_each_chunk = true\n\n[logging]\nfilter = \"debug\"\n",
        );

        let config = Config::builder().config_path(Some(path.clone())).build().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.engine.wait_timeout(), Some(Duration::from_millis(250)));
        assert!(config.engine.flush_each_chunk);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_builder_overrides_file() {
        let path = write_temp_config("override", "[engine]\nwait_timeout_ms = 250\n");

        let config = Config::builder()
            .config_path(Some(path.clone()))
            .wait_timeout_ms(Some(10))
            .flush_each_chunk(Some(true))
            .build()
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.engine.wait_timeout_ms, Some(10));
        assert!(config.engine.flush_each_chunk);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let missing = std::env::temp_dir().join("rill-definitely-missing.toml");
        let err = Config::builder().config_path(Some(missing)).build().unwrap_err();
        assert!(err.to_string().contains("Failed to load config file"));
    }
}
