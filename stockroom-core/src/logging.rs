//! Logging setup
//!
//! Structured logging through `tracing`, configurable output format and target.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `[logging]` section of the config file
///
/// `RUST_LOG`, when set, replaces `level`; `filter_directives` still apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level: trace, debug, info, warn or error
    pub level: String,
    pub format: LogFormat,
    /// Emit source file and line
    pub source_location: bool,
    /// Emit thread ids and names
    pub thread_ids: bool,
    /// Append to this file instead of writing to stderr
    pub file: Option<PathBuf>,
    /// Extra `target=level` directives, e.g. `reqwest=info`
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            source_location: false,
            thread_ids: false,
            file: None,
            filter_directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Verbose preset used by `--verbose`
    pub fn verbose() -> Self {
        Self {
            level: "debug".to_string(),
            filter_directives: vec![
                "stockroom_auth=debug".to_string(),
                "stockroom_core=debug".to_string(),
                "reqwest=info".to_string(),
            ],
            ..Self::default()
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        for directive in &self.filter_directives {
            filter = filter.add_directive(directive.parse()?);
        }

        Ok(filter)
    }
}

/// Initialize the logging system
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = tracing_subscriber::registry().with(config.env_filter()?);

    let file = match &config.file {
        Some(path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?,
        ),
        None => None,
    };

    macro_rules! install {
        ($layer:expr) => {{
            let layer = $layer
                .with_file(config.source_location)
                .with_line_number(config.source_location)
                .with_thread_ids(config.thread_ids)
                .with_thread_names(config.thread_ids);
            match file {
                Some(file) => registry
                    .with(layer.with_writer(std::sync::Mutex::new(file)))
                    .try_init()?,
                None => registry.with(layer.with_writer(io::stderr)).try_init()?,
            }
        }};
    }

    match config.format {
        LogFormat::Json => install!(fmt::layer().json()),
        LogFormat::Pretty => install!(fmt::layer().pretty()),
        LogFormat::Compact => install!(fmt::layer().compact()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_from_lowercase_toml() {
        let config: LoggingConfig = toml::from_str("format = \"json\"\nlevel = \"info\"").unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
        assert!(config.filter_directives.is_empty());
    }

    #[test]
    fn bad_directive_is_rejected() {
        let config = LoggingConfig {
            filter_directives: vec!["stockroom_auth=notalevel".to_string()],
            ..LoggingConfig::default()
        };
        assert!(config.env_filter().is_err());
    }
}
