use crate::utils::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

fn default_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match (verbose, level) {
        (true, _) => EnvFilter::new("oilapi_harness=debug,info"),
        (false, Some(level)) => EnvFilter::new(format!("oilapi_harness={}", level)),
        (false, None) => EnvFilter::new("oilapi_harness=info"),
    })
}

/// Installs the global subscriber: console output in the chosen format, plus
/// an append-only plain-text copy when `log_file` is set.
pub fn init_logger(
    verbose: bool,
    level: Option<&str>,
    format: LogFormat,
    log_file: Option<&Path>,
) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let (compact_layer, json_layer) = match format {
        LogFormat::Compact => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .json(),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(default_filter(verbose, level))
        .with(compact_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| HarnessError::ConfigError {
            message: format!("Failed to install logger: {}", e),
        })
}
