use crate::config::toml_config::SuiteConfig;
use crate::config::HarnessConfig;
use crate::utils::error::Result;
use crate::utils::logger::LogFormat;
use crate::utils::validation::Validate;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "oilapi-harness")]
#[command(about = "Conformance checks for the OilAPI barrel and measurement service")]
pub struct CliConfig {
    #[arg(long, env = "OILAPI_BASE_URL", help = "Base URL of the API under test")]
    pub base_url: Option<String>,

    #[arg(long, short, help = "TOML suite file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Per-request timeout")]
    pub timeout_seconds: Option<u64>,

    #[arg(long, env = "OILAPI_LOG_FILE", help = "Also write logs to this file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Fail on status codes outside the configured sets")]
    pub strict: bool,

    #[arg(long, help = "Assert uuid formats on ids")]
    pub strict_formats: bool,

    #[arg(long, value_delimiter = ',', help = "Run only these scenarios")]
    pub only: Vec<String>,

    #[arg(long, help = "List the selected scenarios and exit")]
    pub list: bool,

    #[arg(long, help = "Write a JSON report to this path")]
    pub report: Option<PathBuf>,
}

impl CliConfig {
    /// Flags and environment over the suite file over defaults.
    pub fn load(&self) -> Result<HarnessConfig> {
        let suite = match &self.config {
            Some(path) => SuiteConfig::from_file(path)?,
            None => SuiteConfig::default(),
        };

        let mut config = HarnessConfig::from_suite(suite)?;

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout_seconds {
            config.timeout = Duration::from_secs(timeout);
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if !self.only.is_empty() {
            config.select(&self.only)?;
        }
        config.verbose = self.verbose;
        config.strict |= self.strict;
        config.strict_formats |= self.strict_formats;
        config.report_path = self.report.clone();

        config.validate()?;
        Ok(config)
    }
}
