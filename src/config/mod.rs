#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::expectations::ExpectationTable;
use crate::core::scenario::{validate_suite, Scenario};
use crate::utils::error::{HarnessError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{validate_path, validate_positive_number, validate_url, Validate};
use std::path::PathBuf;
use std::time::Duration;
use toml_config::SuiteConfig;

pub const DEFAULT_BASE_URL: &str = "https://to-barrel-monitor.azurewebsites.net";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Everything a run needs, resolved once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: LogFormat,
    pub verbose: bool,
    pub strict: bool,
    pub strict_formats: bool,
    pub expectations: ExpectationTable,
    pub scenarios: Vec<Scenario>,
    pub report_path: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            log_file: None,
            log_level: None,
            log_format: LogFormat::default(),
            verbose: false,
            strict: false,
            strict_formats: false,
            expectations: ExpectationTable::default(),
            scenarios: Scenario::builtin(),
            report_path: None,
        }
    }
}

impl HarnessConfig {
    /// Suite file values over built-in defaults. Scenario filtering from
    /// `[run] only` is applied here.
    pub fn from_suite(suite: SuiteConfig) -> Result<Self> {
        let timeout_seconds = suite
            .target
            .timeout_seconds
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        validate_positive_number("target.timeout_seconds", timeout_seconds, 1)?;

        let expectations = ExpectationTable::with_overrides(&suite.expectation_overrides()?)?;

        let mut scenarios = if suite.run.builtin.unwrap_or(true) {
            Scenario::builtin()
        } else {
            Vec::new()
        };
        scenarios.extend(suite.scenarios);

        let mut config = Self {
            base_url: suite
                .target
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_seconds),
            log_file: suite.logging.file.map(PathBuf::from),
            log_level: suite.logging.level,
            log_format: suite.logging.format.unwrap_or_default(),
            verbose: false,
            strict: suite.run.strict.unwrap_or(false),
            strict_formats: suite.run.strict_formats.unwrap_or(false),
            expectations,
            scenarios,
            report_path: None,
        };

        if let Some(only) = suite.run.only.filter(|names| !names.is_empty()) {
            config.select(&only)?;
        }

        Ok(config)
    }

    /// Keeps only the named scenarios, in suite order.
    pub fn select(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            if !self.scenarios.iter().any(|s| &s.name == name) {
                return Err(HarnessError::InvalidConfigValueError {
                    field: "run.only".to_string(),
                    value: name.clone(),
                    reason: "No scenario with this name".to_string(),
                });
            }
        }
        self.scenarios.retain(|s| names.contains(&s.name));
        Ok(())
    }
}

impl Validate for HarnessConfig {
    fn validate(&self) -> Result<()> {
        validate_url("target.base_url", &self.base_url)?;
        validate_positive_number("target.timeout_seconds", self.timeout.as_secs(), 1)?;

        if let Some(path) = &self.log_file {
            validate_path("logging.file", &path.to_string_lossy())?;
        }
        if let Some(path) = &self.report_path {
            validate_path("report", &path.to_string_lossy())?;
        }

        if self.scenarios.is_empty() {
            return Err(HarnessError::ConfigValidationError {
                field: "scenarios".to_string(),
                message: "Nothing to run: no scenarios selected".to_string(),
            });
        }
        validate_suite(&self.scenarios)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.scenarios.len(), 10);
        config.validate().unwrap();
    }

    #[test]
    fn test_from_suite_merges_scenarios_and_filters() {
        let suite = SuiteConfig::from_toml_str(
            r#"
[target]
base_url = "http://localhost:5000/api"

[run]
only = ["list_barrels", "extra"]

[[scenarios]]
name = "extra"
steps = [{ action = "list_measurements" }]
"#,
        )
        .unwrap();

        let config = HarnessConfig::from_suite(suite).unwrap();
        let names: Vec<&str> = config.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["list_barrels", "extra"]);
        config.validate().unwrap();
    }

    #[test]
    fn test_duplicate_of_builtin_rejected() {
        let suite = SuiteConfig::from_toml_str(
            r#"
[[scenarios]]
name = "list_barrels"
steps = [{ action = "list_barrels" }]
"#,
        )
        .unwrap();

        let config = HarnessConfig::from_suite(suite).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_filter_and_zero_timeout() {
        let mut config = HarnessConfig::default();
        assert!(config.select(&["missing".to_string()]).is_err());

        let suite = SuiteConfig::from_toml_str("[target]\ntimeout_seconds = 0\n").unwrap();
        assert!(HarnessConfig::from_suite(suite).is_err());
    }

    #[test]
    fn test_unresolved_env_var_fails_validation() {
        let suite = SuiteConfig::from_toml_str(
            "[target]\nbase_url = \"${OILAPI_SURELY_UNSET_VARIABLE}\"\n",
        )
        .unwrap();
        let config = HarnessConfig::from_suite(suite).unwrap();
        assert!(config.validate().is_err());
    }
}
