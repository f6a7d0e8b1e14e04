use crate::core::expectations::Operation;
use crate::core::scenario::Scenario;
use crate::utils::error::{HarnessError, Result};
use crate::utils::logger::LogFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Suite file: target, logging, run switches, status expectations and extra scenarios.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub run: RunConfig,
    /// Operation name -> accepted status codes.
    #[serde(default)]
    pub expectations: HashMap<String, Vec<u16>>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub file: Option<String>,
    pub level: Option<String>,
    pub format: Option<LogFormat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub strict: Option<bool>,
    pub strict_formats: Option<bool>,
    /// Include the built-in scenario table (default true).
    pub builtin: Option<bool>,
    pub only: Option<Vec<String>>,
}

impl SuiteConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(HarnessError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| HarnessError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| HarnessError::ConfigError {
            message: format!("Bad substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Resolves operation names in `[expectations]`.
    pub fn expectation_overrides(&self) -> Result<HashMap<Operation, Vec<u16>>> {
        self.expectations
            .iter()
            .map(|(name, codes)| {
                Operation::from_name(name)
                    .map(|op| (op, codes.clone()))
                    .ok_or_else(|| HarnessError::InvalidConfigValueError {
                        field: "expectations".to_string(),
                        value: name.clone(),
                        reason: format!(
                            "Unknown operation. Known operations: {}",
                            Operation::ALL
                                .iter()
                                .map(|op| op.name())
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                    })
            })
            .collect()
    }
}
