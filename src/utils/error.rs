use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{method} {url} timed out after {timeout_ms}ms")]
    Timeout {
        method: String,
        url: String,
        timeout_ms: u64,
    },

    #[error("Response decode failed: {message}")]
    Decode {
        message: String,
        raw: Option<String>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Protocol,
    Configuration,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl HarnessError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            HarnessError::Transport(_) | HarnessError::Timeout { .. } => ErrorCategory::Network,
            HarnessError::Decode { .. } | HarnessError::SerializationError(_) => {
                ErrorCategory::Protocol
            }
            HarnessError::IoError(_) => ErrorCategory::Io,
            HarnessError::ConfigError { .. }
            | HarnessError::ConfigValidationError { .. }
            | HarnessError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Protocol => ErrorSeverity::Medium,
            ErrorCategory::Io => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            HarnessError::Transport(_) => {
                "Check that the base URL is reachable and the service is running"
            }
            HarnessError::Timeout { .. } => {
                "Raise --timeout-seconds or check the service for slow responses"
            }
            HarnessError::Decode { .. } => {
                "Inspect the raw response; the service may be returning a non-JSON error page"
            }
            HarnessError::IoError(_) => "Check file permissions for the log and report paths",
            HarnessError::SerializationError(_) => "Check the JSON payloads in the suite file",
            HarnessError::ConfigError { .. }
            | HarnessError::ConfigValidationError { .. }
            | HarnessError::InvalidConfigValueError { .. } => {
                "Fix the suite file or command line flags and run again"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not talk to the API: {}", self),
            ErrorCategory::Protocol => format!("The API answered with something unreadable: {}", self),
            ErrorCategory::Configuration => format!("The harness is misconfigured: {}", self),
            ErrorCategory::Io => format!("A local file operation failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
