pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;
pub use config::HarnessConfig;

pub use adapters::ApiClient;
pub use crate::core::{
    expectations::ExpectationTable, report::SuiteReport, runner::ScenarioRunner,
    scenario::Scenario,
};
pub use utils::error::{HarnessError, Result};
