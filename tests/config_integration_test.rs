use anyhow::Result;
use httpmock::prelude::*;
use oilapi_harness::config::toml_config::SuiteConfig;
use oilapi_harness::core::report::ScenarioVerdict;
use oilapi_harness::utils::validation::Validate;
use oilapi_harness::{ApiClient, HarnessConfig, ScenarioRunner};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_bundled_suite_is_valid() -> Result<()> {
    let suite = SuiteConfig::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/suites/oilapi.toml"))?;
    let config = HarnessConfig::from_suite(suite)?;
    config.validate()?;
    assert_eq!(config.scenarios.len(), 13);
    Ok(())
}

#[tokio::test]
async fn test_suite_file_drives_a_run() -> Result<()> {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/barrels/unknown");
            then.status(500).body("Sequence contains no elements");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/barrels");
            then.status(200).json_body(json!([]));
        })
        .await;

    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
[target]
base_url = "{}/api"
timeout_seconds = 5

[run]
builtin = false
strict = true

[expectations]
get_missing_barrel = [404, 500]

[[scenarios]]
name = "missing_and_list"
steps = [
    {{ action = "get_missing_barrel", id = "unknown" }},
    {{ action = "list_barrels" }},
]
"#,
        server.base_url()
    )?;

    let config = HarnessConfig::from_suite(SuiteConfig::from_file(file.path())?)?;
    config.validate()?;

    let client = ApiClient::new(&config.base_url, config.timeout)?;
    let report = ScenarioRunner::new(client, config.expectations.clone())
        .with_strict(config.strict)
        .run_suite(&config.scenarios)
        .await;

    assert_eq!(report.scenarios.len(), 1);
    assert_eq!(report.scenarios[0].verdict, ScenarioVerdict::Passed);
    assert_eq!(report.summary.drift, 0);
    assert_eq!(report.exit_code(), 0);

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(json["summary"]["passed"], 1);
    assert_eq!(json["scenarios"][0]["steps"][0]["status"], 500);
    Ok(())
}

#[test]
fn test_out_of_class_override_is_rejected() -> Result<()> {
    let suite = SuiteConfig::from_toml_str("[expectations]\nget_deleted_barrel = [200]\n")?;
    assert!(HarnessConfig::from_suite(suite).is_err());
    Ok(())
}
