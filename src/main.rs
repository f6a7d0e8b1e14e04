use clap::Parser;
use oilapi_harness::utils::error::{ErrorSeverity, HarnessError};
use oilapi_harness::utils::logger;
use oilapi_harness::{ApiClient, CliConfig, HarnessConfig, ScenarioRunner};

fn exit_code_for(error: &HarnessError) -> i32 {
    match error.severity() {
        ErrorSeverity::Critical => 3,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
    }
}

fn fail(error: HarnessError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        error,
        error.category(),
        error.severity()
    );
    eprintln!("❌ {}", error.user_friendly_message());
    eprintln!("💡 {}", error.recovery_suggestion());
    std::process::exit(exit_code_for(&error));
}

fn list(config: &HarnessConfig) {
    for scenario in &config.scenarios {
        match &scenario.description {
            Some(description) => println!("{:<28} {}", scenario.name, description),
            None => println!("{}", scenario.name),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = CliConfig::parse();

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => fail(e),
    };

    if cli.list {
        list(&config);
        return;
    }

    if let Err(e) = logger::init_logger(
        config.verbose,
        config.log_level.as_deref(),
        config.log_format,
        config.log_file.as_deref(),
    ) {
        fail(e);
    }

    tracing::info!("Starting oilapi-harness against {}", config.base_url);
    tracing::debug!("Config: {:?}", config);

    let client = match ApiClient::new(&config.base_url, config.timeout) {
        Ok(client) => client,
        Err(e) => fail(e),
    };

    let runner = ScenarioRunner::new(client, config.expectations.clone())
        .with_strict(config.strict)
        .with_strict_formats(config.strict_formats);
    let report = runner.run_suite(&config.scenarios).await;

    print!("{}", report.render());

    if let Some(path) = &config.report_path {
        let written = report
            .to_json()
            .map_err(HarnessError::from)
            .and_then(|json| std::fs::write(path, json).map_err(HarnessError::from));
        match written {
            Ok(()) => tracing::info!("📁 Report saved to: {}", path.display()),
            Err(e) => fail(e),
        }
    }

    if report.all_passed() {
        tracing::info!("✅ All {} scenario(s) passed", report.summary.total);
    }
    std::process::exit(report.exit_code());
}
