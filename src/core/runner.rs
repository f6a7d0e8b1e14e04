use crate::core::expectations::{ExpectationTable, StatusCheck};
use crate::core::report::{
    Finding, ScenarioReport, ScenarioVerdict, StepRecord, StepVerdict, SuiteReport,
};
use crate::core::scenario::{CreatedBarrel, CreatedMeasurement, Scenario, ScenarioContext, Step};
use crate::core::schema::{IdRule, Shape};
use crate::domain::model::{ApiPath, ApiResponse, Barrel, Measurement, NewMeasurement};
use crate::domain::ports::ApiTransport;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Instant;

const BARREL_TAGS: [&str; 3] = ["qr", "rfid", "nfc"];
const BARRELS: &str = "barrels";
const MEASUREMENTS: &str = "measurements";

/// Runs scenarios one after another against a single transport.
pub struct ScenarioRunner<T: ApiTransport> {
    transport: T,
    expectations: ExpectationTable,
    strict: bool,
    strict_formats: bool,
}

impl<T: ApiTransport> ScenarioRunner<T> {
    pub fn new(transport: T, expectations: ExpectationTable) -> Self {
        Self {
            transport,
            expectations,
            strict: false,
            strict_formats: false,
        }
    }

    /// Treat contract drift as failure.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Assert `uuid` formats on ids instead of only annotating them.
    pub fn with_strict_formats(mut self, strict_formats: bool) -> Self {
        self.strict_formats = strict_formats;
        self
    }

    pub async fn run_suite(&self, scenarios: &[Scenario]) -> SuiteReport {
        let started_at = Utc::now();
        tracing::info!(
            "🚀 Running {} scenario(s) against {}",
            scenarios.len(),
            self.transport.base_url()
        );

        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(self.run_scenario(scenario).await);
        }

        SuiteReport::new(self.transport.base_url(), self.strict, started_at, reports)
    }

    /// Steps run in order on a fresh context; the first step that does not
    /// pass ends the scenario.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioReport {
        tracing::info!("▶️ {}", scenario.name);
        let mut context = ScenarioContext::new();
        let mut records = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let record = self.run_step(index, step, &mut context).await;
            let passed = record.verdict.is_pass();
            records.push(record);
            if !passed {
                break;
            }
        }

        let report = ScenarioReport::conclude(&scenario.name, records, scenario.steps.len());
        if report.verdict == ScenarioVerdict::Passed {
            tracing::info!("✅ {} passed", scenario.name);
        } else {
            tracing::error!(
                "❌ {} [{}] {:?}",
                scenario.name,
                report.verdict.label(),
                report.verdict
            );
        }
        report
    }

    async fn run_step(&self, index: usize, step: &Step, context: &mut ScenarioContext) -> StepRecord {
        let started = Instant::now();
        let operation = step.operation();
        let method = operation.method();

        let record = |path: &ApiPath, status: Option<u16>, verdict, findings| StepRecord {
            index,
            operation,
            method,
            path: path.to_string(),
            status,
            verdict,
            findings,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        let (path, payload) = match request_for(step, context) {
            Ok(request) => request,
            Err(finding) => {
                return StepRecord {
                    index,
                    operation,
                    method,
                    path: String::new(),
                    status: None,
                    verdict: StepVerdict::Failed,
                    findings: vec![finding],
                    duration_ms: started.elapsed().as_millis() as u64,
                };
            }
        };

        tracing::debug!("{}. {} {} {}", index + 1, operation, method, path);

        let response = match self.transport.send(method, &path, payload.as_ref()).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("⚠️ {} {} failed: {}", method, path, e);
                return record(&path, None, StepVerdict::Errored, vec![Finding::from_error(&e)]);
            }
        };

        let mut findings = Vec::new();
        let expectation = self.expectations.get(operation);
        let expected: Vec<u16> = expectation.statuses.iter().copied().collect();

        let drift = match self.expectations.check(operation, response.status) {
            StatusCheck::Violation => {
                findings.push(Finding::unexpected_status(
                    expectation.class,
                    expected,
                    response.status,
                    response.raw_text(),
                ));
                return record(&path, Some(response.status), StepVerdict::Failed, findings);
            }
            StatusCheck::Drift => {
                tracing::warn!(
                    "⚠️ {} answered {} (configured {:?})",
                    operation,
                    response.status,
                    expected
                );
                findings.push(Finding::ContractDrift {
                    operation,
                    expected,
                    actual: response.status,
                });
                true
            }
            StatusCheck::Expected => false,
        };

        findings.extend(self.inspect(step, &response, context));

        let verdict = if findings.iter().any(Finding::is_harness_error) {
            StepVerdict::Errored
        } else if findings
            .iter()
            .any(|f| !matches!(f, Finding::ContractDrift { .. }))
        {
            StepVerdict::Failed
        } else if drift && self.strict {
            StepVerdict::Failed
        } else if drift {
            StepVerdict::Drift
        } else {
            StepVerdict::Passed
        };

        record(&path, Some(response.status), verdict, findings)
    }

    fn barrel_shape(&self, id: IdRule) -> Shape {
        Shape::barrel(id).check_formats(self.strict_formats)
    }

    fn measurement_shape(&self, id: IdRule) -> Shape {
        Shape::measurement(id).check_formats(self.strict_formats)
    }

    /// Body assertions for a response whose status already checked out.
    fn inspect(&self, step: &Step, response: &ApiResponse, context: &mut ScenarioContext) -> Vec<Finding> {
        match step {
            Step::CreateBarrel { payload, bind } => {
                let barrel: Barrel =
                    match decode_checked(response, &self.barrel_shape(IdRule::Required)) {
                        Ok(barrel) => barrel,
                        Err(finding) => return vec![finding],
                    };
                let findings = compare_tags(payload, &barrel);
                if findings.is_empty() {
                    if let Some(name) = bind {
                        context.bind_barrel(
                            name,
                            CreatedBarrel {
                                id: barrel.id,
                                payload: payload.clone(),
                            },
                        );
                    }
                }
                findings
            }
            Step::GetBarrel { barrel: name } => {
                let Some(created) = context.barrel(name) else {
                    return vec![unbound(name)];
                };
                let barrel: Barrel =
                    match decode_checked(response, &self.barrel_shape(IdRule::Required)) {
                        Ok(barrel) => barrel,
                        Err(finding) => return vec![finding],
                    };
                let mut findings = Vec::new();
                if barrel.id != created.id {
                    findings.push(mismatch("id", created.id.clone(), barrel.id.clone()));
                }
                findings.extend(compare_tags(&created.payload, &barrel));
                findings
            }
            Step::ListBarrels => {
                validate_list(response, &self.barrel_shape(IdRule::Required))
            }
            Step::ListMeasurements => {
                validate_list(response, &self.measurement_shape(IdRule::Optional))
            }
            Step::CreateMeasurement {
                barrel,
                dirt_level,
                weight,
                bind,
            } => {
                let Some(created) = context.barrel(barrel) else {
                    return vec![unbound(barrel)];
                };
                let barrel_id = created.id.clone();
                let id_rule = if bind.is_some() {
                    IdRule::Required
                } else {
                    IdRule::Optional
                };
                let measurement: Measurement =
                    match decode_checked(response, &self.measurement_shape(id_rule)) {
                        Ok(measurement) => measurement,
                        Err(finding) => return vec![finding],
                    };
                let findings = compare_measurement(&measurement, &barrel_id, *dirt_level, *weight);
                if let (true, Some(name), Some(id)) = (findings.is_empty(), bind, measurement.id) {
                    context.bind_measurement(
                        name,
                        CreatedMeasurement {
                            id,
                            barrel_id,
                            dirt_level: *dirt_level,
                            weight: *weight,
                        },
                    );
                }
                findings
            }
            Step::GetMeasurement { measurement: name } => {
                let Some(created) = context.measurement(name) else {
                    return vec![unbound(name)];
                };
                let measurement: Measurement =
                    match decode_checked(response, &self.measurement_shape(IdRule::Required)) {
                        Ok(measurement) => measurement,
                        Err(finding) => return vec![finding],
                    };
                let mut findings = Vec::new();
                if measurement.id.as_deref() != Some(created.id.as_str()) {
                    findings.push(mismatch("id", created.id.clone(), measurement.id.clone()));
                }
                findings.extend(compare_measurement(
                    &measurement,
                    &created.barrel_id,
                    created.dirt_level,
                    created.weight,
                ));
                findings
            }
            Step::CreateInvalidBarrel { .. }
            | Step::GetMissingBarrel { .. }
            | Step::DeleteBarrel { .. }
            | Step::GetDeletedBarrel { .. }
            | Step::GetMissingMeasurement { .. } => Vec::new(),
        }
    }
}

/// Path and payload for a step, resolving bound ids from the context.
fn request_for(step: &Step, context: &ScenarioContext) -> Result<(ApiPath, Option<Value>), Finding> {
    let barrel_id = |name: &str| {
        context
            .barrel(name)
            .map(|b| b.id.clone())
            .ok_or_else(|| unbound(name))
    };

    Ok(match step {
        Step::CreateBarrel { payload, .. } | Step::CreateInvalidBarrel { payload } => {
            (ApiPath::collection(BARRELS), Some(payload.clone()))
        }
        Step::ListBarrels => (ApiPath::collection(BARRELS), None),
        Step::GetBarrel { barrel }
        | Step::DeleteBarrel { barrel }
        | Step::GetDeletedBarrel { barrel } => {
            (ApiPath::item(BARRELS, &barrel_id(barrel.as_str())?), None)
        }
        Step::GetMissingBarrel { id } => (ApiPath::item(BARRELS, id), None),
        Step::CreateMeasurement {
            barrel,
            dirt_level,
            weight,
            ..
        } => {
            let payload = NewMeasurement {
                barrel_id: barrel_id(barrel.as_str())?,
                dirt_level: *dirt_level,
                weight: *weight,
            };
            let body = serde_json::to_value(&payload).map_err(|e| Finding::Precondition {
                message: format!("measurement payload could not be encoded: {}", e),
            })?;
            (ApiPath::collection(MEASUREMENTS), Some(body))
        }
        Step::ListMeasurements => (ApiPath::collection(MEASUREMENTS), None),
        Step::GetMeasurement { measurement } => {
            let id = context
                .measurement(measurement)
                .map(|m| m.id.clone())
                .ok_or_else(|| unbound(measurement))?;
            (ApiPath::item(MEASUREMENTS, &id), None)
        }
        Step::GetMissingMeasurement { id } => (ApiPath::item(MEASUREMENTS, id), None),
    })
}

fn unbound(name: &str) -> Finding {
    Finding::Precondition {
        message: format!("no resource is bound to '{}'", name),
    }
}

fn mismatch(field: &str, expected: impl Into<Value>, actual: impl Into<Value>) -> Finding {
    Finding::Mismatch {
        field: field.to_string(),
        expected: expected.into(),
        actual: actual.into(),
    }
}

/// JSON body, checked against `shape`, then typed.
fn decode_checked<M: DeserializeOwned>(response: &ApiResponse, shape: &Shape) -> Result<M, Finding> {
    let body = response.json().map_err(|e| Finding::from_error(&e))?;
    let verdict = shape.validate(body);
    if !verdict.is_valid() {
        return Err(Finding::validation(
            &shape.name,
            verdict.fields(),
            verdict.reason(),
            response.raw_text(),
        ));
    }
    serde_json::from_value(body.clone()).map_err(|e| {
        Finding::validation(
            &shape.name,
            Vec::new(),
            format!("body matches the shape but not the model: {}", e),
            response.raw_text(),
        )
    })
}

fn validate_list(response: &ApiResponse, shape: &Shape) -> Vec<Finding> {
    let body = match response.json() {
        Ok(body) => body,
        Err(e) => return vec![Finding::from_error(&e)],
    };
    let verdict = shape.validate_each(body);
    if verdict.is_valid() {
        if let Some(items) = body.as_array() {
            tracing::debug!("{} {} item(s) conform", items.len(), shape.name);
        }
        Vec::new()
    } else {
        vec![Finding::validation(
            &shape.name,
            verdict.fields(),
            verdict.reason(),
            response.raw_text(),
        )]
    }
}

fn compare_tags(payload: &Value, barrel: &Barrel) -> Vec<Finding> {
    BARREL_TAGS
        .iter()
        .filter_map(|tag| {
            let actual = match *tag {
                "qr" => &barrel.qr,
                "rfid" => &barrel.rfid,
                _ => &barrel.nfc,
            };
            let expected = payload.get(*tag).cloned().unwrap_or(Value::Null);
            (expected.as_str() != Some(actual.as_str()))
                .then(|| mismatch(tag, expected, actual.clone()))
        })
        .collect()
}

fn compare_measurement(
    measurement: &Measurement,
    barrel_id: &str,
    dirt_level: f64,
    weight: f64,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    if measurement.barrel_id != barrel_id {
        findings.push(mismatch("barrelId", barrel_id, measurement.barrel_id.clone()));
    }
    if measurement.dirt_level != dirt_level {
        findings.push(mismatch("dirtLevel", dirt_level, measurement.dirt_level));
    }
    if measurement.weight != weight {
        findings.push(mismatch("weight", weight, measurement.weight));
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expectations::{Operation, StatusClass};
    use crate::domain::model::{HttpMethod, ResponseBody};
    use crate::utils::error::{HarnessError, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers from a script, recording every request it sees.
    struct ScriptedTransport {
        answers: Mutex<VecDeque<Result<ApiResponse>>>,
        requests: Mutex<Vec<(HttpMethod, String, Option<Value>)>>,
    }

    impl ScriptedTransport {
        fn new(answers: Vec<Result<ApiResponse>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(HttpMethod, String, Option<Value>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApiTransport for ScriptedTransport {
        async fn send(
            &self,
            method: HttpMethod,
            path: &ApiPath,
            payload: Option<&Value>,
        ) -> Result<ApiResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((method, path.to_string(), payload.cloned()));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(HarnessError::ConfigError {
                        message: "script exhausted".to_string(),
                    })
                })
        }

        fn base_url(&self) -> &str {
            "http://scripted"
        }
    }

    fn json_answer(status: u16, body: Value) -> Result<ApiResponse> {
        Ok(ApiResponse {
            status,
            content_type: Some("application/json".to_string()),
            body: ResponseBody::Json(body),
        })
    }

    fn runner(answers: Vec<Result<ApiResponse>>) -> ScenarioRunner<ScriptedTransport> {
        ScenarioRunner::new(ScriptedTransport::new(answers), ExpectationTable::default())
    }

    fn barrel_body(id: &str) -> Value {
        json!({"id": id, "qr": "test_qr", "rfid": "test_rfid", "nfc": "test_nfc"})
    }

    fn scenario(name: &str) -> Scenario {
        Scenario::builtin()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_measurement_flow_uses_created_id() {
        let runner = runner(vec![
            json_answer(201, barrel_body("b-1")),
            json_answer(
                201,
                json!({"id": "m-1", "barrelId": "b-1", "dirtLevel": 0.5, "weight": 10.2}),
            ),
            json_answer(
                200,
                json!({"id": "m-1", "barrelId": "b-1", "dirtLevel": 0.5, "weight": 10.2}),
            ),
        ]);

        let report = runner.run_scenario(&scenario("get_measurement_by_id")).await;
        assert_eq!(report.verdict, ScenarioVerdict::Passed);

        let requests = runner.transport.requests();
        assert_eq!(requests[1].1, "/measurements");
        assert_eq!(
            requests[1].2,
            Some(json!({"barrelId": "b-1", "dirtLevel": 0.5, "weight": 10.2}))
        );
        assert_eq!(requests[2].1, "/measurements/m-1");
    }

    #[tokio::test]
    async fn test_failed_prerequisite_aborts_without_further_requests() {
        // id missing from the created barrel
        let runner = runner(vec![json_answer(
            201,
            json!({"qr": "test_qr", "rfid": "test_rfid", "nfc": "test_nfc"}),
        )]);

        let report = runner.run_scenario(&scenario("delete_barrel")).await;
        assert_eq!(
            report.verdict,
            ScenarioVerdict::Aborted {
                step: 0,
                skipped: 2
            }
        );
        assert_eq!(runner.transport.requests().len(), 1);
        match &report.steps[0].findings[0] {
            Finding::Validation { fields, .. } => assert_eq!(fields, &vec!["id".to_string()]),
            other => panic!("unexpected finding: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_errored() {
        let runner = runner(vec![Err(HarnessError::Timeout {
            method: "GET".to_string(),
            url: "http://scripted/barrels".to_string(),
            timeout_ms: 1000,
        })]);

        let report = runner.run_scenario(&scenario("list_barrels")).await;
        assert_eq!(report.verdict, ScenarioVerdict::Errored { step: 0 });
        assert!(matches!(
            report.steps[0].findings[0],
            Finding::Timeout { timeout_ms: 1000, .. }
        ));
        assert_eq!(report.steps[0].status, None);
    }

    #[tokio::test]
    async fn test_drift_passes_unless_strict() {
        let missing = || vec![json_answer(500, json!({"error": "boom"}))];

        let lenient = runner(missing());
        let report = lenient.run_scenario(&scenario("get_missing_barrel")).await;
        assert_eq!(report.verdict, ScenarioVerdict::Passed);
        assert_eq!(report.drift_count(), 1);
        assert_eq!(report.steps[0].path, "/barrels/nonexistent-id");

        let strict = runner(missing()).with_strict(true);
        let report = strict.run_scenario(&scenario("get_missing_barrel")).await;
        assert_eq!(report.verdict, ScenarioVerdict::Failed { step: 0 });
        assert!(matches!(
            report.steps[0].findings[0],
            Finding::ContractDrift {
                operation: Operation::GetMissingBarrel,
                actual: 500,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_success_for_missing_resource_fails() {
        let runner = runner(vec![json_answer(200, barrel_body("ghost"))]);
        let report = runner.run_scenario(&scenario("get_missing_barrel")).await;
        assert_eq!(report.verdict, ScenarioVerdict::Failed { step: 0 });
        assert!(matches!(
            report.steps[0].findings[0],
            Finding::UnexpectedStatus { actual: 200, .. }
        ));
    }

    #[tokio::test]
    async fn test_measurement_values_compared_exactly() {
        let runner = runner(vec![
            json_answer(201, barrel_body("b-1")),
            json_answer(201, json!({"barrelId": "b-1", "dirtLevel": 0.5, "weight": 10.0})),
        ]);

        let report = runner.run_scenario(&scenario("create_measurement")).await;
        assert_eq!(report.verdict, ScenarioVerdict::Failed { step: 1 });
        assert_eq!(
            report.steps[1].findings,
            vec![Finding::Mismatch {
                field: "weight".to_string(),
                expected: json!(10.2),
                actual: json!(10.0),
            }]
        );
    }

    #[tokio::test]
    async fn test_fetched_barrel_must_match_created() {
        let runner = runner(vec![
            json_answer(201, barrel_body("b-1")),
            json_answer(200, barrel_body("b-2")),
        ]);

        let report = runner.run_scenario(&scenario("get_barrel_by_id")).await;
        assert_eq!(report.verdict, ScenarioVerdict::Failed { step: 1 });
        assert_eq!(runner.transport.requests()[1].1, "/barrels/b-1");
        assert!(matches!(
            &report.steps[1].findings[0],
            Finding::Mismatch { field, .. } if field == "id"
        ));
    }

    #[tokio::test]
    async fn test_list_items_are_validated() {
        let runner = runner(vec![json_answer(
            200,
            json!([barrel_body("b-1"), {"id": "b-2", "qr": "q", "rfid": "r"}]),
        )]);

        let report = runner.run_scenario(&scenario("list_barrels")).await;
        assert_eq!(report.verdict, ScenarioVerdict::Failed { step: 0 });
        match &report.steps[0].findings[0] {
            Finding::Validation { fields, .. } => {
                assert_eq!(fields, &vec!["[1].nfc".to_string()])
            }
            other => panic!("unexpected finding: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_suite_report_counts() {
        let runner = runner(vec![
            json_answer(200, json!([])),
            json_answer(404, json!({"error": "not found"})),
        ]);
        let suite = vec![scenario("list_barrels"), scenario("get_missing_measurement")];

        let report = runner.run_suite(&suite).await;
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.passed, 2);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.base_url, "http://scripted");
    }

    #[tokio::test]
    async fn test_barrel_missing_any_tag_is_judged_by_failure_class() {
        for missing in BARREL_TAGS {
            let mut payload = json!({"qr": "test_qr", "rfid": "test_rfid", "nfc": "test_nfc"});
            payload.as_object_mut().unwrap().remove(missing);
            let scenario = Scenario::new(
                "reject_partial_barrel",
                "",
                vec![Step::CreateInvalidBarrel {
                    payload: payload.clone(),
                }],
            );
            scenario.validate().unwrap();

            let refused = runner(vec![json_answer(400, json!({"error": "bad request"}))]);
            let report = refused.run_scenario(&scenario).await;
            assert_eq!(report.verdict, ScenarioVerdict::Passed, "without {}", missing);
            let requests = refused.transport.requests();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].0, HttpMethod::Post);
            assert_eq!(requests[0].2, Some(payload));

            let accepted = runner(vec![json_answer(201, barrel_body("b-1"))]);
            let report = accepted.run_scenario(&scenario).await;
            assert_eq!(report.verdict, ScenarioVerdict::Failed { step: 0 });
            assert!(matches!(
                report.steps[0].findings[0],
                Finding::UnexpectedStatus {
                    required: StatusClass::Failure,
                    actual: 201,
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn test_server_ids_stay_one_segment() {
        let runner = runner(vec![
            json_answer(201, barrel_body("a/b")),
            json_answer(200, barrel_body("a/b")),
        ]);

        let report = runner.run_scenario(&scenario("get_barrel_by_id")).await;
        assert_eq!(report.verdict, ScenarioVerdict::Passed);
        assert_eq!(runner.transport.requests()[1].1, "/barrels/a%2Fb");
        assert_eq!(report.steps[1].path, "/barrels/a%2Fb");
    }

    #[tokio::test]
    async fn test_undecodable_error_page_still_checks_status() {
        let runner = runner(vec![Ok(ApiResponse {
            status: 404,
            content_type: Some("text/html".to_string()),
            body: ResponseBody::Undecodable {
                message: "21 byte body could not be decoded as text (tried utf-8)".to_string(),
                raw: "<h1>Nenalezeno \u{fffd}</h1>".to_string(),
            },
        })]);

        let report = runner.run_scenario(&scenario("get_missing_barrel")).await;
        assert_eq!(report.verdict, ScenarioVerdict::Passed);
        assert_eq!(report.steps[0].status, Some(404));
        assert!(report.steps[0].findings.is_empty());
    }
}
