use crate::core::expectations::{Operation, StatusClass};
use crate::domain::model::HttpMethod;
use crate::utils::error::HarnessError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;

/// Longest raw body kept in a finding.
const RAW_LIMIT: usize = 2048;

fn clip(raw: String) -> String {
    if raw.len() <= RAW_LIMIT {
        return raw;
    }
    let mut end = RAW_LIMIT;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}… ({} bytes total)", &raw[..end], raw.len())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    Transport {
        message: String,
    },
    Timeout {
        message: String,
        timeout_ms: u64,
    },
    Decode {
        message: String,
        raw: Option<String>,
    },
    UnexpectedStatus {
        required: StatusClass,
        expected: Vec<u16>,
        actual: u16,
        raw: String,
    },
    ContractDrift {
        operation: Operation,
        expected: Vec<u16>,
        actual: u16,
    },
    Validation {
        shape: String,
        fields: Vec<String>,
        reason: String,
        raw: String,
    },
    Mismatch {
        field: String,
        expected: Value,
        actual: Value,
    },
    /// A step could not be issued because an earlier one left nothing to use.
    Precondition {
        message: String,
    },
}

impl Finding {
    pub fn from_error(error: &HarnessError) -> Self {
        match error {
            HarnessError::Timeout { timeout_ms, .. } => Finding::Timeout {
                message: error.to_string(),
                timeout_ms: *timeout_ms,
            },
            HarnessError::Decode { message, raw } => Finding::Decode {
                message: message.clone(),
                raw: raw.clone().map(clip),
            },
            other => Finding::Transport {
                message: other.to_string(),
            },
        }
    }

    pub fn unexpected_status(
        required: StatusClass,
        expected: Vec<u16>,
        actual: u16,
        raw: String,
    ) -> Self {
        Finding::UnexpectedStatus {
            required,
            expected,
            actual,
            raw: clip(raw),
        }
    }

    pub fn validation(shape: &str, fields: Vec<String>, reason: String, raw: String) -> Self {
        Finding::Validation {
            shape: shape.to_string(),
            fields,
            reason,
            raw: clip(raw),
        }
    }

    /// Harness-side trouble rather than an API contract failure.
    pub fn is_harness_error(&self) -> bool {
        matches!(
            self,
            Finding::Transport { .. } | Finding::Timeout { .. } | Finding::Decode { .. }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            Finding::Transport { message } => format!("transport failure: {}", message),
            Finding::Timeout { message, .. } => format!("timeout: {}", message),
            Finding::Decode { message, raw } => match raw {
                Some(raw) => format!("decode failure: {} (raw: {})", message, raw),
                None => format!("decode failure: {}", message),
            },
            Finding::UnexpectedStatus {
                required,
                expected,
                actual,
                raw,
            } => format!(
                "expected {} {:?}, got {}; response: {}",
                required, expected, actual, raw
            ),
            Finding::ContractDrift {
                operation,
                expected,
                actual,
            } => format!(
                "contract drift: {} answered {}, configured {:?}",
                operation, actual, expected
            ),
            Finding::Validation {
                shape,
                fields,
                reason,
                raw,
            } => format!(
                "{} shape violated by [{}]: {}; response: {}",
                shape,
                fields.join(", "),
                reason,
                raw
            ),
            Finding::Mismatch {
                field,
                expected,
                actual,
            } => format!("{}: expected {}, got {}", field, expected, actual),
            Finding::Precondition { message } => format!("precondition failed: {}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepVerdict {
    Passed,
    /// Passed, with a status outside the configured set.
    Drift,
    Failed,
    Errored,
}

impl StepVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, StepVerdict::Passed | StepVerdict::Drift)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub operation: Operation,
    pub method: HttpMethod,
    pub path: String,
    pub status: Option<u16>,
    pub verdict: StepVerdict,
    pub findings: Vec<Finding>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ScenarioVerdict {
    Passed,
    Failed { step: usize },
    /// A prerequisite step did not pass; the rest were skipped.
    Aborted { step: usize, skipped: usize },
    Errored { step: usize },
}

impl ScenarioVerdict {
    pub fn label(&self) -> &'static str {
        match self {
            ScenarioVerdict::Passed => "PASS",
            ScenarioVerdict::Failed { .. } => "FAIL",
            ScenarioVerdict::Aborted { .. } => "ABORT",
            ScenarioVerdict::Errored { .. } => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub verdict: ScenarioVerdict,
    pub steps: Vec<StepRecord>,
}

impl ScenarioReport {
    /// First non-passing step decides the verdict.
    pub fn conclude(name: &str, steps: Vec<StepRecord>, total_steps: usize) -> Self {
        let verdict = match steps.iter().find(|s| !s.verdict.is_pass()) {
            None => ScenarioVerdict::Passed,
            Some(step) => {
                let skipped = total_steps.saturating_sub(step.index + 1);
                match step.verdict {
                    StepVerdict::Errored => ScenarioVerdict::Errored { step: step.index },
                    _ if skipped > 0 => ScenarioVerdict::Aborted {
                        step: step.index,
                        skipped,
                    },
                    _ => ScenarioVerdict::Failed { step: step.index },
                }
            }
        };
        Self {
            name: name.to_string(),
            verdict,
            steps,
        }
    }

    pub fn drift_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.verdict == StepVerdict::Drift)
            .count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub aborted: usize,
    pub errored: usize,
    pub drift: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub base_url: String,
    pub strict: bool,
    pub summary: Summary,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn new(
        base_url: &str,
        strict: bool,
        started_at: DateTime<Utc>,
        scenarios: Vec<ScenarioReport>,
    ) -> Self {
        let mut summary = Summary {
            total: scenarios.len(),
            ..Summary::default()
        };
        for scenario in &scenarios {
            match scenario.verdict {
                ScenarioVerdict::Passed => summary.passed += 1,
                ScenarioVerdict::Failed { .. } => summary.failed += 1,
                ScenarioVerdict::Aborted { .. } => summary.aborted += 1,
                ScenarioVerdict::Errored { .. } => summary.errored += 1,
            }
            summary.drift += scenario.drift_count();
        }

        Self {
            started_at,
            finished_at: Utc::now(),
            base_url: base_url.to_string(),
            strict,
            summary,
            scenarios,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.summary.passed == self.summary.total
    }

    /// 0 all passed, 1 contract failures, 2 harness errors only.
    pub fn exit_code(&self) -> i32 {
        if self.summary.failed + self.summary.aborted > 0 {
            1
        } else if self.summary.errored > 0 {
            2
        } else {
            0
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "OilAPI conformance run against {}", self.base_url);

        for scenario in &self.scenarios {
            let _ = writeln!(out, "[{}] {}", scenario.verdict.label(), scenario.name);
            for step in &scenario.steps {
                let status = step
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "---".to_string());
                let _ = writeln!(
                    out,
                    "    {:>2}. {:<6} {:<28} {} {:?}",
                    step.index + 1,
                    step.method,
                    step.path,
                    status,
                    step.verdict
                );
                for finding in &step.findings {
                    let _ = writeln!(out, "        - {}", finding.describe());
                }
            }
            if let ScenarioVerdict::Aborted { step, skipped } = scenario.verdict {
                let _ = writeln!(
                    out,
                    "        precondition at step {} failed; {} step(s) skipped",
                    step + 1,
                    skipped
                );
            }
        }

        let s = &self.summary;
        let _ = writeln!(
            out,
            "{} scenario(s): {} passed, {} failed, {} aborted, {} errored; {} contract drift finding(s){}",
            s.total,
            s.passed,
            s.failed,
            s.aborted,
            s.errored,
            s.drift,
            if self.strict { " (strict)" } else { "" }
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize, verdict: StepVerdict) -> StepRecord {
        StepRecord {
            index,
            operation: Operation::CreateBarrel,
            method: HttpMethod::Post,
            path: "/barrels".to_string(),
            status: Some(201),
            verdict,
            findings: Vec::new(),
            duration_ms: 3,
        }
    }

    #[test]
    fn test_conclude_verdicts() {
        let passed = ScenarioReport::conclude("a", vec![step(0, StepVerdict::Drift)], 1);
        assert_eq!(passed.verdict, ScenarioVerdict::Passed);
        assert_eq!(passed.drift_count(), 1);

        let failed = ScenarioReport::conclude(
            "b",
            vec![step(0, StepVerdict::Passed), step(1, StepVerdict::Failed)],
            2,
        );
        assert_eq!(failed.verdict, ScenarioVerdict::Failed { step: 1 });

        let aborted = ScenarioReport::conclude("c", vec![step(0, StepVerdict::Failed)], 3);
        assert_eq!(
            aborted.verdict,
            ScenarioVerdict::Aborted {
                step: 0,
                skipped: 2
            }
        );

        let errored = ScenarioReport::conclude("d", vec![step(0, StepVerdict::Errored)], 3);
        assert_eq!(errored.verdict, ScenarioVerdict::Errored { step: 0 });
    }

    #[test]
    fn test_summary_and_exit_code() {
        let report = SuiteReport::new(
            "http://localhost",
            false,
            Utc::now(),
            vec![
                ScenarioReport::conclude("a", vec![step(0, StepVerdict::Passed)], 1),
                ScenarioReport::conclude("b", vec![step(0, StepVerdict::Errored)], 1),
            ],
        );
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.errored, 1);
        assert_eq!(report.exit_code(), 2);
        assert!(report.render().contains("[ERROR] b"));

        let json: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["scenarios"][1]["verdict"]["verdict"], "errored");
    }

    #[test]
    fn test_raw_bodies_are_clipped() {
        let finding = Finding::unexpected_status(StatusClass::Success, vec![200], 500, "é".repeat(3000));
        match finding {
            Finding::UnexpectedStatus { raw, .. } => assert!(raw.contains("bytes total")),
            other => panic!("unexpected finding: {:?}", other),
        }
    }
}
