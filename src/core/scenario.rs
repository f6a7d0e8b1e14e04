use crate::core::expectations::Operation;
use crate::core::schema::{IdRule, Shape};
use crate::domain::model::NewBarrel;
use crate::utils::error::{HarnessError, Result};
use crate::utils::validation::validate_non_empty_string;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub const MISSING_ID: &str = "nonexistent-id";

fn default_barrel_payload() -> Value {
    serde_json::to_value(NewBarrel::default()).unwrap_or(Value::Null)
}

fn default_invalid_barrel_payload() -> Value {
    serde_json::json!({"qr": "test_qr", "rfid": "test_rfid"})
}

fn default_missing_id() -> String {
    MISSING_ID.to_string()
}

/// One API call plus the assertions made on its answer.
///
/// `bind` names store a created resource in the scenario context; `barrel` and
/// `measurement` names read one back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    CreateBarrel {
        #[serde(default = "default_barrel_payload")]
        payload: Value,
        #[serde(default)]
        bind: Option<String>,
    },
    CreateInvalidBarrel {
        #[serde(default = "default_invalid_barrel_payload")]
        payload: Value,
    },
    ListBarrels,
    GetBarrel {
        barrel: String,
    },
    GetMissingBarrel {
        #[serde(default = "default_missing_id")]
        id: String,
    },
    DeleteBarrel {
        barrel: String,
    },
    GetDeletedBarrel {
        barrel: String,
    },
    CreateMeasurement {
        barrel: String,
        dirt_level: f64,
        weight: f64,
        #[serde(default)]
        bind: Option<String>,
    },
    ListMeasurements,
    GetMeasurement {
        measurement: String,
    },
    GetMissingMeasurement {
        #[serde(default = "default_missing_id")]
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Barrel,
    Measurement,
}

impl Step {
    pub fn operation(&self) -> Operation {
        match self {
            Step::CreateBarrel { .. } => Operation::CreateBarrel,
            Step::CreateInvalidBarrel { .. } => Operation::CreateInvalidBarrel,
            Step::ListBarrels => Operation::ListBarrels,
            Step::GetBarrel { .. } => Operation::GetBarrel,
            Step::GetMissingBarrel { .. } => Operation::GetMissingBarrel,
            Step::DeleteBarrel { .. } => Operation::DeleteBarrel,
            Step::GetDeletedBarrel { .. } => Operation::GetDeletedBarrel,
            Step::CreateMeasurement { .. } => Operation::CreateMeasurement,
            Step::ListMeasurements => Operation::ListMeasurements,
            Step::GetMeasurement { .. } => Operation::GetMeasurement,
            Step::GetMissingMeasurement { .. } => Operation::GetMissingMeasurement,
        }
    }

    /// The binding this step reads, if any.
    pub fn consumes(&self) -> Option<(&str, BindingKind)> {
        match self {
            Step::GetBarrel { barrel }
            | Step::DeleteBarrel { barrel }
            | Step::GetDeletedBarrel { barrel }
            | Step::CreateMeasurement { barrel, .. } => Some((barrel.as_str(), BindingKind::Barrel)),
            Step::GetMeasurement { measurement } => {
                Some((measurement.as_str(), BindingKind::Measurement))
            }
            _ => None,
        }
    }

    /// The binding this step writes, if any.
    pub fn binds(&self) -> Option<(&str, BindingKind)> {
        match self {
            Step::CreateBarrel {
                bind: Some(name), ..
            } => Some((name.as_str(), BindingKind::Barrel)),
            Step::CreateMeasurement {
                bind: Some(name), ..
            } => Some((name.as_str(), BindingKind::Measurement)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: &str, description: &str, steps: Vec<Step>) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            steps,
        }
    }

    /// Static checks: bindings are defined before use and payloads are what
    /// the step claims they are.
    pub fn validate(&self) -> Result<()> {
        validate_non_empty_string("scenarios.name", &self.name)?;

        if self.steps.is_empty() {
            return Err(HarnessError::ConfigValidationError {
                field: format!("scenarios.{}.steps", self.name),
                message: "Scenario has no steps".to_string(),
            });
        }

        let mut bound: HashMap<&str, BindingKind> = HashMap::new();
        for (index, step) in self.steps.iter().enumerate() {
            let field = format!("scenarios.{}.steps[{}]", self.name, index);

            if let Some((name, kind)) = step.consumes() {
                match bound.get(name) {
                    Some(found) if *found == kind => {}
                    Some(found) => {
                        return Err(HarnessError::ConfigValidationError {
                            field,
                            message: format!(
                                "'{}' is bound to a {:?}, expected a {:?}",
                                name, found, kind
                            ),
                        })
                    }
                    None => {
                        return Err(HarnessError::ConfigValidationError {
                            field,
                            message: format!("'{}' is used before any step binds it", name),
                        })
                    }
                }
            }

            match step {
                Step::CreateBarrel { payload, .. } => {
                    let verdict = Shape::barrel(IdRule::Forbidden).validate(payload);
                    if !verdict.is_valid() {
                        return Err(HarnessError::ConfigValidationError {
                            field,
                            message: format!("Barrel payload is invalid: {}", verdict.reason()),
                        });
                    }
                }
                Step::CreateInvalidBarrel { payload } => {
                    if Shape::barrel(IdRule::Forbidden).validate(payload).is_valid() {
                        return Err(HarnessError::ConfigValidationError {
                            field,
                            message: "Payload is a valid barrel; nothing to reject".to_string(),
                        });
                    }
                }
                Step::GetMissingBarrel { id } | Step::GetMissingMeasurement { id } => {
                    validate_non_empty_string(&format!("{}.id", field), id)?;
                }
                Step::CreateMeasurement {
                    dirt_level, weight, ..
                } if !dirt_level.is_finite() || !weight.is_finite() => {
                    return Err(HarnessError::ConfigValidationError {
                        field,
                        message: "dirt_level and weight must be finite numbers".to_string(),
                    });
                }
                _ => {}
            }

            if let Some((name, kind)) = step.binds() {
                validate_non_empty_string(&format!("{}.bind", field), name)?;
                bound.insert(name, kind);
            }
        }

        Ok(())
    }

    /// The consolidated scenario table exercised against every deployment.
    pub fn builtin() -> Vec<Scenario> {
        let create_barrel = |bind: Option<&str>| Step::CreateBarrel {
            payload: default_barrel_payload(),
            bind: bind.map(str::to_string),
        };
        let barrel = || "barrel".to_string();

        vec![
            Scenario::new(
                "create_barrel_valid",
                "Create a barrel and validate the returned shape",
                vec![create_barrel(None)],
            ),
            Scenario::new(
                "reject_invalid_barrel",
                "A barrel without nfc must be refused",
                vec![Step::CreateInvalidBarrel {
                    payload: default_invalid_barrel_payload(),
                }],
            ),
            Scenario::new(
                "list_barrels",
                "Every listed barrel matches the shape",
                vec![Step::ListBarrels],
            ),
            Scenario::new(
                "get_barrel_by_id",
                "A created barrel can be fetched by its id",
                vec![
                    create_barrel(Some("barrel")),
                    Step::GetBarrel { barrel: barrel() },
                ],
            ),
            Scenario::new(
                "get_missing_barrel",
                "Unknown barrel ids are reported as errors",
                vec![Step::GetMissingBarrel {
                    id: default_missing_id(),
                }],
            ),
            Scenario::new(
                "delete_barrel",
                "A deleted barrel is gone",
                vec![
                    create_barrel(Some("barrel")),
                    Step::DeleteBarrel { barrel: barrel() },
                    Step::GetDeletedBarrel { barrel: barrel() },
                ],
            ),
            Scenario::new(
                "create_measurement",
                "A measurement for a fresh barrel round-trips its values",
                vec![
                    create_barrel(Some("barrel")),
                    Step::CreateMeasurement {
                        barrel: barrel(),
                        dirt_level: 0.5,
                        weight: 10.2,
                        bind: None,
                    },
                ],
            ),
            Scenario::new(
                "list_measurements",
                "Every listed measurement matches the shape",
                vec![Step::ListMeasurements],
            ),
            Scenario::new(
                "get_measurement_by_id",
                "A created measurement can be fetched by its id",
                vec![
                    create_barrel(Some("barrel")),
                    Step::CreateMeasurement {
                        barrel: barrel(),
                        dirt_level: 0.5,
                        weight: 10.2,
                        bind: Some("measurement".to_string()),
                    },
                    Step::GetMeasurement {
                        measurement: "measurement".to_string(),
                    },
                ],
            ),
            Scenario::new(
                "get_missing_measurement",
                "Unknown measurement ids are reported as errors",
                vec![Step::GetMissingMeasurement {
                    id: default_missing_id(),
                }],
            ),
        ]
    }
}

/// Checks a whole suite: each scenario on its own, plus unique names.
pub fn validate_suite(scenarios: &[Scenario]) -> Result<()> {
    let mut names = HashSet::new();
    for scenario in scenarios {
        scenario.validate()?;
        if !names.insert(scenario.name.as_str()) {
            return Err(HarnessError::ConfigValidationError {
                field: "scenarios".to_string(),
                message: format!("Duplicate scenario name '{}'", scenario.name),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedBarrel {
    pub id: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedMeasurement {
    pub id: String,
    pub barrel_id: String,
    pub dirt_level: f64,
    pub weight: f64,
}

/// Identifiers created while one scenario runs. Built fresh per scenario.
#[derive(Debug, Default)]
pub struct ScenarioContext {
    barrels: HashMap<String, CreatedBarrel>,
    measurements: HashMap<String, CreatedMeasurement>,
}

impl ScenarioContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_barrel(&mut self, name: &str, barrel: CreatedBarrel) {
        self.barrels.insert(name.to_string(), barrel);
    }

    pub fn barrel(&self, name: &str) -> Option<&CreatedBarrel> {
        self.barrels.get(name)
    }

    pub fn bind_measurement(&mut self, name: &str, measurement: CreatedMeasurement) {
        self.measurements.insert(name.to_string(), measurement);
    }

    pub fn measurement(&self, name: &str) -> Option<&CreatedMeasurement> {
        self.measurements.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_suite_is_valid() {
        let suite = Scenario::builtin();
        assert_eq!(suite.len(), 10);
        validate_suite(&suite).unwrap();
    }

    #[test]
    fn test_binding_used_before_bound() {
        let scenario = Scenario::new(
            "orphan",
            "",
            vec![Step::GetBarrel {
                barrel: "nope".to_string(),
            }],
        );
        let err = scenario.validate().unwrap_err();
        assert!(err.to_string().contains("used before any step binds it"));
    }

    #[test]
    fn test_binding_kind_mismatch() {
        let scenario = Scenario::new(
            "mixed",
            "",
            vec![
                Step::CreateBarrel {
                    payload: default_barrel_payload(),
                    bind: Some("thing".to_string()),
                },
                Step::GetMeasurement {
                    measurement: "thing".to_string(),
                },
            ],
        );
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_payload_checks() {
        let bad_create = Scenario::new(
            "bad_create",
            "",
            vec![Step::CreateBarrel {
                payload: json!({"qr": "q"}),
                bind: None,
            }],
        );
        assert!(bad_create.validate().is_err());

        let valid_reject = Scenario::new(
            "valid_reject",
            "",
            vec![Step::CreateInvalidBarrel {
                payload: default_barrel_payload(),
            }],
        );
        assert!(valid_reject.validate().is_err());
    }

    #[test]
    fn test_blank_missing_ids_rejected() {
        for id in ["", "   "] {
            let barrel = Scenario::new(
                "blank_barrel_id",
                "",
                vec![Step::GetMissingBarrel { id: id.to_string() }],
            );
            assert!(barrel.validate().is_err());

            let measurement = Scenario::new(
                "blank_measurement_id",
                "",
                vec![Step::GetMissingMeasurement { id: id.to_string() }],
            );
            assert!(measurement.validate().is_err());
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let one = Scenario::new("dup", "", vec![Step::ListBarrels]);
        assert!(validate_suite(&[one.clone(), one]).is_err());
    }

    #[test]
    fn test_steps_deserialize_with_defaults() {
        let steps: Vec<Step> = serde_json::from_value(json!([
            {"action": "create_barrel", "bind": "b"},
            {"action": "list_barrels"},
            {"action": "get_missing_barrel"},
            {"action": "create_measurement", "barrel": "b", "dirt_level": 0.25, "weight": 3}
        ]))
        .unwrap();

        assert_eq!(
            steps[0],
            Step::CreateBarrel {
                payload: json!({"qr": "test_qr", "rfid": "test_rfid", "nfc": "test_nfc"}),
                bind: Some("b".to_string()),
            }
        );
        assert_eq!(steps[1], Step::ListBarrels);
        assert_eq!(
            steps[2],
            Step::GetMissingBarrel {
                id: MISSING_ID.to_string()
            }
        );
        assert_eq!(steps[3].consumes(), Some(("b", BindingKind::Barrel)));
    }
}
