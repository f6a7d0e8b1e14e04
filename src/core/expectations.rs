//! Status-code expectations per API operation.
//!
//! Every operation has a required class (the request must succeed, or must be
//! refused) which is a hard assertion, and a configurable set of exact codes.
//! A code inside the class but outside the set is contract drift.

use crate::domain::model::HttpMethod;
use crate::utils::error::{HarnessError, Result};
use crate::utils::validation::validate_status_code;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateBarrel,
    CreateInvalidBarrel,
    ListBarrels,
    GetBarrel,
    GetMissingBarrel,
    DeleteBarrel,
    GetDeletedBarrel,
    CreateMeasurement,
    ListMeasurements,
    GetMeasurement,
    GetMissingMeasurement,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::CreateBarrel,
        Operation::CreateInvalidBarrel,
        Operation::ListBarrels,
        Operation::GetBarrel,
        Operation::GetMissingBarrel,
        Operation::DeleteBarrel,
        Operation::GetDeletedBarrel,
        Operation::CreateMeasurement,
        Operation::ListMeasurements,
        Operation::GetMeasurement,
        Operation::GetMissingMeasurement,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateBarrel => "create_barrel",
            Operation::CreateInvalidBarrel => "create_invalid_barrel",
            Operation::ListBarrels => "list_barrels",
            Operation::GetBarrel => "get_barrel",
            Operation::GetMissingBarrel => "get_missing_barrel",
            Operation::DeleteBarrel => "delete_barrel",
            Operation::GetDeletedBarrel => "get_deleted_barrel",
            Operation::CreateMeasurement => "create_measurement",
            Operation::ListMeasurements => "list_measurements",
            Operation::GetMeasurement => "get_measurement",
            Operation::GetMissingMeasurement => "get_missing_measurement",
        }
    }

    pub fn from_name(name: &str) -> Option<Operation> {
        Operation::ALL.iter().copied().find(|op| op.name() == name)
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Operation::CreateBarrel
            | Operation::CreateInvalidBarrel
            | Operation::CreateMeasurement => HttpMethod::Post,
            Operation::DeleteBarrel => HttpMethod::Delete,
            _ => HttpMethod::Get,
        }
    }

    pub fn required_class(&self) -> StatusClass {
        match self {
            Operation::CreateInvalidBarrel
            | Operation::GetMissingBarrel
            | Operation::GetDeletedBarrel
            | Operation::GetMissingMeasurement => StatusClass::Failure,
            _ => StatusClass::Success,
        }
    }

    fn default_statuses(&self) -> &'static [u16] {
        match self {
            Operation::CreateBarrel | Operation::CreateMeasurement => &[200, 201],
            Operation::CreateInvalidBarrel => &[400, 422],
            Operation::ListBarrels
            | Operation::ListMeasurements
            | Operation::GetBarrel
            | Operation::GetMeasurement => &[200],
            Operation::DeleteBarrel => &[200, 204],
            Operation::GetMissingBarrel
            | Operation::GetDeletedBarrel
            | Operation::GetMissingMeasurement => &[404],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// 2xx
    Success,
    /// anything but 2xx
    Failure,
}

impl StatusClass {
    pub fn contains(&self, status: u16) -> bool {
        let success = (200..300).contains(&status);
        match self {
            StatusClass::Success => success,
            StatusClass::Failure => !success,
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusClass::Success => f.write_str("a success status"),
            StatusClass::Failure => f.write_str("an error status"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusExpectation {
    pub class: StatusClass,
    pub statuses: BTreeSet<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCheck {
    Expected,
    /// In the required class, not in the configured set.
    Drift,
    /// Outside the required class.
    Violation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationTable {
    entries: BTreeMap<Operation, StatusExpectation>,
}

impl Default for ExpectationTable {
    fn default() -> Self {
        let entries = Operation::ALL
            .iter()
            .map(|op| {
                (
                    *op,
                    StatusExpectation {
                        class: op.required_class(),
                        statuses: op.default_statuses().iter().copied().collect(),
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl ExpectationTable {
    /// Defaults with the given operations' status sets replaced.
    pub fn with_overrides(overrides: &HashMap<Operation, Vec<u16>>) -> Result<Self> {
        let mut table = Self::default();
        for (op, codes) in overrides {
            table.set(*op, codes)?;
        }
        Ok(table)
    }

    pub fn set(&mut self, op: Operation, codes: &[u16]) -> Result<()> {
        let field = format!("expectations.{}", op);
        if codes.is_empty() {
            return Err(HarnessError::InvalidConfigValueError {
                field,
                value: "[]".to_string(),
                reason: "At least one status code is required".to_string(),
            });
        }

        let class = op.required_class();
        for &code in codes {
            validate_status_code(&field, code)?;
            if !class.contains(code) {
                return Err(HarnessError::InvalidConfigValueError {
                    field,
                    value: code.to_string(),
                    reason: format!("{} must answer with {}", op, class),
                });
            }
        }

        self.entries.insert(
            op,
            StatusExpectation {
                class,
                statuses: codes.iter().copied().collect(),
            },
        );
        Ok(())
    }

    pub fn get(&self, op: Operation) -> &StatusExpectation {
        // every operation is seeded in Default and `set` only replaces
        &self.entries[&op]
    }

    pub fn check(&self, op: Operation, status: u16) -> StatusCheck {
        let expectation = self.get(op);
        if !expectation.class.contains(status) {
            StatusCheck::Violation
        } else if expectation.statuses.contains(&status) {
            StatusCheck::Expected
        } else {
            StatusCheck::Drift
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Operation, &StatusExpectation)> {
        self.entries.iter()
    }
}
