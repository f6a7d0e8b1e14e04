//! Declarative shape checks for decoded JSON bodies.
//!
//! A [`Shape`] lists the fields an object may carry, their primitive types and
//! whether anything else is tolerated. [`Shape::validate`] never fails: bad
//! input of any kind comes back as violations inside a [`Verdict`].

use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        };
        f.write_str(name)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StringFormat {
    Uuid,
}

impl StringFormat {
    fn accepts(&self, value: &str) -> bool {
        match self {
            StringFormat::Uuid => uuid::Uuid::parse_str(value).is_ok(),
        }
    }
}

/// Whether `id` belongs in the object being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRule {
    /// Server responses that must identify the resource.
    Required,
    /// Responses where the server may omit the id.
    Optional,
    /// Request payloads; the server assigns ids.
    Forbidden,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub min_length: Option<usize>,
    pub format: Option<StringFormat>,
}

impl FieldRule {
    pub fn required(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required: true,
            min_length: None,
            format: None,
        }
    }

    pub fn optional(name: &str, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ViolationKind {
    NotAnObject { actual: String },
    MissingField,
    WrongType { expected: FieldType, actual: String },
    TooShort { min_length: usize, actual: usize },
    BadFormat { format: StringFormat },
    UnknownField,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Dotted path of the offending field; empty for the root value.
    pub field: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = if self.field.is_empty() {
            "<root>"
        } else {
            self.field.as_str()
        };
        match &self.kind {
            ViolationKind::NotAnObject { actual } => {
                write!(f, "{}: expected an object, got {}", field, actual)
            }
            ViolationKind::MissingField => write!(f, "'{}' is a required property", field),
            ViolationKind::WrongType { expected, actual } => {
                write!(f, "{}: expected {}, got {}", field, expected, actual)
            }
            ViolationKind::TooShort { min_length, actual } => write!(
                f,
                "{}: length {} is shorter than {}",
                field, actual, min_length
            ),
            ViolationKind::BadFormat { format } => {
                write!(f, "{}: not a valid {:?} string", field, format)
            }
            ViolationKind::UnknownField => {
                write!(f, "additional property '{}' is not allowed", field)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Verdict {
    pub violations: Vec<Violation>,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Names of the fields that broke the shape, in report order, without duplicates.
    pub fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for violation in &self.violations {
            if !fields.contains(&violation.field) {
                fields.push(violation.field.clone());
            }
        }
        fields
    }

    pub fn reason(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn merge_prefixed(&mut self, prefix: &str, other: Verdict) {
        for mut violation in other.violations {
            violation.field = if violation.field.is_empty() {
                prefix.to_string()
            } else {
                format!("{}.{}", prefix, violation.field)
            };
            self.violations.push(violation);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub name: String,
    pub fields: Vec<FieldRule>,
    pub allow_unknown: bool,
    pub check_formats: bool,
}

impl Shape {
    pub fn new(name: &str, fields: Vec<FieldRule>) -> Self {
        Self {
            name: name.to_string(),
            fields,
            allow_unknown: false,
            check_formats: false,
        }
    }

    pub fn allow_unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    /// Turn format annotations into assertions.
    pub fn check_formats(mut self, check: bool) -> Self {
        self.check_formats = check;
        self
    }

    pub fn barrel(id: IdRule) -> Self {
        let mut fields = Vec::new();
        match id {
            IdRule::Required => fields.push(
                FieldRule::required("id", FieldType::String)
                    .min_length(1)
                    .format(StringFormat::Uuid),
            ),
            IdRule::Optional => fields.push(
                FieldRule::optional("id", FieldType::String)
                    .min_length(1)
                    .format(StringFormat::Uuid),
            ),
            IdRule::Forbidden => {}
        }
        for tag in ["qr", "rfid", "nfc"] {
            fields.push(FieldRule::required(tag, FieldType::String).min_length(1));
        }
        Self::new("Barrel", fields)
    }

    pub fn measurement(id: IdRule) -> Self {
        let mut fields = Vec::new();
        match id {
            IdRule::Required => fields.push(
                FieldRule::required("id", FieldType::String)
                    .min_length(1)
                    .format(StringFormat::Uuid),
            ),
            IdRule::Optional => fields.push(
                FieldRule::optional("id", FieldType::String).format(StringFormat::Uuid),
            ),
            IdRule::Forbidden => {}
        }
        fields.push(FieldRule::required("barrelId", FieldType::String).format(StringFormat::Uuid));
        fields.push(FieldRule::required("dirtLevel", FieldType::Number));
        fields.push(FieldRule::required("weight", FieldType::Number));
        Self::new("Measurement", fields)
    }

    pub fn validate(&self, value: &Value) -> Verdict {
        let mut verdict = Verdict::default();

        let Some(object) = value.as_object() else {
            verdict.violations.push(Violation {
                field: String::new(),
                kind: ViolationKind::NotAnObject {
                    actual: json_type_name(value).to_string(),
                },
            });
            return verdict;
        };

        for rule in &self.fields {
            let Some(field_value) = object.get(&rule.name) else {
                if rule.required {
                    verdict.violations.push(Violation {
                        field: rule.name.clone(),
                        kind: ViolationKind::MissingField,
                    });
                }
                continue;
            };

            if !rule.field_type.matches(field_value) {
                verdict.violations.push(Violation {
                    field: rule.name.clone(),
                    kind: ViolationKind::WrongType {
                        expected: rule.field_type,
                        actual: json_type_name(field_value).to_string(),
                    },
                });
                continue;
            }

            if let Some(text) = field_value.as_str() {
                let length = text.chars().count();
                if let Some(min_length) = rule.min_length {
                    if length < min_length {
                        verdict.violations.push(Violation {
                            field: rule.name.clone(),
                            kind: ViolationKind::TooShort {
                                min_length,
                                actual: length,
                            },
                        });
                        continue;
                    }
                }
                if let Some(format) = rule.format.filter(|_| self.check_formats) {
                    if !format.accepts(text) {
                        verdict.violations.push(Violation {
                            field: rule.name.clone(),
                            kind: ViolationKind::BadFormat { format },
                        });
                    }
                }
            }
        }

        if !self.allow_unknown {
            for key in object.keys() {
                if !self.fields.iter().any(|rule| &rule.name == key) {
                    verdict.violations.push(Violation {
                        field: key.clone(),
                        kind: ViolationKind::UnknownField,
                    });
                }
            }
        }

        verdict
    }

    /// Validates a list body element by element, prefixing paths with `[index]`.
    pub fn validate_each(&self, value: &Value) -> Verdict {
        let Some(items) = value.as_array() else {
            return Verdict {
                violations: vec![Violation {
                    field: String::new(),
                    kind: ViolationKind::WrongType {
                        expected: FieldType::Array,
                        actual: json_type_name(value).to_string(),
                    },
                }],
            };
        };

        let mut verdict = Verdict::default();
        for (index, item) in items.iter().enumerate() {
            verdict.merge_prefixed(&format!("[{}]", index), self.validate(item));
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BARREL_ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

    #[test]
    fn test_created_barrel_passes() {
        let barrel = json!({"id": BARREL_ID, "qr": "test_qr", "rfid": "test_rfid", "nfc": "test_nfc"});
        let verdict = Shape::barrel(IdRule::Required).check_formats(true).validate(&barrel);
        assert!(verdict.is_valid(), "{}", verdict.reason());
    }

    #[test]
    fn test_missing_and_unknown_fields_are_all_reported() {
        let barrel = json!({"id": "x", "qr": "q", "rfid": "r", "colour": "red"});
        let verdict = Shape::barrel(IdRule::Required).validate(&barrel);
        assert_eq!(verdict.fields(), vec!["nfc".to_string(), "colour".to_string()]);
        assert!(verdict.reason().contains("'nfc' is a required property"));
        assert!(verdict.reason().contains("additional property 'colour'"));
    }

    #[test]
    fn test_empty_tag_is_too_short() {
        let barrel = json!({"qr": "", "rfid": "r", "nfc": "n"});
        let verdict = Shape::barrel(IdRule::Forbidden).validate(&barrel);
        assert_eq!(
            verdict.violations,
            vec![Violation {
                field: "qr".to_string(),
                kind: ViolationKind::TooShort {
                    min_length: 1,
                    actual: 0
                },
            }]
        );
    }

    #[test]
    fn test_request_payload_must_not_carry_id() {
        let payload = json!({"id": BARREL_ID, "qr": "q", "rfid": "r", "nfc": "n"});
        let verdict = Shape::barrel(IdRule::Forbidden).validate(&payload);
        assert_eq!(verdict.fields(), vec!["id".to_string()]);
    }

    #[test]
    fn test_non_object_input_yields_verdict() {
        for value in [json!(null), json!("barrel"), json!(42), json!([1, 2])] {
            let verdict = Shape::barrel(IdRule::Required).validate(&value);
            assert!(!verdict.is_valid());
            assert_eq!(verdict.fields(), vec![String::new()]);
        }
    }

    #[test]
    fn test_measurement_types() {
        let ok = json!({"barrelId": BARREL_ID, "dirtLevel": 0.5, "weight": 10});
        assert!(Shape::measurement(IdRule::Optional).validate(&ok).is_valid());

        let bad = json!({"barrelId": BARREL_ID, "dirtLevel": "0.5", "weight": true});
        let verdict = Shape::measurement(IdRule::Optional).validate(&bad);
        assert_eq!(verdict.fields(), vec!["dirtLevel".to_string(), "weight".to_string()]);
    }

    #[test]
    fn test_formats_are_annotations_unless_checked() {
        let barrel = json!({"id": "not-a-uuid", "qr": "q", "rfid": "r", "nfc": "n"});
        assert!(Shape::barrel(IdRule::Required).validate(&barrel).is_valid());

        let verdict = Shape::barrel(IdRule::Required).check_formats(true).validate(&barrel);
        assert_eq!(
            verdict.violations[0].kind,
            ViolationKind::BadFormat {
                format: StringFormat::Uuid
            }
        );
    }

    #[test]
    fn test_validate_each_prefixes_index() {
        let list = json!([
            {"id": "a", "qr": "q", "rfid": "r", "nfc": "n"},
            {"id": "b", "qr": "q", "rfid": "r"}
        ]);
        let verdict = Shape::barrel(IdRule::Required).validate_each(&list);
        assert_eq!(verdict.fields(), vec!["[1].nfc".to_string()]);

        let not_a_list = Shape::barrel(IdRule::Required).validate_each(&json!({"items": []}));
        assert!(!not_a_list.is_valid());
    }
}
