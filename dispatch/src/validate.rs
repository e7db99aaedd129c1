//! Input admission. Turns raw caller input into a [`ValidatedInput`].
//!
//! The rules are data, not code: a [`ValidationPolicy`] names the maximum
//! sequence length, the element rule and whether an empty sequence is
//! admissible. Rejections carry a stable machine-readable reason.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Default maximum number of elements in one input.
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 100;

/// Declared element type of an input sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Whole numbers in the signed or unsigned 64-bit range.
    #[default]
    Integer,
    /// Any JSON number.
    Number,
    Boolean,
    String,
    /// Anything, including nested values.
    Any,
}

impl ElementKind {
    /// Whether `value` is an element of this kind.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::String => value.is_string(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::String => write!(f, "string"),
            Self::Any => write!(f, "any"),
        }
    }
}

type ElementCheck = dyn Fn(&Value) -> bool + Send + Sync;

/// Rule every element of an admissible input must satisfy.
#[derive(Clone)]
pub enum ElementRule {
    /// One of the declared [`ElementKind`]s.
    Kind(ElementKind),
    /// A caller-supplied predicate, named for diagnostics.
    Predicate {
        name: String,
        check: Arc<ElementCheck>,
    },
}

impl ElementRule {
    /// Build a predicate rule from a closure.
    pub fn predicate<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Predicate {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Whether `value` satisfies the rule.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Kind(kind) => kind.matches(value),
            Self::Predicate { check, .. } => check(value),
        }
    }
}

impl Default for ElementRule {
    fn default() -> Self {
        Self::Kind(ElementKind::default())
    }
}

impl fmt::Debug for ElementRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Predicate { name, .. } => f.debug_struct("Predicate").field("name", name).finish(),
        }
    }
}

/// Admission policy applied before any tier runs.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    /// Longest admissible sequence.
    pub max_input_length: usize,
    /// Rule each element must satisfy.
    pub element: ElementRule,
    /// Whether `[]` is admitted (tiers then decide for themselves).
    pub allow_empty: bool,
    /// Whether a raw JSON string is parsed before validation.
    pub parse_json_strings: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
            element: ElementRule::default(),
            allow_empty: true,
            parse_json_strings: true,
        }
    }
}

/// Why an input was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Input is not a sequence.
    WrongType { found: String },
    /// Sequence exceeds the configured maximum length.
    TooLong { len: usize, max: usize },
    /// An element failed the element rule.
    BadElement { index: usize },
    /// Empty sequence while `allow_empty` is off.
    EmptyInput,
    /// Raw string input was not valid JSON.
    InvalidJson { message: String },
}

impl Rejection {
    /// Stable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::WrongType { .. } => "wrong_type",
            Self::TooLong { .. } => "too_long",
            Self::BadElement { .. } => "bad_element",
            Self::EmptyInput => "empty_input",
            Self::InvalidJson { .. } => "invalid_json",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongType { found } => write!(f, "wrong_type: expected a sequence, got {}", found),
            Self::TooLong { len, max } => write!(f, "too_long: {} elements (max {})", len, max),
            Self::BadElement { index } => write!(f, "bad_element: element {} rejected", index),
            Self::EmptyInput => write!(f, "empty_input"),
            Self::InvalidJson { message } => write!(f, "invalid_json: {}", message),
        }
    }
}

impl std::error::Error for Rejection {}

/// An input sequence that passed admission (or was degraded for the
/// terminal tier after a rejection).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedInput {
    elements: Vec<Value>,
    degraded: bool,
}

impl ValidatedInput {
    /// Wrap already-admitted elements.
    pub fn new(elements: Vec<Value>) -> Self {
        Self {
            elements,
            degraded: false,
        }
    }

    /// Convenience constructor for integer inputs.
    pub fn from_integers(values: &[i64]) -> Self {
        Self::new(values.iter().map(|v| Value::from(*v)).collect())
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether this input bypassed admission after a rejection.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// All elements as `i64`, or `None` if any is not an integer.
    pub fn integers(&self) -> Option<Vec<i64>> {
        self.elements.iter().map(Value::as_i64).collect()
    }

    /// All elements as `f64`, or `None` if any is not a number.
    pub fn numbers(&self) -> Option<Vec<f64>> {
        self.elements.iter().map(Value::as_f64).collect()
    }
}

/// Applies a [`ValidationPolicy`] to raw input.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    policy: ValidationPolicy,
}

impl Validator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Admit `raw` or explain why not. Rules are checked in order:
    /// JSON parsing, sequence type, length, emptiness, elements.
    pub fn validate(&self, raw: &Value) -> Result<ValidatedInput, Rejection> {
        let normalized = self.normalize(raw)?;
        let items = match normalized {
            Value::Array(items) => items,
            other => {
                return Err(Rejection::WrongType {
                    found: type_name(&other).to_string(),
                })
            }
        };

        if items.len() > self.policy.max_input_length {
            return Err(Rejection::TooLong {
                len: items.len(),
                max: self.policy.max_input_length,
            });
        }
        if items.is_empty() && !self.policy.allow_empty {
            return Err(Rejection::EmptyInput);
        }
        if let Some(index) = items.iter().position(|v| !self.policy.element.accepts(v)) {
            return Err(Rejection::BadElement { index });
        }

        Ok(ValidatedInput::new(items))
    }

    /// Best-effort input for the terminal tier after a rejection: the raw
    /// elements when the input is a sequence, otherwise an empty one.
    pub fn degrade(&self, raw: &Value) -> ValidatedInput {
        let elements = match self.normalize(raw) {
            Ok(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        ValidatedInput {
            elements,
            degraded: true,
        }
    }

    fn normalize(&self, raw: &Value) -> Result<Value, Rejection> {
        match raw {
            Value::String(text) if self.policy.parse_json_strings => serde_json::from_str(text)
                .map_err(|e| Rejection::InvalidJson {
                    message: e.to_string(),
                }),
            other => Ok(other.clone()),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_integer_sequence() {
        let input = Validator::default().validate(&json!([1, 2, 3])).unwrap();
        assert_eq!(input.len(), 3);
        assert_eq!(input.integers(), Some(vec![1, 2, 3]));
        assert!(!input.is_degraded());
    }

    #[test]
    fn test_accepts_unsigned_beyond_i64() {
        let input = Validator::default()
            .validate(&json!([u64::MAX, 1]))
            .unwrap();
        assert_eq!(input.len(), 2);
        assert_eq!(input.integers(), None);
        assert!(input.numbers().is_some());
    }

    #[test]
    fn test_integer_kind_rejects_floats() {
        assert!(!ElementKind::Integer.matches(&json!(2.0)));
        assert!(ElementKind::Integer.matches(&json!(-7)));
    }

    #[test]
    fn test_empty_sequence_is_valid_by_default() {
        let input = Validator::default().validate(&json!([])).unwrap();
        assert!(input.is_empty());
    }

    #[test]
    fn test_empty_sequence_rejected_when_disallowed() {
        let validator = Validator::new(ValidationPolicy {
            allow_empty: false,
            ..Default::default()
        });
        assert_eq!(validator.validate(&json!([])), Err(Rejection::EmptyInput));
    }

    #[test]
    fn test_wrong_type() {
        let err = Validator::default().validate(&json!({"a": 1})).unwrap_err();
        assert_eq!(err.reason(), "wrong_type");
        assert_eq!(
            err,
            Rejection::WrongType {
                found: "object".to_string()
            }
        );
    }

    #[test]
    fn test_too_long() {
        let validator = Validator::new(ValidationPolicy {
            max_input_length: 2,
            ..Default::default()
        });
        let err = validator.validate(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err, Rejection::TooLong { len: 3, max: 2 });
    }

    #[test]
    fn test_first_bad_element_reported() {
        let err = Validator::default()
            .validate(&json!([1, "two", 3.5]))
            .unwrap_err();
        assert_eq!(err, Rejection::BadElement { index: 1 });
        assert_eq!(err.reason(), "bad_element");
    }

    #[test]
    fn test_float_is_not_integer() {
        let err = Validator::default().validate(&json!([1, 2.5])).unwrap_err();
        assert_eq!(err, Rejection::BadElement { index: 1 });
    }

    #[test]
    fn test_number_kind_accepts_floats() {
        let validator = Validator::new(ValidationPolicy {
            element: ElementRule::Kind(ElementKind::Number),
            ..Default::default()
        });
        let input = validator.validate(&json!([1, 2.5])).unwrap();
        assert_eq!(input.numbers(), Some(vec![1.0, 2.5]));
        assert_eq!(input.integers(), None);
    }

    #[test]
    fn test_custom_predicate() {
        let validator = Validator::new(ValidationPolicy {
            element: ElementRule::predicate("non_negative", |v| {
                v.as_i64().is_some_and(|n| n >= 0)
            }),
            ..Default::default()
        });
        assert!(validator.validate(&json!([0, 4])).is_ok());
        assert_eq!(
            validator.validate(&json!([3, -1])),
            Err(Rejection::BadElement { index: 1 })
        );
    }

    #[test]
    fn test_json_string_is_parsed() {
        let input = Validator::default().validate(&json!("[4, 5]")).unwrap();
        assert_eq!(input.integers(), Some(vec![4, 5]));
    }

    #[test]
    fn test_invalid_json_string() {
        let err = Validator::default().validate(&json!("[4, 5")).unwrap_err();
        assert_eq!(err.reason(), "invalid_json");
    }

    #[test]
    fn test_json_string_untouched_when_parsing_disabled() {
        let validator = Validator::new(ValidationPolicy {
            parse_json_strings: false,
            ..Default::default()
        });
        let err = validator.validate(&json!("[4, 5]")).unwrap_err();
        assert_eq!(err.reason(), "wrong_type");
    }

    #[test]
    fn test_degrade_keeps_sequence_elements() {
        let validator = Validator::default();
        let degraded = validator.degrade(&json!([1, "x"]));
        assert!(degraded.is_degraded());
        assert_eq!(degraded.len(), 2);

        let degraded = validator.degrade(&json!("not json"));
        assert!(degraded.is_empty());
    }

    #[test]
    fn test_rejection_display() {
        assert_eq!(
            Rejection::TooLong { len: 101, max: 100 }.to_string(),
            "too_long: 101 elements (max 100)"
        );
    }
}
