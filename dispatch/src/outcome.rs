//! Outcome of invoking a single tier.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reason recorded when a tier produces the "no result" sentinel.
pub const NO_RESULT: &str = "no_result";

/// Result of one tier invocation.
///
/// Expected failures ("this tier cannot serve this input") are values of
/// this type, never panics or errors. A `Success` carrying `null` is the
/// no-result sentinel and is treated exactly like a `Failure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
    Failure {
        reason: String,
    },
}

impl Outcome {
    /// Success without a computed confidence.
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success {
            value: value.into(),
            confidence: None,
        }
    }

    /// Success with a per-call confidence.
    pub fn scored(value: impl Into<Value>, confidence: f64) -> Self {
        Self::Success {
            value: value.into(),
            confidence: Some(confidence),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    /// The no-result sentinel.
    pub fn no_result() -> Self {
        Self::failure(NO_RESULT)
    }

    /// `Some` becomes a success, `None` the no-result sentinel.
    pub fn from_option<T: Into<Value>>(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::success(v),
            None => Self::no_result(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Fold the `null` sentinel into a failure and clamp confidence to [0, 1].
    pub fn normalize(self) -> Self {
        match self {
            Self::Success {
                value: Value::Null, ..
            } => Self::no_result(),
            Self::Success { value, confidence } => Self::Success {
                value,
                confidence: confidence.map(|c| if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) }),
            },
            failure => failure,
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome
where
    T: Into<Value>,
    E: std::fmt::Display,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}
