//! The externally visible record of one `infer` call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A tier that was invoked and rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierError {
    pub tier: String,
    pub reason: String,
}

impl TierError {
    pub fn new(tier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            reason: reason.into(),
        }
    }
}

/// What happened to a tier during one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Succeeded,
    Failed,
    /// Precondition unmet; not invoked.
    Skipped,
}

/// One tier considered during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAttempt {
    pub tier: String,
    pub status: AttemptStatus,
    /// Wall time spent in the strategy; zero for skipped tiers.
    pub elapsed_micros: u64,
}

/// Result of one `infer` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub call_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    /// Tier that produced `value`; `None` when every tier failed.
    pub tier_used: Option<String>,
    pub value: Option<Value>,
    pub confidence: Option<f64>,
    /// Whether `confidence` reaches the terminal tier's minimum.
    pub meets_threshold: bool,
    /// Tiers invoked and rejected before the winning tier, in order.
    pub errors: Vec<TierError>,
    pub attempts: Vec<TierAttempt>,
    /// Set when the input was rejected and the call degraded to the
    /// terminal tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
    #[serde(default)]
    pub forced: bool,
}

impl DispatchResult {
    pub(crate) fn resolved(
        call_id: Uuid,
        tier: &str,
        value: Value,
        confidence: Option<f64>,
        meets_threshold: bool,
    ) -> Self {
        Self {
            call_id,
            timestamp: Utc::now(),
            success: true,
            tier_used: Some(tier.to_string()),
            value: Some(value),
            confidence,
            meets_threshold,
            errors: Vec::new(),
            attempts: Vec::new(),
            rejection: None,
            forced: false,
        }
    }

    pub(crate) fn exhausted(call_id: Uuid) -> Self {
        Self {
            call_id,
            timestamp: Utc::now(),
            success: false,
            tier_used: None,
            value: None,
            confidence: None,
            meets_threshold: false,
            errors: Vec::new(),
            attempts: Vec::new(),
            rejection: None,
            forced: false,
        }
    }

    pub(crate) fn with_trace(mut self, errors: Vec<TierError>, attempts: Vec<TierAttempt>) -> Self {
        self.errors = errors;
        self.attempts = attempts;
        self
    }

    /// Whether any tier failed, the input was rejected, or nothing resolved.
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty() || self.rejection.is_some() || !self.success
    }

    /// Reasons recorded for `tier`, if it failed during this call.
    pub fn error_for(&self, tier: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.tier == tier)
            .map(|e| e.reason.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_roundtrip() {
        let result = DispatchResult::resolved(Uuid::new_v4(), "primary", json!(21), Some(0.5), true)
            .with_trace(vec![TierError::new("turbo", "boom")], Vec::new());
        let text = serde_json::to_string(&result).unwrap();
        let parsed: DispatchResult = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, result);
        assert!(!text.contains("rejection"));
    }

    #[test]
    fn test_error_for() {
        let result = DispatchResult::exhausted(Uuid::new_v4())
            .with_trace(vec![TierError::new("a", "x"), TierError::new("b", "y")], Vec::new());
        assert_eq!(result.error_for("b"), Some("y"));
        assert_eq!(result.error_for("c"), None);
        assert!(result.is_degraded());
    }
}
