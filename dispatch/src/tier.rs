//! A tier is a named strategy with an optional length precondition and
//! confidence reporting.

use crate::outcome::Outcome;
use crate::validate::ValidatedInput;
use std::fmt;
use std::sync::Arc;

/// A prediction strategy.
///
/// Implementations must be pure and return promptly. They signal "cannot
/// serve this input" through [`Outcome::Failure`] (or the `null` sentinel),
/// never by panicking.
pub trait Strategy: Send + Sync {
    fn predict(&self, input: &ValidatedInput) -> Outcome;
}

impl<F> Strategy for F
where
    F: Fn(&ValidatedInput) -> Outcome + Send + Sync,
{
    fn predict(&self, input: &ValidatedInput) -> Outcome {
        self(input)
    }
}

/// One rung of the escalation ladder.
#[derive(Clone)]
pub struct Tier {
    name: String,
    strategy: Arc<dyn Strategy>,
    min_admissible_length: Option<usize>,
    confidence: Option<f64>,
    min_confidence: f64,
}

impl Tier {
    /// Create a tier with no precondition and no static confidence.
    pub fn new(name: impl Into<String>, strategy: impl Strategy + 'static) -> Self {
        Self::from_arc(name, Arc::new(strategy))
    }

    /// Create a tier around a shared strategy.
    pub fn from_arc(name: impl Into<String>, strategy: Arc<dyn Strategy>) -> Self {
        Self {
            name: name.into(),
            strategy,
            min_admissible_length: None,
            confidence: None,
            min_confidence: 0.0,
        }
    }

    /// Skip this tier for inputs shorter than `len`.
    pub fn with_min_length(mut self, len: usize) -> Self {
        self.min_admissible_length = Some(len);
        self
    }

    /// Static confidence reported when the strategy computes none.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Minimum acceptable confidence for results from this tier.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_admissible_length(&self) -> Option<usize> {
        self.min_admissible_length
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Whether the tier has a precondition that can exclude some input.
    pub fn has_precondition(&self) -> bool {
        self.min_admissible_length.is_some_and(|n| n > 0)
    }

    /// Whether the precondition admits `input`.
    pub fn admits(&self, input: &ValidatedInput) -> bool {
        self.min_admissible_length
            .map_or(true, |min| input.len() >= min)
    }

    /// Run the strategy, fold sentinels into failures and fill in the
    /// static confidence. Ignores the precondition.
    pub fn invoke(&self, input: &ValidatedInput) -> Outcome {
        match self.strategy.predict(input) {
            Outcome::Success {
                value,
                confidence: None,
            } => Outcome::Success {
                value,
                confidence: self.confidence,
            },
            other => other,
        }
        .normalize()
    }
}

impl fmt::Debug for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tier")
            .field("name", &self.name)
            .field("min_admissible_length", &self.min_admissible_length)
            .field("confidence", &self.confidence)
            .field("min_confidence", &self.min_confidence)
            .finish_non_exhaustive()
    }
}
