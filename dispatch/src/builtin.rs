//! Built-in strategies.
//!
//! Small deterministic arithmetic predictors, enough to describe a complete
//! dispatcher in a config file:
//!
//! ```text
//! kind      | value                              | fails on
//! ----------|------------------------------------|-------------------------------
//! sum       | Σx                                 | empty, < min_len, negatives*
//! mean      | Σx / n                             | empty
//! count     | n                                  | never
//! summary   | {sum, mean, count, max, min}       | < min_len (default 2)
//! basic     | {sum, count}                       | empty
//! scale     | [x · factor]                       | non-numeric
//! offset    | [x + delta]                        | non-numeric
//! ```
//!
//! `*` only with `reject_negative = true`.

use crate::outcome::Outcome;
use crate::tier::Strategy;
use crate::validate::ValidatedInput;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Confidence reported by [`BuiltinStrategy::Basic`].
pub const BASIC_CONFIDENCE: f64 = 0.65;

fn default_summary_min_len() -> usize {
    2
}

/// Declarative built-in strategy, tagged by `kind` in config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuiltinStrategy {
    Sum {
        #[serde(default)]
        min_len: usize,
        #[serde(default)]
        reject_negative: bool,
    },
    Mean,
    Count,
    Summary {
        #[serde(default = "default_summary_min_len")]
        min_len: usize,
    },
    Basic,
    Scale {
        factor: f64,
    },
    Offset {
        delta: f64,
    },
}

impl BuiltinStrategy {
    /// `sum` with no extra requirements.
    pub fn sum() -> Self {
        Self::Sum {
            min_len: 0,
            reject_negative: false,
        }
    }

    /// `summary` with the default two-element minimum.
    pub fn summary() -> Self {
        Self::Summary {
            min_len: default_summary_min_len(),
        }
    }

    /// Whether this strategy succeeds for every admissible input.
    pub fn is_total(&self) -> bool {
        matches!(self, Self::Count)
    }

    /// The `kind` tag used in config files.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sum { .. } => "sum",
            Self::Mean => "mean",
            Self::Count => "count",
            Self::Summary { .. } => "summary",
            Self::Basic => "basic",
            Self::Scale { .. } => "scale",
            Self::Offset { .. } => "offset",
        }
    }
}

impl Strategy for BuiltinStrategy {
    fn predict(&self, input: &ValidatedInput) -> Outcome {
        match self {
            Self::Sum {
                min_len,
                reject_negative,
            } => predict_sum(input, *min_len, *reject_negative),
            Self::Mean => predict_mean(input),
            Self::Count => Outcome::success(input.len()),
            Self::Summary { min_len } => predict_summary(input, *min_len),
            Self::Basic => predict_basic(input),
            Self::Scale { factor } => map_elements(input, |x| x * factor, |x| {
                integral(*factor).and_then(|f| x.checked_mul(f))
            }),
            Self::Offset { delta } => map_elements(input, |x| x + delta, |x| {
                integral(*delta).and_then(|d| x.checked_add(d))
            }),
        }
    }
}

/// Numeric view of an input: exact integers when possible.
enum Numbers {
    Ints(Vec<i64>),
    Floats(Vec<f64>),
}

impl Numbers {
    fn of(input: &ValidatedInput) -> Option<Self> {
        input
            .integers()
            .map(Self::Ints)
            .or_else(|| input.numbers().map(Self::Floats))
    }

    fn len(&self) -> usize {
        match self {
            Self::Ints(v) => v.len(),
            Self::Floats(v) => v.len(),
        }
    }

    fn has_negative(&self) -> bool {
        match self {
            Self::Ints(v) => v.iter().any(|x| *x < 0),
            Self::Floats(v) => v.iter().any(|x| *x < 0.0),
        }
    }

    fn sum(&self) -> Option<Value> {
        match self {
            Self::Ints(v) => v
                .iter()
                .try_fold(0i64, |acc, x| acc.checked_add(*x))
                .map(Value::from),
            Self::Floats(v) => Some(json!(v.iter().sum::<f64>())),
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.len() == 0 {
            return None;
        }
        let total: f64 = match self {
            Self::Ints(v) => v.iter().map(|x| *x as f64).sum(),
            Self::Floats(v) => v.iter().sum(),
        };
        Some(total / self.len() as f64)
    }

    fn max(&self) -> Option<Value> {
        match self {
            Self::Ints(v) => v.iter().max().map(|x| Value::from(*x)),
            Self::Floats(v) => v.iter().copied().reduce(f64::max).map(|x| json!(x)),
        }
    }

    fn min(&self) -> Option<Value> {
        match self {
            Self::Ints(v) => v.iter().min().map(|x| Value::from(*x)),
            Self::Floats(v) => v.iter().copied().reduce(f64::min).map(|x| json!(x)),
        }
    }
}

fn numeric(input: &ValidatedInput) -> Result<Numbers, Outcome> {
    Numbers::of(input).ok_or_else(|| Outcome::failure("non-numeric input"))
}

fn predict_sum(input: &ValidatedInput, min_len: usize, reject_negative: bool) -> Outcome {
    if input.is_empty() {
        return Outcome::failure("sum requires non-empty input");
    }
    if input.len() < min_len {
        return Outcome::failure(format!(
            "sum requires at least {} elements, got {}",
            min_len,
            input.len()
        ));
    }
    let numbers = match numeric(input) {
        Ok(n) => n,
        Err(failure) => return failure,
    };
    if reject_negative && numbers.has_negative() {
        return Outcome::failure("negative value encountered");
    }
    match numbers.sum() {
        Some(total) => Outcome::success(total),
        None => Outcome::failure("integer overflow"),
    }
}

fn predict_mean(input: &ValidatedInput) -> Outcome {
    let numbers = match numeric(input) {
        Ok(n) => n,
        Err(failure) => return failure,
    };
    match numbers.mean() {
        Some(mean) => Outcome::success(mean),
        None => Outcome::failure("mean requires non-empty input"),
    }
}

fn predict_summary(input: &ValidatedInput, min_len: usize) -> Outcome {
    if input.is_empty() || input.len() < min_len {
        return Outcome::failure(format!(
            "summary requires at least {} elements, got {}",
            min_len.max(1),
            input.len()
        ));
    }
    let numbers = match numeric(input) {
        Ok(n) => n,
        Err(failure) => return failure,
    };
    let Some(sum) = numbers.sum() else {
        return Outcome::failure("integer overflow");
    };
    let value = json!({
        "sum": sum,
        "mean": numbers.mean(),
        "count": numbers.len(),
        "max": numbers.max(),
        "min": numbers.min(),
    });
    Outcome::scored(value, summary_confidence(numbers.len()))
}

/// Confidence grows with input size and saturates at 0.95.
pub fn summary_confidence(len: usize) -> f64 {
    (0.7 + len as f64 * 0.05).min(0.95)
}

fn predict_basic(input: &ValidatedInput) -> Outcome {
    if input.is_empty() {
        return Outcome::failure("basic requires non-empty input");
    }
    let numbers = match numeric(input) {
        Ok(n) => n,
        Err(failure) => return failure,
    };
    match numbers.sum() {
        Some(sum) => Outcome::scored(
            json!({ "sum": sum, "count": numbers.len() }),
            BASIC_CONFIDENCE,
        ),
        None => Outcome::failure("integer overflow"),
    }
}

fn integral(x: f64) -> Option<i64> {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
        Some(x as i64)
    } else {
        None
    }
}

/// Apply an element-wise transform, staying in integers when the input and
/// the operand allow it.
fn map_elements<F, I>(input: &ValidatedInput, float_op: F, int_op: I) -> Outcome
where
    F: Fn(f64) -> f64,
    I: Fn(i64) -> Option<i64>,
{
    let numbers = match numeric(input) {
        Ok(n) => n,
        Err(failure) => return failure,
    };
    if let Numbers::Ints(ints) = &numbers {
        let mapped: Option<Vec<i64>> = ints.iter().map(|x| int_op(*x)).collect();
        if let Some(mapped) = mapped {
            return Outcome::success(mapped);
        }
    }
    let floats: Vec<f64> = match numbers {
        Numbers::Ints(v) => v.into_iter().map(|x| x as f64).collect(),
        Numbers::Floats(v) => v,
    };
    let mapped: Vec<f64> = floats.into_iter().map(float_op).collect();
    if mapped.iter().any(|x| !x.is_finite()) {
        return Outcome::failure("non-finite result");
    }
    Outcome::success(mapped.into_iter().map(|x| json!(x)).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> ValidatedInput {
        ValidatedInput::from_integers(values)
    }

    #[test]
    fn test_sum() {
        let out = BuiltinStrategy::sum().predict(&ints(&[1, 2, 3, 4, 5, 6]));
        assert_eq!(out, Outcome::success(21));
    }

    #[test]
    fn test_sum_empty_fails() {
        let out = BuiltinStrategy::sum().predict(&ints(&[]));
        assert!(!out.is_success());
    }

    #[test]
    fn test_sum_min_len_and_negative() {
        let strict = BuiltinStrategy::Sum {
            min_len: 3,
            reject_negative: true,
        };
        assert!(!strict.predict(&ints(&[1, 2])).is_success());
        assert_eq!(
            strict.predict(&ints(&[1, -2, 3])),
            Outcome::failure("negative value encountered")
        );
        assert_eq!(strict.predict(&ints(&[1, 2, 3])), Outcome::success(6));
    }

    #[test]
    fn test_sum_overflow_fails() {
        let out = BuiltinStrategy::sum().predict(&ints(&[i64::MAX, 1]));
        assert_eq!(out, Outcome::failure("integer overflow"));
    }

    #[test]
    fn test_mean() {
        assert_eq!(
            BuiltinStrategy::Mean.predict(&ints(&[1, 2, 3, 4])),
            Outcome::success(2.5)
        );
        assert!(!BuiltinStrategy::Mean.predict(&ints(&[])).is_success());
    }

    #[test]
    fn test_count_never_fails() {
        assert_eq!(BuiltinStrategy::Count.predict(&ints(&[])), Outcome::success(0));
        let mixed = ValidatedInput::new(vec![json!("a"), json!(null)]);
        assert_eq!(BuiltinStrategy::Count.predict(&mixed), Outcome::success(2));
        assert!(BuiltinStrategy::Count.is_total());
    }

    #[test]
    fn test_summary() {
        let out = BuiltinStrategy::summary().predict(&ints(&[1, 2, 3]));
        let Outcome::Success { value, confidence } = out else {
            panic!("summary should succeed");
        };
        assert_eq!(
            value,
            json!({"sum": 6, "mean": 2.0, "count": 3, "max": 3, "min": 1})
        );
        assert!((confidence.unwrap() - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_summary_needs_two_elements() {
        assert!(!BuiltinStrategy::summary().predict(&ints(&[7])).is_success());
        assert!(!BuiltinStrategy::summary().predict(&ints(&[])).is_success());
    }

    #[test]
    fn test_summary_confidence_saturates() {
        assert!((summary_confidence(2) - 0.8).abs() < 1e-9);
        assert_eq!(summary_confidence(10), 0.95);
        assert_eq!(summary_confidence(100), 0.95);
    }

    #[test]
    fn test_basic() {
        assert_eq!(
            BuiltinStrategy::Basic.predict(&ints(&[5])),
            Outcome::scored(json!({"sum": 5, "count": 1}), BASIC_CONFIDENCE)
        );
        assert!(!BuiltinStrategy::Basic.predict(&ints(&[])).is_success());
    }

    #[test]
    fn test_scale_keeps_integers() {
        let out = BuiltinStrategy::Scale { factor: 2.0 }.predict(&ints(&[1, 2, 3]));
        assert_eq!(out, Outcome::success(json!([2, 4, 6])));
    }

    #[test]
    fn test_scale_fractional_factor() {
        let out = BuiltinStrategy::Scale { factor: 0.5 }.predict(&ints(&[1, 4]));
        assert_eq!(out, Outcome::success(json!([0.5, 2.0])));
    }

    #[test]
    fn test_scale_overflow_fails() {
        let input = ValidatedInput::new(vec![json!(10.5)]);
        let out = BuiltinStrategy::Scale { factor: 1e308 }.predict(&input);
        assert_eq!(out, Outcome::failure("non-finite result"));
    }

    #[test]
    fn test_offset_overflow_fails() {
        let input = ValidatedInput::new(vec![json!(f64::MAX)]);
        let out = BuiltinStrategy::Offset { delta: f64::MAX }.predict(&input);
        assert!(!out.is_success());
    }

    #[test]
    fn test_kind_matches_config_tag() {
        let strategy: BuiltinStrategy = serde_json::from_str(r#"{"kind": "summary"}"#).unwrap();
        assert_eq!(strategy.kind(), "summary");
        assert_eq!(BuiltinStrategy::sum().kind(), "sum");
    }

    #[test]
    fn test_offset() {
        let out = BuiltinStrategy::Offset { delta: 1.0 }.predict(&ints(&[1, 2]));
        assert_eq!(out, Outcome::success(json!([2, 3])));
    }

    #[test]
    fn test_non_numeric_fails() {
        let words = ValidatedInput::new(vec![json!("a")]);
        assert_eq!(
            BuiltinStrategy::sum().predict(&words),
            Outcome::failure("non-numeric input")
        );
    }

    #[test]
    fn test_config_shape() {
        let parsed: BuiltinStrategy =
            serde_json::from_value(json!({"kind": "summary"})).unwrap();
        assert_eq!(parsed, BuiltinStrategy::summary());

        let parsed: BuiltinStrategy =
            serde_json::from_value(json!({"kind": "sum", "reject_negative": true})).unwrap();
        assert_eq!(
            parsed,
            BuiltinStrategy::Sum {
                min_len: 0,
                reject_negative: true
            }
        );
    }
}
