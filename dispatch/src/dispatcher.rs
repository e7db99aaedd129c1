//! Dispatcher: deterministic escalation through an ordered tier list.
//!
//! ```text
//! infer(raw, forced)
//!   ├─ validate ── rejected ─┬─ escalation off (or forced) → Err(Validation)
//!   │                        └─ escalation on → terminal tier only
//!   ├─ forced tier ── unknown → Err(UnknownTier)
//!   │               └─ invoke (no precondition) ── failure → Err(TierFailed)
//!   └─ tiers[0..n] in order
//!        ├─ precondition unmet → skip
//!        ├─ Success → stop
//!        └─ Failure → record (tier, reason), next tier
//!      all failed → DispatchResult { success: false }
//! ```
//!
//! Tier invocation runs without any lock held. Counters and history for a
//! call are applied in one critical section, which `reset` shares.

use crate::error::{ConfigError, DispatchError, DispatcherResult};
use crate::outcome::Outcome;
use crate::result::{AttemptStatus, DispatchResult, TierAttempt, TierError};
use crate::stats::{CallRecord, DispatchState, ServiceStats};
use crate::tier::Tier;
use crate::validate::{
    ElementKind, ElementRule, Rejection, ValidatedInput, ValidationPolicy, Validator,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Sink notified after every call that produced a [`DispatchResult`].
///
/// Called outside the statistics lock, on the calling thread.
pub trait DispatchObserver: Send + Sync {
    fn on_result(&self, result: &DispatchResult);
}

/// Routes inputs through an immutable, ordered list of tiers.
pub struct Dispatcher {
    tiers: Vec<Tier>,
    validator: Validator,
    escalate_on_invalid_input: bool,
    state: Mutex<DispatchState>,
    observer: Option<Arc<dyn DispatchObserver>>,
}

/// Per-call scratch space: the trace that ends up in the result and the
/// record that ends up in the statistics.
struct CallTrace {
    call_id: Uuid,
    errors: Vec<TierError>,
    attempts: Vec<TierAttempt>,
    record: CallRecord,
}

impl CallTrace {
    fn new() -> Self {
        Self {
            call_id: Uuid::new_v4(),
            errors: Vec::new(),
            attempts: Vec::new(),
            record: CallRecord::default(),
        }
    }

    fn skip(&mut self, tier: &Tier) {
        self.attempts.push(TierAttempt {
            tier: tier.name().to_string(),
            status: AttemptStatus::Skipped,
            elapsed_micros: 0,
        });
    }

    /// Invoke `tier`, timing it and recording the invocation.
    fn invoke(&mut self, tier: &Tier, input: &ValidatedInput) -> Outcome {
        let started = Instant::now();
        let outcome = tier.invoke(input);
        let elapsed_micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        self.record.invoked.push(tier.name().to_string());
        let status = if outcome.is_success() {
            AttemptStatus::Succeeded
        } else {
            self.record.tier_failures += 1;
            AttemptStatus::Failed
        };
        self.attempts.push(TierAttempt {
            tier: tier.name().to_string(),
            status,
            elapsed_micros,
        });
        outcome
    }
}

impl Dispatcher {
    /// Start building a dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Tiers in escalation order.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(Tier::name).collect()
    }

    pub fn tier(&self, name: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.name() == name)
    }

    /// The safety-net tier (always the last one).
    pub fn terminal(&self) -> &Tier {
        // Non-empty by construction.
        &self.tiers[self.tiers.len() - 1]
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn escalates_on_invalid_input(&self) -> bool {
        self.escalate_on_invalid_input
    }

    /// Run one inference call.
    ///
    /// Returns an error only when the caller opted out of the safety net:
    /// escalation on invalid input disabled, or a forced tier that is
    /// unknown or fails. A forced call with invalid input is also rejected,
    /// since it must never be served by a different tier.
    pub fn infer(&self, raw: &Value, forced_tier: Option<&str>) -> DispatcherResult<DispatchResult> {
        let mut trace = CallTrace::new();
        debug!(call_id = %trace.call_id, forced = ?forced_tier, "Inference request");

        let input = match self.validator.validate(raw) {
            Ok(input) => input,
            Err(rejection) => {
                trace.record.validation_failed = true;
                warn!(
                    call_id = %trace.call_id,
                    reason = rejection.reason(),
                    "Input rejected: {}",
                    rejection
                );
                if !self.escalate_on_invalid_input || forced_tier.is_some() {
                    self.commit(trace.record);
                    return Err(DispatchError::Validation { rejection });
                }
                return Ok(self.degrade_to_terminal(trace, raw, &rejection));
            }
        };

        match forced_tier {
            Some(name) => self.run_forced(trace, name, &input),
            None => Ok(self.escalate(trace, &input)),
        }
    }

    /// Run [`Dispatcher::infer`] over every sample, in order.
    pub fn infer_batch(&self, samples: &[Value]) -> Vec<DispatcherResult<DispatchResult>> {
        samples.iter().map(|raw| self.infer(raw, None)).collect()
    }

    /// Read-only snapshot of the statistics.
    pub fn statistics(&self) -> ServiceStats {
        self.lock_state().snapshot()
    }

    /// Snapshot of the result history, oldest first.
    pub fn history(&self) -> Vec<DispatchResult> {
        self.lock_state().history()
    }

    /// Zero every counter and clear history.
    pub fn reset(&self) {
        self.lock_state().reset();
        info!("Dispatcher statistics reset");
    }

    fn escalate(&self, mut trace: CallTrace, input: &ValidatedInput) -> DispatchResult {
        for tier in &self.tiers {
            if !tier.admits(input) {
                debug!(
                    call_id = %trace.call_id,
                    tier = tier.name(),
                    len = input.len(),
                    "Precondition unmet, skipping tier"
                );
                trace.skip(tier);
                continue;
            }

            match trace.invoke(tier, input) {
                Outcome::Success { value, confidence } => {
                    let result = self.resolved(&trace, tier, value, confidence);
                    return self.finish(trace, result);
                }
                Outcome::Failure { reason } => {
                    warn!(call_id = %trace.call_id, tier = tier.name(), %reason, "Tier failed, escalating");
                    trace.errors.push(TierError::new(tier.name(), reason));
                }
            }
        }

        warn!(
            call_id = %trace.call_id,
            failures = trace.errors.len(),
            "All tiers exhausted"
        );
        let result = DispatchResult::exhausted(trace.call_id);
        self.finish(trace, result)
    }

    fn degrade_to_terminal(
        &self,
        mut trace: CallTrace,
        raw: &Value,
        rejection: &Rejection,
    ) -> DispatchResult {
        let terminal = self.terminal();
        let input = self.validator.degrade(raw);
        info!(
            call_id = %trace.call_id,
            tier = terminal.name(),
            "Invalid input, falling back to terminal tier"
        );

        let mut result = match trace.invoke(terminal, &input) {
            Outcome::Success { value, confidence } => {
                self.resolved(&trace, terminal, value, confidence)
            }
            Outcome::Failure { reason } => {
                warn!(call_id = %trace.call_id, tier = terminal.name(), %reason, "Terminal tier failed");
                trace.errors.push(TierError::new(terminal.name(), reason));
                DispatchResult::exhausted(trace.call_id)
            }
        };
        result.rejection = Some(rejection.reason().to_string());
        self.finish(trace, result)
    }

    fn run_forced(
        &self,
        mut trace: CallTrace,
        name: &str,
        input: &ValidatedInput,
    ) -> DispatcherResult<DispatchResult> {
        let Some(tier) = self.tier(name) else {
            warn!(call_id = %trace.call_id, tier = name, "Forced tier is not registered");
            self.commit(trace.record);
            return Err(DispatchError::UnknownTier {
                name: name.to_string(),
            });
        };

        match trace.invoke(tier, input) {
            Outcome::Success { value, confidence } => {
                let mut result = self.resolved(&trace, tier, value, confidence);
                result.forced = true;
                Ok(self.finish(trace, result))
            }
            Outcome::Failure { reason } => {
                warn!(call_id = %trace.call_id, tier = name, %reason, "Forced tier failed");
                self.commit(trace.record);
                Err(DispatchError::TierFailed {
                    tier: name.to_string(),
                    reason,
                })
            }
        }
    }

    fn resolved(
        &self,
        trace: &CallTrace,
        tier: &Tier,
        value: Value,
        confidence: Option<f64>,
    ) -> DispatchResult {
        let threshold = self.terminal().min_confidence();
        let meets_threshold = confidence.is_some_and(|c| c >= threshold);
        info!(
            call_id = %trace.call_id,
            tier = tier.name(),
            confidence = ?confidence,
            meets_threshold,
            "Prediction served"
        );
        DispatchResult::resolved(trace.call_id, tier.name(), value, confidence, meets_threshold)
    }

    /// Attach the trace, apply statistics, notify the observer.
    fn finish(&self, mut trace: CallTrace, result: DispatchResult) -> DispatchResult {
        let result = result.with_trace(trace.errors, trace.attempts);
        trace.record.result = Some(result.clone());
        self.commit(trace.record);
        if let Some(observer) = &self.observer {
            observer.on_result(&result);
        }
        result
    }

    fn commit(&self, record: CallRecord) {
        self.lock_state().apply(record);
    }

    // Counters stay meaningful after a panic elsewhere; recover the guard.
    fn lock_state(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tiers", &self.tiers)
            .field("validator", &self.validator)
            .field("escalate_on_invalid_input", &self.escalate_on_invalid_input)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Dispatcher`]; checks the tier invariants on `build`.
#[derive(Default)]
pub struct DispatcherBuilder {
    tiers: Vec<Tier>,
    policy: ValidationPolicy,
    escalate_on_invalid_input: Option<bool>,
    history_capacity: Option<usize>,
    observer: Option<Arc<dyn DispatchObserver>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier; order of calls is escalation order.
    pub fn tier(mut self, tier: Tier) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn tiers(mut self, tiers: impl IntoIterator<Item = Tier>) -> Self {
        self.tiers.extend(tiers);
        self
    }

    /// Replace the whole admission policy.
    pub fn validation(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_input_length(mut self, max: usize) -> Self {
        self.policy.max_input_length = max;
        self
    }

    pub fn element_kind(mut self, kind: ElementKind) -> Self {
        self.policy.element = ElementRule::Kind(kind);
        self
    }

    pub fn element_predicate<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.policy.element = ElementRule::predicate(name, check);
        self
    }

    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.policy.allow_empty = allow;
        self
    }

    pub fn parse_json_strings(mut self, parse: bool) -> Self {
        self.policy.parse_json_strings = parse;
        self
    }

    /// Defaults to `true`.
    pub fn escalate_on_invalid_input(mut self, escalate: bool) -> Self {
        self.escalate_on_invalid_input = Some(escalate);
        self
    }

    /// Bound the history; `None` keeps everything.
    pub fn history_capacity(mut self, capacity: Option<usize>) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        let terminal = self.tiers.last().ok_or(ConfigError::NoTiers)?;
        if terminal.has_precondition() {
            return Err(ConfigError::TerminalPrecondition {
                name: terminal.name().to_string(),
            });
        }

        let mut seen = HashSet::new();
        for tier in &self.tiers {
            if !seen.insert(tier.name()) {
                return Err(ConfigError::DuplicateTier {
                    name: tier.name().to_string(),
                });
            }
            check_unit_interval(tier.name(), "confidence", tier.confidence())?;
            check_unit_interval(tier.name(), "min_confidence", Some(tier.min_confidence()))?;
        }

        let state = DispatchState::new(self.tiers.iter().map(Tier::name), self.history_capacity);
        debug!(tiers = ?self.tiers.iter().map(Tier::name).collect::<Vec<_>>(), "Dispatcher built");

        Ok(Dispatcher {
            tiers: self.tiers,
            validator: Validator::new(self.policy),
            escalate_on_invalid_input: self.escalate_on_invalid_input.unwrap_or(true),
            state: Mutex::new(state),
            observer: self.observer,
        })
    }
}

fn check_unit_interval(name: &str, field: &'static str, value: Option<f64>) -> Result<(), ConfigError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ConfigError::InvalidConfidence {
            name: name.to_string(),
            field,
            value: v,
        }),
        _ => Ok(()),
    }
}
