//! Declarative dispatcher configuration.
//!
//! Loaded from TOML or JSON, then overridden by `DISPATCH_*` environment
//! variables. Every tier in a config file is a [`BuiltinStrategy`]; custom
//! strategies go through [`crate::DispatcherBuilder`] directly.
//!
//! ```toml
//! max_input_length = 100
//! element = "integer"
//! escalate_on_invalid_input = true
//!
//! [[tiers]]
//! name = "main"
//! kind = "summary"
//! min_admissible_length = 2
//!
//! [[tiers]]
//! name = "emergency"
//! kind = "count"
//! confidence = 0.5
//! ```

use crate::builtin::BuiltinStrategy;
use crate::dispatcher::{Dispatcher, DispatcherBuilder};
use crate::error::ConfigError;
use crate::tier::Tier;
use crate::validate::{ElementKind, ElementRule, ValidationPolicy, DEFAULT_MAX_INPUT_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One tier in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: String,
    #[serde(flatten)]
    pub strategy: BuiltinStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_admissible_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
}

impl TierConfig {
    pub fn new(name: impl Into<String>, strategy: BuiltinStrategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            min_admissible_length: None,
            confidence: None,
            min_confidence: None,
        }
    }

    pub fn to_tier(&self) -> Tier {
        let mut tier = Tier::new(self.name.clone(), self.strategy.clone());
        if let Some(len) = self.min_admissible_length {
            tier = tier.with_min_length(len);
        }
        if let Some(c) = self.confidence {
            tier = tier.with_confidence(c);
        }
        if let Some(c) = self.min_confidence {
            tier = tier.with_min_confidence(c);
        }
        tier
    }
}

/// Full dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_input_length: usize,
    pub element: ElementKind,
    pub allow_empty: bool,
    pub parse_json_strings: bool,
    pub escalate_on_invalid_input: bool,
    /// `None` keeps the full history.
    pub history_capacity: Option<usize>,
    pub tiers: Vec<TierConfig>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
            element: ElementKind::Integer,
            allow_empty: true,
            parse_json_strings: true,
            escalate_on_invalid_input: true,
            history_capacity: None,
            tiers: default_tiers(),
        }
    }
}

/// main → fallback → emergency.
///
/// `main` needs two elements and reports size-dependent confidence,
/// `fallback` serves any non-empty input, `emergency` only counts.
/// Emergency results are reported below threshold.
pub fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig {
            min_admissible_length: Some(2),
            min_confidence: Some(0.8),
            ..TierConfig::new("main", BuiltinStrategy::summary())
        },
        TierConfig {
            min_confidence: Some(0.6),
            ..TierConfig::new("fallback", BuiltinStrategy::Basic)
        },
        TierConfig {
            confidence: Some(0.5),
            min_confidence: Some(0.6),
            ..TierConfig::new("emergency", BuiltinStrategy::Count)
        },
    ]
}

impl DispatchConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a file; `.json` files are JSON, everything else TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        }
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `DISPATCH_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `DISPATCH_*` overrides read through `lookup`; unparseable
    /// values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("DISPATCH_MAX_INPUT_LENGTH") {
            if let Ok(n) = val.parse() {
                self.max_input_length = n;
            }
        }
        if let Some(val) = lookup("DISPATCH_ESCALATE_ON_INVALID") {
            self.escalate_on_invalid_input = parse_flag(&val);
        }
        if let Some(val) = lookup("DISPATCH_ALLOW_EMPTY") {
            self.allow_empty = parse_flag(&val);
        }
        if let Some(val) = lookup("DISPATCH_HISTORY_CAPACITY") {
            if let Ok(n) = val.parse() {
                self.history_capacity = Some(n);
            }
        }
        self
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            max_input_length: self.max_input_length,
            element: ElementRule::Kind(self.element),
            allow_empty: self.allow_empty,
            parse_json_strings: self.parse_json_strings,
        }
    }

    /// Builder pre-filled from this config, for adding an observer.
    pub fn builder(&self) -> DispatcherBuilder {
        Dispatcher::builder()
            .validation(self.validation_policy())
            .escalate_on_invalid_input(self.escalate_on_invalid_input)
            .history_capacity(self.history_capacity)
            .tiers(self.tiers.iter().map(TierConfig::to_tier))
    }

    /// Build the dispatcher. On top of the builder's checks, the terminal
    /// tier must be a built-in that always succeeds.
    pub fn build(&self) -> Result<Dispatcher, ConfigError> {
        if let Some(terminal) = self.tiers.last() {
            if !terminal.strategy.is_total() {
                return Err(ConfigError::TerminalMayFail {
                    name: terminal.name.clone(),
                    kind: terminal.strategy.kind().to_string(),
                });
            }
        }
        self.builder().build()
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}
