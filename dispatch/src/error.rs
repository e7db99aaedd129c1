//! Dispatcher error types
//!
//! Only caller opt-outs cross the `infer` boundary as errors: disabled
//! escalation on invalid input, an unknown forced tier, or a forced tier
//! that failed. Everything else is reported inside a `DispatchResult`.

use crate::validate::Rejection;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dispatch operations
pub type DispatcherResult<T> = Result<T, DispatchError>;

/// Errors surfaced by [`crate::Dispatcher::infer`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Input failed admission and escalation on invalid input is disabled
    #[error("Input rejected: {rejection}")]
    Validation { rejection: Rejection },

    /// Forced tier name is not registered
    #[error("Unknown tier: {name}")]
    UnknownTier { name: String },

    /// Forced tier returned a failure; forcing never escalates
    #[error("Forced tier '{tier}' failed: {reason}")]
    TierFailed { tier: String, reason: String },
}

impl DispatchError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::UnknownTier { .. } => "UNKNOWN_TIER",
            Self::TierFailed { .. } => "TIER_FAILED",
        }
    }
}

/// Errors raised while building a dispatcher
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Dispatcher needs at least one tier")]
    NoTiers,

    #[error("Duplicate tier name: {name}")]
    DuplicateTier { name: String },

    /// The last tier is the safety net and must admit every input
    #[error("Terminal tier '{name}' must not have a length precondition")]
    TerminalPrecondition { name: String },

    /// Config-built terminal tiers must use a strategy that cannot fail
    #[error("Terminal tier '{name}' uses strategy '{kind}', which can fail")]
    TerminalMayFail { name: String, kind: String },

    #[error("Tier '{name}' has {field} {value} outside [0, 1]")]
    InvalidConfidence {
        name: String,
        field: &'static str,
        value: f64,
    },

    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}
