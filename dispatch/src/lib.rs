//! Tiered Fallback Dispatcher
//!
//! Routes each input through an ordered list of prediction tiers, from the
//! highest-fidelity strategy down to a terminal safety net that always
//! answers. All decisions are deterministic.
//!
//! # Escalation Ladder
//!
//! ```text
//! raw input
//!     │  validate: sequence? ≤ max length? elements well-typed?
//!     │    └─ rejected → terminal tier only (or ValidationError if disabled)
//!     ▼
//! tier 0 (e.g. summary): skipped if input shorter than its precondition
//!     │  Failure / null → record (tier, reason), escalate
//!     ▼
//! tier 1 (e.g. basic)
//!     │
//!     ▼
//! terminal tier (e.g. count): no precondition, never fails
//! ```
//!
//! # Usage
//!
//! ```rust
//! use serde_json::json;
//! use tier_dispatch::{BuiltinStrategy, Dispatcher, Tier};
//!
//! let dispatcher = Dispatcher::builder()
//!     .tier(Tier::new("primary", BuiltinStrategy::sum()).with_min_length(3))
//!     .tier(Tier::new("terminal", BuiltinStrategy::Count))
//!     .build()
//!     .unwrap();
//!
//! let result = dispatcher.infer(&json!([1, 2, 3, 4, 5, 6]), None).unwrap();
//! assert_eq!(result.tier_used.as_deref(), Some("primary"));
//! assert_eq!(result.value, Some(json!(21)));
//! ```

pub mod builtin;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod outcome;
pub mod result;
pub mod stats;
pub mod tier;
pub mod validate;

pub use builtin::BuiltinStrategy;
pub use config::{default_tiers, DispatchConfig, TierConfig};
pub use dispatcher::{DispatchObserver, Dispatcher, DispatcherBuilder};
pub use error::{ConfigError, DispatchError, DispatcherResult};
pub use outcome::Outcome;
pub use result::{AttemptStatus, DispatchResult, TierAttempt, TierError};
pub use stats::{History, ServiceStats};
pub use tier::{Strategy, Tier};
pub use validate::{
    ElementKind, ElementRule, Rejection, ValidatedInput, ValidationPolicy, Validator,
};
