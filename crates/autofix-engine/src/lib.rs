//! AutoFix execution governance engine
//!
//! Turns diagnosis recommendations into fix plans that are:
//! - ordered by declared and implicit dependencies
//! - scored against a configurable risk table
//! - validated before any side effect
//! - executed serially with reverse-order rollback
//! - recorded as immutable audit records
//!
//! # Example
//!
//! ```rust,ignore
//! use autofix_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(issues: Vec<Issue>) -> Result<(), AutoFixError> {
//! let manager = AutoFixManager::new(
//!     AutoFixOptions::live(),
//!     Arc::new(ShellCommandRunner::new()),
//!     Arc::new(InMemoryRecordStore::new()),
//! );
//!
//! let plan = manager.build_plan("diag-42", &issues)?;
//! let outcome = manager
//!     .execute_fix_plan(&plan, ExecutionRequest::new().approved_by("oncall"))
//!     .await?;
//! println!("{:?}", outcome.result.status);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod diagnosis;
pub mod error;
pub mod executor;
pub mod graph;
pub mod lifecycle;
pub mod manager;
pub mod risk;
pub mod store;
pub mod types;
pub mod validator;

pub use config::{AutoFixOptions, EngineConfig, RiskConfig, SafetyConfig};
pub use diagnosis::{Issue, IssueSeverity, Recommendation};
pub use error::{AutoFixError, CommandError, ConfigError, LifecycleError, PlanError, StoreError};
pub use executor::{
    AlwaysConfirm, CommandOutput, CommandRunner, ConfirmationProvider, DirectExecutor, Executor, ShellCommandRunner,
    DRY_RUN_MARKER,
};
pub use manager::{AutoFixManager, ExecutionOutcome, ExecutionRequest};
pub use risk::{RiskAssessor, RiskMatcher, RiskRule, RiskRuleSet};
pub use store::{InMemoryRecordStore, RecordFilter, RecordStore};
pub use validator::{ValidationCheck, ValidationContext, Validator};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the engine
    pub use crate::types::{
        ActionCategory, ActionId, ActionStatus, FixActionItem, FixPlan, FixResult, FixStatus, RiskLevel,
    };
    pub use crate::{
        AutoFixError, AutoFixManager, AutoFixOptions, CommandRunner, EngineConfig, ExecutionOutcome,
        ExecutionRequest, InMemoryRecordStore, Issue, Recommendation, RecordFilter, RecordStore,
        ShellCommandRunner,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
