//! Engine configuration
//!
//! Every section is optional in a file; missing values take the safe
//! defaults (disabled, dry-run, approval required).

use crate::error::ConfigError;
use crate::risk::RiskRuleSet;
use crate::types::RiskLevel;
use crate::validator::DEFAULT_DENY_LIST;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Caller-facing switches for plan building and execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoFixOptions {
    /// Opt-in gate
    pub enabled: bool,
    /// Simulate instead of executing
    pub dry_run: bool,
    /// Demand approval for every plan
    pub require_approval: bool,
    /// Plans above this level require approval
    pub max_risk_level: RiskLevel,
    pub action_timeout_ms: u64,
    pub enable_rollback: bool,
}

impl Default for AutoFixOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            dry_run: true,
            require_approval: true,
            max_risk_level: RiskLevel::Medium,
            action_timeout_ms: 300_000,
            enable_rollback: true,
        }
    }
}

impl AutoFixOptions {
    /// Enabled, live, no blanket approval demand
    #[must_use]
    pub fn live() -> Self {
        Self {
            enabled: true,
            dry_run: false,
            require_approval: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_require_approval(mut self, require: bool) -> Self {
        self.require_approval = require;
        self
    }

    #[must_use]
    pub fn with_max_risk_level(mut self, level: RiskLevel) -> Self {
        self.max_risk_level = level;
        self
    }

    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_rollback(mut self, enabled: bool) -> Self {
        self.enable_rollback = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.action_timeout_ms == 0 {
            return Err(ConfigError::Invalid("action_timeout_ms must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub rules: RiskRuleSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Case-insensitive command fragments the safety rule rejects
    pub deny_list: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            deny_list: DEFAULT_DENY_LIST.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Full engine configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub autofix: AutoFixOptions,
    pub risk: RiskConfig,
    pub safety: SafetyConfig,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("toml") => Self::from_toml_str(&text),
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            other => Err(ConfigError::Invalid(format!(
                "unsupported config extension {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Checks values serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.autofix.validate()?;
        if let Some(rule) = self.risk.rules.rules().iter().find(|r| r.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "risk rule with empty name (matcher {:?})",
                rule.matcher
            )));
        }
        Ok(())
    }
}
