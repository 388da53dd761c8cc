//! Directory configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_ACCESS_CONTROL_TYPE, TENANTS_FIELD};

/// How ruleset document writes handle concurrent writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Plain read-modify-write. Two writers racing on the same tenant lose
    /// the earlier write in full.
    #[default]
    LastWriterWins,
    /// Writes are compared against the bytes that were loaded and rejected
    /// with a version conflict if the stored document changed meanwhile.
    Optimistic,
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyMode::LastWriterWins => write!(f, "last_writer_wins"),
            ConcurrencyMode::Optimistic => write!(f, "optimistic"),
        }
    }
}

impl FromStr for ConcurrencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "last_writer_wins" | "lww" => Ok(ConcurrencyMode::LastWriterWins),
            "optimistic" => Ok(ConcurrencyMode::Optimistic),
            other => Err(format!(
                "unknown concurrency mode '{other}', expected last_writer_wins or optimistic"
            )),
        }
    }
}

/// What to do when user directory updates fail after a ruleset write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileFailurePolicy {
    /// Attempt every user, then fail the operation with
    /// [`ReconcileError::Incomplete`](crate::error::ReconcileError::Incomplete).
    #[default]
    Propagate,
    /// Log the failures and return them in the report; the repair sweep
    /// picks them up later.
    Defer,
}

impl fmt::Display for ReconcileFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileFailurePolicy::Propagate => write!(f, "propagate"),
            ReconcileFailurePolicy::Defer => write!(f, "defer"),
        }
    }
}

impl FromStr for ReconcileFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "propagate" => Ok(ReconcileFailurePolicy::Propagate),
            "defer" => Ok(ReconcileFailurePolicy::Defer),
            other => Err(format!(
                "unknown reconcile failure policy '{other}', expected propagate or defer"
            )),
        }
    }
}

/// Configuration for a [`Directory`](crate::Directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Ruleset document write mode.
    #[serde(default)]
    pub concurrency: ConcurrencyMode,

    /// Handling of failed user directory updates.
    #[serde(default)]
    pub reconcile_failures: ReconcileFailurePolicy,

    /// Access-control `type` used when none is supplied.
    #[serde(default = "default_access_control_type")]
    pub default_access_control_type: String,

    /// User record field that holds the tenant list.
    #[serde(default = "default_user_tenants_field")]
    pub user_tenants_field: String,
}

fn default_access_control_type() -> String {
    DEFAULT_ACCESS_CONTROL_TYPE.to_string()
}

fn default_user_tenants_field() -> String {
    TENANTS_FIELD.to_string()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyMode::default(),
            reconcile_failures: ReconcileFailurePolicy::default(),
            default_access_control_type: default_access_control_type(),
            user_tenants_field: default_user_tenants_field(),
        }
    }
}

impl DirectoryConfig {
    /// Sets the concurrency mode.
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency = mode;
        self
    }

    /// Sets the reconcile failure policy.
    pub fn with_reconcile_failures(mut self, policy: ReconcileFailurePolicy) -> Self {
        self.reconcile_failures = policy;
        self
    }

    /// Checks the configuration, returning every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.default_access_control_type.trim().is_empty() {
            errors.push("default_access_control_type must not be empty".to_string());
        }
        if self.user_tenants_field.trim().is_empty() {
            errors.push("user_tenants_field must not be empty".to_string());
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
