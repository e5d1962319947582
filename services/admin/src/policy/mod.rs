//! Authorization policy graph
//!
//! Relational associations between permissions, menus, buttons and roles are
//! projected into group edges of a casbin enforcer. [`subject`] names the
//! nodes, [`enforcer`] wraps the engine and [`sync`] computes the edges each
//! entity contributes.

pub mod enforcer;
pub mod subject;
pub mod sync;

use std::fmt;

use thiserror::Error;

pub use enforcer::{CasbinEnforcer, EnforcerError, GroupField, PolicyEnforcer};
pub use subject::Subject;
pub use sync::{PolicyNode, PolicySynchronizer};

/// Phase of a policy write, reported alongside enforcer failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyReason {
    AddPolicies,
    RemovePolicies,
    AddGroupPolicies,
    RemoveGroupPolicies,
}

impl PolicyReason {
    /// Stable code exposed in logs and error bodies
    pub fn code(&self) -> &'static str {
        match self {
            PolicyReason::AddPolicies => "add_policies_failed",
            PolicyReason::RemovePolicies => "remove_policies_failed",
            PolicyReason::AddGroupPolicies => "add_group_policies_failed",
            PolicyReason::RemoveGroupPolicies => "remove_group_policies_failed",
        }
    }
}

impl fmt::Display for PolicyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error raised while synchronizing the policy graph
#[derive(Error, Debug)]
pub enum PolicyError {
    /// A required identity or association was missing; the enforcer was not touched
    #[error("policy precheck failed: {0}")]
    Precheck(String),

    /// The enforcer rejected a write
    #[error("{reason}: {source}")]
    Write {
        reason: PolicyReason,
        #[source]
        source: EnforcerError,
    },

    /// The operation was cancelled before it started
    #[error("policy operation cancelled")]
    Cancelled,
}

impl PolicyError {
    pub(crate) fn write(reason: PolicyReason) -> impl FnOnce(EnforcerError) -> Self {
        move |source| PolicyError::Write { reason, source }
    }
}
