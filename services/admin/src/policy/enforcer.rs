//! Enforcer adapter over the casbin policy engine

use std::sync::Arc;

use async_trait::async_trait;
use casbin::{CoreApi, DefaultModel, Enforcer, MemoryAdapter, MgmtApi};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// RBAC model: a request is allowed when its subject reaches, through group
/// edges, a policy subject holding exactly the requested object and action.
pub const RBAC_MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
"#;

/// Errors raised by the enforcer adapter
#[derive(Error, Debug)]
pub enum EnforcerError {
    #[error("invalid policy argument: {0}")]
    InvalidArgument(String),

    #[error("policy engine error: {0}")]
    Engine(#[from] casbin::Error),
}

/// Which side of a group edge a value is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    /// The inheriting side (`g` field 0)
    Inheritor = 0,
    /// The inherited-from side (`g` field 1)
    Inherited = 1,
}

impl GroupField {
    fn index(self) -> usize {
        self as usize
    }
}

/// Mutation and query surface of the policy store
///
/// Adds of existing tuples and removes of absent ones succeed without effect.
#[async_trait]
pub trait PolicyEnforcer: Send + Sync {
    async fn add_policy(&self, sub: &str, obj: &str, act: &str) -> Result<(), EnforcerError>;

    async fn remove_policy(&self, sub: &str, obj: &str, act: &str) -> Result<(), EnforcerError>;

    /// Add the edge "`sub` inherits everything granted to `obj`"
    async fn add_group_policy(&self, sub: &str, obj: &str) -> Result<(), EnforcerError>;

    /// Remove every edge whose `field` equals `value`
    async fn remove_group_policy(&self, field: GroupField, value: &str)
    -> Result<(), EnforcerError>;

    async fn enforce(&self, sub: &str, obj: &str, act: &str) -> Result<bool, EnforcerError>;

    /// Snapshot of `(sub, obj, act)` tuples
    async fn policies(&self) -> Vec<Vec<String>>;

    /// Snapshot of `(sub, obj)` edges
    async fn group_policies(&self) -> Vec<Vec<String>>;
}

/// [`PolicyEnforcer`] backed by an in-memory casbin [`Enforcer`]
///
/// The policy set is rebuilt from the database at boot, so the adapter keeps
/// nothing on disk.
#[derive(Clone)]
pub struct CasbinEnforcer {
    inner: Arc<RwLock<Enforcer>>,
}

impl CasbinEnforcer {
    pub async fn new() -> Result<Self, EnforcerError> {
        let model = DefaultModel::from_str(RBAC_MODEL).await?;
        let enforcer = Enforcer::new(model, MemoryAdapter::default()).await?;
        Ok(Self {
            inner: Arc::new(RwLock::new(enforcer)),
        })
    }
}

fn require(name: &str, value: &str) -> Result<(), EnforcerError> {
    if value.is_empty() {
        return Err(EnforcerError::InvalidArgument(format!("{name} must not be empty")));
    }
    Ok(())
}

#[async_trait]
impl PolicyEnforcer for CasbinEnforcer {
    async fn add_policy(&self, sub: &str, obj: &str, act: &str) -> Result<(), EnforcerError> {
        require("subject", sub)?;
        let added = self
            .inner
            .write()
            .await
            .add_policy(vec![sub.to_string(), obj.to_string(), act.to_string()])
            .await?;
        debug!(sub, obj, act, added, "add policy");
        Ok(())
    }

    async fn remove_policy(&self, sub: &str, obj: &str, act: &str) -> Result<(), EnforcerError> {
        require("subject", sub)?;
        let removed = self
            .inner
            .write()
            .await
            .remove_policy(vec![sub.to_string(), obj.to_string(), act.to_string()])
            .await?;
        debug!(sub, obj, act, removed, "remove policy");
        Ok(())
    }

    async fn add_group_policy(&self, sub: &str, obj: &str) -> Result<(), EnforcerError> {
        require("subject", sub)?;
        require("object", obj)?;
        let added = self
            .inner
            .write()
            .await
            .add_grouping_policy(vec![sub.to_string(), obj.to_string()])
            .await?;
        debug!(sub, obj, added, "add group policy");
        Ok(())
    }

    async fn remove_group_policy(
        &self,
        field: GroupField,
        value: &str,
    ) -> Result<(), EnforcerError> {
        require("value", value)?;
        let removed = self
            .inner
            .write()
            .await
            .remove_filtered_grouping_policy(field.index(), vec![value.to_string()])
            .await?;
        debug!(?field, value, removed, "remove group policy");
        Ok(())
    }

    async fn enforce(&self, sub: &str, obj: &str, act: &str) -> Result<bool, EnforcerError> {
        let allowed = self.inner.read().await.enforce((sub, obj, act))?;
        Ok(allowed)
    }

    async fn policies(&self) -> Vec<Vec<String>> {
        self.inner.read().await.get_policy()
    }

    async fn group_policies(&self) -> Vec<Vec<String>> {
        self.inner.read().await.get_grouping_policy()
    }
}
