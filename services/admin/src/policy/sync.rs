//! Projection of entities and their associations onto policy edges

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{GroupField, PolicyEnforcer, PolicyError, PolicyReason, Subject};
use crate::models::{Button, Menu, Permission, Role};

/// An entity that inherits grants through group edges
///
/// Associations must already be loaded; `grantors` only reads them.
pub trait PolicyNode {
    fn subject(&self) -> Subject;

    /// Reject the node before any enforcer contact
    fn precheck(&self) -> Result<(), PolicyError>;

    /// Objects of every edge `(self, grantor)` this node contributes
    fn grantors(&self) -> Vec<Subject>;
}

fn require_id(kind: &str, id: i64) -> Result<(), PolicyError> {
    if id == 0 {
        return Err(PolicyError::Precheck(format!("{kind} id is required")));
    }
    Ok(())
}

fn permission_subjects(permissions: &[Permission]) -> impl Iterator<Item = Subject> + '_ {
    permissions.iter().map(|p| Subject::Permission(p.id))
}

impl PolicyNode for Menu {
    fn subject(&self) -> Subject {
        Subject::Menu(self.id)
    }

    fn precheck(&self) -> Result<(), PolicyError> {
        require_id("menu", self.id)
    }

    fn grantors(&self) -> Vec<Subject> {
        self.parent_id
            .map(Subject::Menu)
            .into_iter()
            .chain(permission_subjects(&self.permissions))
            .collect()
    }
}

impl PolicyNode for Button {
    fn subject(&self) -> Subject {
        Subject::Button(self.id)
    }

    fn precheck(&self) -> Result<(), PolicyError> {
        require_id("button", self.id)?;
        require_id("button menu", self.menu_id)
    }

    fn grantors(&self) -> Vec<Subject> {
        std::iter::once(Subject::Menu(self.menu_id))
            .chain(permission_subjects(&self.permissions))
            .collect()
    }
}

impl PolicyNode for Role {
    fn subject(&self) -> Subject {
        Subject::Role(self.id)
    }

    fn precheck(&self) -> Result<(), PolicyError> {
        require_id("role", self.id)
    }

    fn grantors(&self) -> Vec<Subject> {
        permission_subjects(&self.permissions)
            .chain(self.menus.iter().map(|m| Subject::Menu(m.id)))
            .chain(self.buttons.iter().map(|b| Subject::Button(b.id)))
            .collect()
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), PolicyError> {
    if cancel.is_cancelled() {
        return Err(PolicyError::Cancelled);
    }
    Ok(())
}

fn precheck_permission(permission: &Permission) -> Result<(), PolicyError> {
    require_id("permission", permission.id)?;
    if permission.url.is_empty() || permission.method.is_empty() {
        return Err(PolicyError::Precheck(
            "permission url and method are required".to_string(),
        ));
    }
    Ok(())
}

/// Keeps the enforcer in step with the relational state
///
/// Each call is independent; the caller sequences removals and re-adds and
/// nothing here rolls back a partially applied sequence.
#[derive(Clone)]
pub struct PolicySynchronizer {
    enforcer: Arc<dyn PolicyEnforcer>,
}

impl PolicySynchronizer {
    pub fn new(enforcer: Arc<dyn PolicyEnforcer>) -> Self {
        Self { enforcer }
    }

    pub fn enforcer(&self) -> &Arc<dyn PolicyEnforcer> {
        &self.enforcer
    }

    /// Add a direct `(subject, url, method)` tuple
    pub async fn grant(
        &self,
        cancel: &CancellationToken,
        subject: Subject,
        url: &str,
        method: &str,
    ) -> Result<(), PolicyError> {
        check_cancelled(cancel)?;

        let subject = subject.encode();
        self.enforcer
            .add_policy(&subject, url, method)
            .await
            .map_err(|e| {
                error!(%subject, url, method, "Failed to add policy: {}", e);
                PolicyError::write(PolicyReason::AddPolicies)(e)
            })
    }

    /// Add the `(permission_<id>, url, method)` tuple
    pub async fn add_policy(
        &self,
        cancel: &CancellationToken,
        permission: &Permission,
    ) -> Result<(), PolicyError> {
        check_cancelled(cancel)?;
        precheck_permission(permission)?;

        self.grant(
            cancel,
            Subject::Permission(permission.id),
            &permission.url,
            &permission.method,
        )
        .await
    }

    /// Remove the permission tuple, and with `remove_inherited` every edge
    /// pointing at the permission.
    pub async fn remove_policy(
        &self,
        cancel: &CancellationToken,
        permission: &Permission,
        remove_inherited: bool,
    ) -> Result<(), PolicyError> {
        check_cancelled(cancel)?;
        precheck_permission(permission)?;

        let subject = Subject::Permission(permission.id).encode();
        self.enforcer
            .remove_policy(&subject, &permission.url, &permission.method)
            .await
            .map_err(|e| {
                error!(%subject, "Failed to remove policy: {}", e);
                PolicyError::write(PolicyReason::RemovePolicies)(e)
            })?;

        if remove_inherited {
            self.enforcer
                .remove_group_policy(GroupField::Inherited, &subject)
                .await
                .map_err(|e| {
                    error!(%subject, "Failed to remove inherited edges: {}", e);
                    PolicyError::write(PolicyReason::RemoveGroupPolicies)(e)
                })?;
        }
        Ok(())
    }

    /// Add an edge from the node to each of its grantors
    pub async fn add_group_policy<N>(
        &self,
        cancel: &CancellationToken,
        node: &N,
    ) -> Result<(), PolicyError>
    where
        N: PolicyNode + Sync,
    {
        check_cancelled(cancel)?;
        node.precheck()?;

        let subject = node.subject().encode();
        let grantors = node.grantors();
        for grantor in &grantors {
            self.enforcer
                .add_group_policy(&subject, &grantor.encode())
                .await
                .map_err(|e| {
                    error!(%subject, %grantor, "Failed to add group policy: {}", e);
                    PolicyError::write(PolicyReason::AddGroupPolicies)(e)
                })?;
        }

        info!(%subject, edges = grantors.len(), "Group policies added");
        Ok(())
    }

    /// Remove the node's outgoing edges, and with `remove_inherited` the
    /// edges of every dependent pointing at it.
    pub async fn remove_group_policy<N>(
        &self,
        cancel: &CancellationToken,
        node: &N,
        remove_inherited: bool,
    ) -> Result<(), PolicyError>
    where
        N: PolicyNode + Sync,
    {
        check_cancelled(cancel)?;
        node.precheck()?;

        let subject = node.subject().encode();
        let mut fields = vec![GroupField::Inheritor];
        if remove_inherited {
            fields.push(GroupField::Inherited);
        }

        for field in fields {
            self.enforcer
                .remove_group_policy(field, &subject)
                .await
                .map_err(|e| {
                    error!(%subject, ?field, "Failed to remove group policy: {}", e);
                    PolicyError::write(PolicyReason::RemoveGroupPolicies)(e)
                })?;
        }

        info!(%subject, remove_inherited, "Group policies removed");
        Ok(())
    }
}
