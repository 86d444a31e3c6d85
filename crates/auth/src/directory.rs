//! Role lookup seam (`roleOf(caller, organization)`).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use sovereign_core::{CallerId, OrganizationId};

use crate::{Membership, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleLookupError {
    #[error("role directory unavailable: {0}")]
    Unavailable(String),
}

/// Resolves the role a caller holds within an organization.
///
/// `Ok(None)` means the caller is not a member.
#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn role_of(
        &self,
        caller: &CallerId,
        organization: OrganizationId,
    ) -> Result<Option<Role>, RoleLookupError>;
}

#[async_trait]
impl<T> RoleLookup for Arc<T>
where
    T: RoleLookup + ?Sized,
{
    async fn role_of(
        &self,
        caller: &CallerId,
        organization: OrganizationId,
    ) -> Result<Option<Role>, RoleLookupError> {
        (**self).role_of(caller, organization).await
    }
}

/// In-memory role directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRoleDirectory {
    inner: RwLock<HashMap<(CallerId, OrganizationId), Role>>,
}

impl InMemoryRoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_memberships(memberships: impl IntoIterator<Item = Membership>) -> Self {
        let directory = Self::new();
        for m in memberships {
            directory.grant(m.caller, m.organization_id, m.role);
        }
        directory
    }

    /// Grant (or replace) a caller's role in an organization.
    pub fn grant(&self, caller: impl Into<CallerId>, organization: OrganizationId, role: Role) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((caller.into(), organization), role);
        }
    }

    pub fn revoke(&self, caller: &CallerId, organization: OrganizationId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&(caller.clone(), organization));
        }
    }
}

#[async_trait]
impl RoleLookup for InMemoryRoleDirectory {
    async fn role_of(
        &self,
        caller: &CallerId,
        organization: OrganizationId,
    ) -> Result<Option<Role>, RoleLookupError> {
        let map = self
            .inner
            .read()
            .map_err(|_| RoleLookupError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(map.get(&(caller.clone(), organization)).cloned())
    }
}
