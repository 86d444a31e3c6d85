use serde::{Deserialize, Serialize};

use sovereign_core::{CallerId, OrganizationId};

use crate::Role;

/// A caller's membership in an organization.
///
/// This is an authorization boundary object: it states *which organization*
/// the caller belongs to and which role they hold there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub caller: CallerId,
    pub organization_id: OrganizationId,
    pub role: Role,
}

impl Membership {
    pub fn new(caller: impl Into<CallerId>, organization_id: OrganizationId, role: Role) -> Self {
        Self {
            caller: caller.into(),
            organization_id,
            role,
        }
    }
}
