use sovereign_core::{CallerId, OrganizationId};

/// Identity of the caller for a request.
///
/// Established by the upstream gateway and immutable for the request's
/// lifetime; the organization is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    caller_id: CallerId,
    organization_id: Option<OrganizationId>,
}

impl CallerContext {
    pub fn new(caller_id: CallerId, organization_id: Option<OrganizationId>) -> Self {
        Self {
            caller_id,
            organization_id,
        }
    }

    pub fn caller_id(&self) -> &CallerId {
        &self.caller_id
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }
}
