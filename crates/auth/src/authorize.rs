use serde::Serialize;
use thiserror::Error;

use sovereign_core::OrganizationId;

use crate::Role;

/// Authority a command requires within its organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRequirement {
    /// Owner or admin.
    Administrator,
    /// Payroll, manager or administrative role.
    Payroll,
    /// HR, manager or administrative role.
    HumanResources,
    /// Any membership row.
    Membership,
}

impl AccessRequirement {
    pub fn is_satisfied_by(self, role: &Role) -> bool {
        match self {
            AccessRequirement::Administrator => role.is_administrative(),
            AccessRequirement::Payroll => role.grants_payroll(),
            AccessRequirement::HumanResources => role.grants_hr(),
            AccessRequirement::Membership => true,
        }
    }
}

impl core::fmt::Display for AccessRequirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            AccessRequirement::Administrator => "an administrative role",
            AccessRequirement::Payroll => "a payroll or manager role",
            AccessRequirement::HumanResources => "an HR role",
            AccessRequirement::Membership => "organization membership",
        })
    }
}

/// Authorization failure.
///
/// Messages only describe the authority the caller lacks; they never say
/// whether the targeted resource exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("{0} is required and the command names no organization")]
    MissingOrganization(AccessRequirement),

    #[error("caller is not a member of organization {0}")]
    NotMember(OrganizationId),

    #[error("caller lacks {requirement} in organization {organization}")]
    Forbidden {
        requirement: AccessRequirement,
        organization: OrganizationId,
    },

    #[error("caller authority in organization {0} could not be verified")]
    Unverifiable(OrganizationId),
}

/// Decide whether a caller holding `role` in `organization` meets `requirement`.
///
/// - No IO
/// - No panics
/// - `role == None` means the caller has no membership row
pub fn authorize(
    role: Option<&Role>,
    requirement: AccessRequirement,
    organization: OrganizationId,
) -> Result<(), AuthzError> {
    let Some(role) = role else {
        return Err(AuthzError::NotMember(organization));
    };

    if requirement.is_satisfied_by(role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            requirement,
            organization,
        })
    }
}
