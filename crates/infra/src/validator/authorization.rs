//! Gate 2: the caller holds the authority the command requires.

use tracing::warn;

use sovereign_auth::{AccessRequirement, AuthzError, RoleLookup, authorize};
use sovereign_commands::{Action, Command, Target};
use sovereign_core::{CallerId, OrganizationId};

/// Requirements for `action` on `target`, strictest first.
///
/// Pay data and personnel records always need an organization. Everything
/// else only needs membership when an organization is named; DELETE and
/// APPROVE additionally need an administrative role there.
pub fn requirements(
    action: Action,
    target: Target,
    organization: Option<OrganizationId>,
) -> Vec<AccessRequirement> {
    let mut required = Vec::with_capacity(2);

    if matches!(action, Action::Delete | Action::Approve) && organization.is_some() {
        required.push(AccessRequirement::Administrator);
    }

    match target {
        Target::PayrollRun | Target::Paystub => required.push(AccessRequirement::Payroll),
        Target::Employee => required.push(AccessRequirement::HumanResources),
        _ if organization.is_some() => required.push(AccessRequirement::Membership),
        _ => {}
    }

    required
}

/// Check `caller` against every requirement of `command`.
///
/// A failing role lookup rejects the command.
pub async fn check(
    roles: &dyn RoleLookup,
    command: &Command,
    caller: &CallerId,
) -> Result<(), AuthzError> {
    let organization = command.organization_id();
    let required = requirements(command.action, command.target, organization);

    let Some(&first) = required.first() else {
        return Ok(());
    };
    let Some(organization) = organization else {
        return Err(AuthzError::MissingOrganization(first));
    };

    let role = roles.role_of(caller, organization).await.map_err(|err| {
        warn!(caller = %caller, organization = %organization, error = %err, "role lookup failed");
        AuthzError::Unverifiable(organization)
    })?;

    for requirement in required {
        authorize(role.as_ref(), requirement, organization)?;
    }
    Ok(())
}
