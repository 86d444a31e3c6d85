use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role a caller holds inside an organization.
///
/// Roles are opaque strings as stored by the membership table; the
/// classification helpers below are case-insensitive so `"Admin"` and
/// `"admin"` grant the same authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const OWNER: &'static str = "owner";
    pub const ADMIN: &'static str = "admin";
    pub const MANAGER: &'static str = "manager";
    pub const PAYROLL: &'static str = "payroll";
    pub const HR: &'static str = "hr";
    pub const MEMBER: &'static str = "member";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_any(&self, names: &[&str]) -> bool {
        let name = self.0.trim();
        names.iter().any(|n| name.eq_ignore_ascii_case(n))
    }

    /// Owners and admins: may delete and approve.
    pub fn is_administrative(&self) -> bool {
        self.is_any(&[Self::OWNER, Self::ADMIN])
    }

    /// May run payroll and touch pay statements.
    pub fn grants_payroll(&self) -> bool {
        self.is_administrative() || self.is_any(&[Self::MANAGER, Self::PAYROLL])
    }

    /// May manage employee records.
    pub fn grants_hr(&self) -> bool {
        self.is_administrative() || self.is_any(&[Self::MANAGER, Self::HR])
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
