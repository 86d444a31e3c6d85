//! Postgres-backed role directory (`user_organizations` membership rows).

use async_trait::async_trait;
use sqlx::PgPool;

use sovereign_auth::{Role, RoleLookup, RoleLookupError};
use sovereign_core::{CallerId, OrganizationId};

pub struct PgRoleDirectory {
    pool: PgPool,
}

impl PgRoleDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleLookup for PgRoleDirectory {
    async fn role_of(
        &self,
        caller: &CallerId,
        organization: OrganizationId,
    ) -> Result<Option<Role>, RoleLookupError> {
        let role: Option<String> = sqlx::query_scalar(
            r#"
            SELECT role
            FROM user_organizations
            WHERE user_id::text = $1 AND organization_id = $2
            LIMIT 1
            "#,
        )
        .bind(caller.as_str())
        .bind(organization.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RoleLookupError::Unavailable(e.to_string()))?;

        Ok(role.map(Role::new))
    }
}
