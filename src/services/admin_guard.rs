//! Admin protection
//!
//! Guards every operation that could strip administrator standing: role
//! removal, full role-set replacement, account deactivation and account
//! deletion. The administrator count is evaluated inside the same
//! transaction as the mutation it guards, so the floor of one administrator
//! can never be crossed.

use sqlx::SqlitePool;
use tracing::error;
use uuid::Uuid;

use crate::db::{user_repository, UserRepository};
use crate::models::{Actor, Role, SecurityAction, User, UserPublic, ADMIN_ROLE};
use crate::services::access;
use crate::services::audit::AuditService;
use crate::services::error::{LicensingError, Result};

pub struct AdminGuard {
    pool: SqlitePool,
    audit: AuditService,
}

impl AdminGuard {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            audit: AuditService::new(pool.clone()),
            pool,
        }
    }

    /// Remove a single role from a user.
    pub async fn remove_role(&self, user_id: Uuid, role_id: Uuid, admin: &Actor) -> Result<bool> {
        access::require_admin(admin)?;

        let user = self.require_user(user_id).await?;
        let role = self.require_role(role_id).await?;

        let mut tx = self.pool.begin().await.map_err(LicensingError::from)?;

        if role.name == ADMIN_ROLE {
            self.check_admin_floor_in_tx(&mut tx, user_id, "remove the administrator role from")
                .await?;
        }

        let removed = user_repository::remove_role_in_tx(&mut tx, user_id, role_id)
            .await
            .map_err(|e| storage_error("remove role", e))?;
        if !removed {
            return Err(LicensingError::NotFound("Role assignment".to_string()));
        }

        self.audit
            .log_security_in_tx(
                &mut tx,
                SecurityAction::UserUpdated,
                &user.username,
                admin,
                Some(format!("removed role {}", role.name)),
            )
            .await?;

        tx.commit().await.map_err(LicensingError::from)?;

        Ok(true)
    }

    /// Replace a user's full role set.
    pub async fn set_roles(
        &self,
        user_id: Uuid,
        role_ids: &[Uuid],
        admin: &Actor,
    ) -> Result<UserPublic> {
        access::require_admin(admin)?;

        let user = self.require_user(user_id).await?;
        let repo = UserRepository::new(&self.pool);

        let mut names = Vec::with_capacity(role_ids.len());
        let mut keeps_admin = false;
        for role_id in role_ids {
            let role = self.require_role(*role_id).await?;
            keeps_admin |= role.name == ADMIN_ROLE;
            names.push(role.name);
        }

        let mut tx = self.pool.begin().await.map_err(LicensingError::from)?;

        if !keeps_admin {
            let was_admin = user_repository::user_is_admin_in_tx(&mut tx, user_id)
                .await
                .map_err(|e| storage_error("check administrator role", e))?;
            if was_admin {
                self.check_admin_floor_in_tx(&mut tx, user_id, "remove the administrator role from")
                    .await?;
            }
        }

        user_repository::set_roles_in_tx(&mut tx, user_id, role_ids)
            .await
            .map_err(|e| storage_error("replace roles", e))?;

        self.audit
            .log_security_in_tx(
                &mut tx,
                SecurityAction::UserUpdated,
                &user.username,
                admin,
                Some(format!("replaced roles with [{}]", names.join(", "))),
            )
            .await?;

        tx.commit().await.map_err(LicensingError::from)?;

        let roles = repo
            .get_user_role_names(user_id)
            .await
            .map_err(|e| storage_error("fetch user roles", e))?;

        Ok(UserPublic::from(user).with_roles(roles))
    }

    /// Deactivate a user account.
    pub async fn deactivate_user(&self, user_id: Uuid, admin: &Actor) -> Result<()> {
        access::require_admin(admin)?;
        let user = self.require_user(user_id).await?;

        let mut tx = self.pool.begin().await.map_err(LicensingError::from)?;

        self.check_admin_floor_in_tx(&mut tx, user_id, "deactivate")
            .await?;

        let updated = user_repository::set_user_active_in_tx(&mut tx, user_id, false)
            .await
            .map_err(|e| storage_error("deactivate user", e))?;
        if !updated {
            return Err(LicensingError::NotFound("User".to_string()));
        }

        self.audit
            .log_security_in_tx(
                &mut tx,
                SecurityAction::UserLocked,
                &user.username,
                admin,
                Some("account deactivated".to_string()),
            )
            .await?;

        tx.commit().await.map_err(LicensingError::from)?;

        Ok(())
    }

    /// Delete a user account.
    pub async fn delete_user(&self, user_id: Uuid, admin: &Actor) -> Result<()> {
        access::require_admin(admin)?;
        let user = self.require_user(user_id).await?;

        let mut tx = self.pool.begin().await.map_err(LicensingError::from)?;

        self.check_admin_floor_in_tx(&mut tx, user_id, "delete")
            .await?;

        let deleted = user_repository::delete_user_in_tx(&mut tx, user_id)
            .await
            .map_err(|e| storage_error("delete user", e))?;
        if !deleted {
            return Err(LicensingError::NotFound("User".to_string()));
        }

        self.audit
            .log_security_in_tx(
                &mut tx,
                SecurityAction::UserDeleted,
                &user.username,
                admin,
                None,
            )
            .await?;

        tx.commit().await.map_err(LicensingError::from)?;

        Ok(())
    }

    /// Fail when the target currently holds the administrator role and is
    /// the only one left.
    async fn check_admin_floor_in_tx(
        &self,
        conn: &mut sqlx::SqliteConnection,
        target_user_id: Uuid,
        operation: &str,
    ) -> Result<()> {
        let target_is_admin = user_repository::user_is_admin_in_tx(conn, target_user_id)
            .await
            .map_err(|e| storage_error("check administrator role", e))?;
        if !target_is_admin {
            return Ok(());
        }

        let admins = user_repository::count_administrators_in_tx(conn)
            .await
            .map_err(|e| storage_error("count administrators", e))?;
        if admins <= 1 {
            return Err(LicensingError::AdminProtection(format!(
                "Cannot {} the last administrator account",
                operation
            )));
        }

        Ok(())
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User> {
        UserRepository::new(&self.pool)
            .find(user_id)
            .await
            .map_err(|e| storage_error("fetch user", e))?
            .ok_or_else(|| LicensingError::NotFound("User".to_string()))
    }

    async fn require_role(&self, role_id: Uuid) -> Result<Role> {
        UserRepository::new(&self.pool)
            .find_role(role_id)
            .await
            .map_err(|e| storage_error("fetch role", e))?
            .ok_or_else(|| LicensingError::NotFound("Role".to_string()))
    }
}

fn storage_error(context: &str, err: anyhow::Error) -> LicensingError {
    error!("{}: {:#}", context, err);
    LicensingError::Service(format!("Failed to {}", context))
}
