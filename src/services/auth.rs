//! Authentication service
//!
//! Provides password hashing with Argon2 and user account management.
//! Account and credential events are recorded in the security history.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::db::UserRepository;
use crate::models::{Actor, SecurityAction, User, ADMIN_ROLE};
use crate::services::audit::AuditService;

pub struct AuthService {
    pool: SqlitePool,
    audit: AuditService,
}

impl AuthService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            audit: AuditService::new(pool.clone()),
            pool,
        }
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Authenticate a user by username and password. Both outcomes are
    /// recorded in the security history; failures are attributed to the
    /// `unknown` sentinel since no identity was established.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let repo = UserRepository::new(&self.pool);

        if let Some(user) = repo.find_by_username(username).await? {
            if user.is_active && Self::verify_password(password, &user.password_hash)? {
                let actor =
                    Actor::new(user.id, user.username.clone(), user.email.clone(), vec![]);
                self.log_best_effort(SecurityAction::LoginSuccess, &user.username, &actor, None)
                    .await;
                return Ok(Some(user));
            }
        }

        self.log_best_effort(
            SecurityAction::LoginFailure,
            username,
            &Actor::unknown(),
            Some("invalid credentials or inactive account".to_string()),
        )
        .await;
        Ok(None)
    }

    /// Create a new user with the given role ids.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role_ids: &[Uuid],
        actor: &Actor,
    ) -> Result<User> {
        let repo = UserRepository::new(&self.pool);

        if repo.find_by_username(username).await?.is_some() {
            anyhow::bail!("Username already exists");
        }
        if repo.find_by_email(email).await?.is_some() {
            anyhow::bail!("Email already exists");
        }
        for role_id in role_ids {
            if repo.find_role(*role_id).await?.is_none() {
                anyhow::bail!("Role {} not found", role_id);
            }
        }

        let password_hash = Self::hash_password(password)?;
        let user = User::new(username.to_string(), email.to_string(), password_hash);

        repo.insert(&user).await?;
        for role_id in role_ids {
            repo.add_role(user.id, *role_id).await?;
        }

        self.log_best_effort(SecurityAction::UserCreated, username, actor, None)
            .await;

        Ok(user)
    }

    /// Update a user's profile fields.
    pub async fn update_user(
        &self,
        id: Uuid,
        username: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
        actor: &Actor,
    ) -> Result<User> {
        let repo = UserRepository::new(&self.pool);
        let existing = repo.find(id).await?.context("User not found")?;

        let new_username = username.unwrap_or(&existing.username);
        let new_email = email.unwrap_or(&existing.email);

        if new_username != existing.username
            && repo.find_by_username(new_username).await?.is_some()
        {
            anyhow::bail!("Username already exists");
        }
        if new_email != existing.email && repo.find_by_email(new_email).await?.is_some() {
            anyhow::bail!("Email already exists");
        }

        let new_password_hash = match password {
            Some(p) => Self::hash_password(p)?,
            None => existing.password_hash.clone(),
        };

        repo.update(id, new_username, new_email, &new_password_hash)
            .await?;

        self.log_best_effort(SecurityAction::UserUpdated, new_username, actor, None)
            .await;

        repo.find(id).await?.context("User not found after update")
    }

    /// Change the authenticated user's own password.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool> {
        let repo = UserRepository::new(&self.pool);
        let user = repo.find(user_id).await?.context("User not found")?;

        if !Self::verify_password(current_password, &user.password_hash)? {
            return Ok(false);
        }

        let new_hash = Self::hash_password(new_password)?;
        repo.update_password(user_id, &new_hash).await?;

        let actor = Actor::new(user.id, user.username.clone(), user.email.clone(), vec![]);
        self.log_best_effort(SecurityAction::PasswordChanged, &user.username, &actor, None)
            .await;

        Ok(true)
    }

    /// Ensure at least one administrator exists. Called once at startup;
    /// creates the bootstrap account when the administrator count is zero,
    /// recorded as the `system` sentinel actor.
    pub async fn ensure_bootstrap_admin(&self, password: &str) -> Result<Option<User>> {
        let repo = UserRepository::new(&self.pool);

        if repo.count_administrators().await? > 0 {
            return Ok(None);
        }

        let admin_role = repo
            .find_role_by_name(ADMIN_ROLE)
            .await?
            .context("Administrator role missing from database")?;

        let password_hash = Self::hash_password(password)?;
        let user = User::new(
            "admin".to_string(),
            "admin@localhost".to_string(),
            password_hash,
        );

        repo.insert(&user).await?;
        repo.add_role(user.id, admin_role.id).await?;

        self.log_best_effort(
            SecurityAction::UserCreated,
            &user.username,
            &Actor::system(),
            Some("bootstrap administrator".to_string()),
        )
        .await;

        Ok(Some(user))
    }

    /// Security logging for already-committed actions is best-effort: a
    /// failed write must not undo the action it records.
    async fn log_best_effort(
        &self,
        action: SecurityAction,
        object: &str,
        actor: &Actor,
        details: Option<String>,
    ) {
        if let Err(e) = self.audit.log_security(action, object, actor, details).await {
            warn!("Failed to write security log entry: {}", e);
        }
    }
}
