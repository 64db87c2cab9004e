//! Acting principal passed into services and audit writers

use uuid::Uuid;

use crate::models::rbac::{ADMIN_ROLE, SELF_SERVICE_ROLE};

/// Reserved identity for security events recorded before authentication
/// (failed logins and the like).
pub const UNKNOWN_ACTOR_ID: Uuid = Uuid::nil();

/// Reserved identity for events the application itself originates
/// (startup bootstrap, expiry sweep).
pub const SYSTEM_ACTOR_ID: Uuid = Uuid::from_u128(1);

/// The principal performing an operation, as resolved by the auth
/// middleware or one of the reserved sentinel identities.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(id: Uuid, username: String, email: String, roles: Vec<String>) -> Self {
        Self {
            id,
            username,
            email,
            roles,
        }
    }

    /// Sentinel actor for pre-authentication events.
    pub fn unknown() -> Self {
        Self {
            id: UNKNOWN_ACTOR_ID,
            username: "unknown".to_string(),
            email: String::new(),
            roles: vec![],
        }
    }

    /// Sentinel actor for application-originated events.
    pub fn system() -> Self {
        Self {
            id: SYSTEM_ACTOR_ID,
            username: "system".to_string(),
            email: String::new(),
            roles: vec![],
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }

    pub fn has_self_service(&self) -> bool {
        self.roles.iter().any(|r| r == SELF_SERVICE_ROLE)
    }
}
