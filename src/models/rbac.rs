//! Roles and role assignment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the administrator role. The system guarantees at least one user
/// always holds it.
pub const ADMIN_ROLE: &str = "admin";

/// Name of the role allowing users to activate license seats for themselves.
pub const SELF_SERVICE_ROLE: &str = "self_service";

/// Name of the read-only role.
pub const VIEWER_ROLE: &str = "viewer";

/// A role that can be assigned to users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,

    /// Role name (e.g., "admin", "self_service", "viewer")
    pub name: String,

    /// Human-readable display name
    pub display_name: String,

    pub description: Option<String>,

    /// Whether this is a built-in system role
    pub is_system: bool,

    pub created_at: DateTime<Utc>,
}

/// Request to replace a user's full role set
#[derive(Debug, Clone, Deserialize)]
pub struct SetRolesRequest {
    pub role_ids: Vec<Uuid>,
}
