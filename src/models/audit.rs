//! Audit trail models
//!
//! Both trails are append-only. Actor and license identity are denormalized
//! into each entry at write time so the record stays meaningful after the
//! referenced user or license is renamed or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action tags for assignment lifecycle events, qualified by who initiated
/// the transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentAction {
    UserActivated,
    UserDeactivated,
    AdminActivated,
    AdminDeactivated,
    /// Administrative pre-approval: assignment created inactive
    AdminApproved,
    /// Administrative hard delete of an inactive assignment
    AdminCancelled,
}

impl AssignmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentAction::UserActivated => "user_activated",
            AssignmentAction::UserDeactivated => "user_deactivated",
            AssignmentAction::AdminActivated => "admin_activated",
            AssignmentAction::AdminDeactivated => "admin_deactivated",
            AssignmentAction::AdminApproved => "admin_approved",
            AssignmentAction::AdminCancelled => "admin_cancelled",
        }
    }
}

impl std::str::FromStr for AssignmentAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_activated" => Ok(AssignmentAction::UserActivated),
            "user_deactivated" => Ok(AssignmentAction::UserDeactivated),
            "admin_activated" => Ok(AssignmentAction::AdminActivated),
            "admin_deactivated" => Ok(AssignmentAction::AdminDeactivated),
            "admin_approved" => Ok(AssignmentAction::AdminApproved),
            "admin_cancelled" => Ok(AssignmentAction::AdminCancelled),
            _ => Err(format!("Unknown assignment action: {}", s)),
        }
    }
}

/// Action tags for authentication and entity-management events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecurityAction {
    LoginSuccess,
    LoginFailure,
    PasswordChanged,
    UserCreated,
    UserUpdated,
    UserDeleted,
    UserLocked,
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    LicenseCreated,
    LicenseUpdated,
    LicenseDeleted,
}

impl SecurityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityAction::LoginSuccess => "login_success",
            SecurityAction::LoginFailure => "login_failure",
            SecurityAction::PasswordChanged => "password_changed",
            SecurityAction::UserCreated => "user_created",
            SecurityAction::UserUpdated => "user_updated",
            SecurityAction::UserDeleted => "user_deleted",
            SecurityAction::UserLocked => "user_locked",
            SecurityAction::ProductCreated => "product_created",
            SecurityAction::ProductUpdated => "product_updated",
            SecurityAction::ProductDeleted => "product_deleted",
            SecurityAction::LicenseCreated => "license_created",
            SecurityAction::LicenseUpdated => "license_updated",
            SecurityAction::LicenseDeleted => "license_deleted",
        }
    }
}

impl std::str::FromStr for SecurityAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login_success" => Ok(SecurityAction::LoginSuccess),
            "login_failure" => Ok(SecurityAction::LoginFailure),
            "password_changed" => Ok(SecurityAction::PasswordChanged),
            "user_created" => Ok(SecurityAction::UserCreated),
            "user_updated" => Ok(SecurityAction::UserUpdated),
            "user_deleted" => Ok(SecurityAction::UserDeleted),
            "user_locked" => Ok(SecurityAction::UserLocked),
            "product_created" => Ok(SecurityAction::ProductCreated),
            "product_updated" => Ok(SecurityAction::ProductUpdated),
            "product_deleted" => Ok(SecurityAction::ProductDeleted),
            "license_created" => Ok(SecurityAction::LicenseCreated),
            "license_updated" => Ok(SecurityAction::LicenseUpdated),
            "license_deleted" => Ok(SecurityAction::LicenseDeleted),
            _ => Err(format!("Unknown security action: {}", s)),
        }
    }
}

/// One assignment-history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentLogEntry {
    pub id: Uuid,
    /// Null once the referenced assignment has been cancelled
    pub assignment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub action: String,
    pub license_id: Uuid,
    pub license_name: String,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub details: Option<String>,
}

/// One security-history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityLogEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub action: String,
    /// Display name of the affected object (username, product name, ...)
    pub object: String,
    /// Null for pre-authentication events
    pub user_id: Option<Uuid>,
    pub username: String,
    pub email: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssignmentLogQuery {
    pub user_id: Option<Uuid>,
    pub license_id: Option<Uuid>,
    pub action: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityLogQuery {
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Subject selector for the administrative purge operations
#[derive(Debug, Clone, Deserialize)]
pub struct PurgeQuery {
    pub user_id: Uuid,
}
