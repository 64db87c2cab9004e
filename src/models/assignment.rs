//! Seat assignment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Assignment lifecycle state
///
/// Modeled as an explicit enum rather than a boolean so illegal transitions
/// are checked, never silently accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentState {
    /// Holds a seat
    Active,
    /// Approval pending or released; holds no seat
    Inactive,
}

impl AssignmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentState::Active => "active",
            AssignmentState::Inactive => "inactive",
        }
    }

    /// Whether an explicit transition to `target` is legal from this state.
    /// The only legal transitions are inactive→active and active→inactive.
    pub fn can_transition_to(&self, target: AssignmentState) -> bool {
        *self != target
    }
}

impl std::fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AssignmentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AssignmentState::Active),
            "inactive" => Ok(AssignmentState::Inactive),
            _ => Err(format!("Invalid assignment state: {}", s)),
        }
    }
}

/// The binding of one license seat to a user or a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub license_id: Uuid,
    /// Exactly one of user_id and device_id is set
    pub user_id: Option<Uuid>,
    pub device_id: Option<Uuid>,
    pub state: AssignmentState,
    pub assignment_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.state == AssignmentState::Active
    }

    /// Whether the assignment belongs to the given user.
    pub fn belongs_to_user(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }
}

/// Target of an administrative pre-approval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentTarget {
    User(Uuid),
    Device(Uuid),
}

impl AssignmentTarget {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AssignmentTarget::User(id) => Some(*id),
            AssignmentTarget::Device(_) => None,
        }
    }

    pub fn device_id(&self) -> Option<Uuid> {
        match self {
            AssignmentTarget::User(_) => None,
            AssignmentTarget::Device(id) => Some(*id),
        }
    }
}

/// Request body for an administrative pre-approval
#[derive(Debug, Clone, Deserialize)]
pub struct ApproveAssignmentRequest {
    pub license_id: Uuid,
    pub notes: Option<String>,
}

/// Request body for self-service activation
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ActivateRequest {
    #[serde(default)]
    pub notes: Option<String>,
}
