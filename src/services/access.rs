//! Access and ownership checks
//!
//! Used identically across activation, deactivation and cancellation: an
//! administrator may operate on any assignment, everyone else only on their
//! own.

use crate::models::{Actor, Assignment};
use crate::services::error::{LicensingError, Result};

/// Whether the actor may create an active assignment for themselves.
pub fn can_self_activate(actor: &Actor) -> bool {
    actor.is_admin() || actor.has_self_service()
}

/// Authorize the actor to operate on the given assignment.
pub fn authorize_assignment_access(actor: &Actor, assignment: &Assignment) -> Result<()> {
    if actor.is_admin() || assignment.belongs_to_user(actor.id) {
        return Ok(());
    }
    Err(LicensingError::NotAuthorized(
        "assignment belongs to another user".to_string(),
    ))
}

/// Authorize an administrator-only operation.
pub fn require_admin(actor: &Actor) -> Result<()> {
    if actor.is_admin() {
        return Ok(());
    }
    Err(LicensingError::NotAuthorized(
        "administrator role required".to_string(),
    ))
}
