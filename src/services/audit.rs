//! Audit trail writer
//!
//! Constructs immutable, denormalized history entries for assignment
//! transitions and security events. Entries written through the `*_in_tx`
//! methods share the caller's transaction: the business mutation and its
//! log entry commit or roll back together. Pool-based security writes are
//! for events whose triggering action is not itself transactional (logins,
//! already-committed CRUD); their failures are surfaced to the caller, who
//! may choose to treat them as warnings.

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::audit_repository::{
    self, NewAssignmentLog, NewSecurityLog,
};
use crate::models::{
    Actor, AssignmentAction, AssignmentLogEntry, License, SecurityAction, SecurityLogEntry,
    UNKNOWN_ACTOR_ID,
};
use crate::services::error::{LicensingError, Result};

pub struct AuditService {
    pool: SqlitePool,
}

impl AuditService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an assignment-history entry inside the caller's transaction.
    pub async fn log_assignment_in_tx(
        &self,
        conn: &mut SqliteConnection,
        action: AssignmentAction,
        assignment_id: Option<Uuid>,
        license: &License,
        subject: &Actor,
        details: Option<String>,
    ) -> Result<AssignmentLogEntry> {
        let entry = build_assignment_entry(action, assignment_id, license, subject, details)?;
        audit_repository::insert_assignment_log_in_tx(conn, &entry)
            .await
            .map_err(LicensingError::from)
    }

    /// Append a security-history entry inside the caller's transaction.
    pub async fn log_security_in_tx(
        &self,
        conn: &mut SqliteConnection,
        action: SecurityAction,
        object: &str,
        actor: &Actor,
        details: Option<String>,
    ) -> Result<SecurityLogEntry> {
        let entry = build_security_entry(action, object, actor, details)?;
        audit_repository::insert_security_log_in_tx(conn, &entry)
            .await
            .map_err(LicensingError::from)
    }

    /// Append a security-history entry outside any business transaction.
    pub async fn log_security(
        &self,
        action: SecurityAction,
        object: &str,
        actor: &Actor,
        details: Option<String>,
    ) -> Result<SecurityLogEntry> {
        let entry = build_security_entry(action, object, actor, details)?;
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| LicensingError::Service(e.to_string()))?;
        audit_repository::insert_security_log_in_tx(&mut conn, &entry)
            .await
            .map_err(LicensingError::from)
    }
}

/// Build and validate a denormalized assignment-history entry. The subject
/// is the user the seat belongs to, which for self-service operations is the
/// actor themselves.
fn build_assignment_entry(
    action: AssignmentAction,
    assignment_id: Option<Uuid>,
    license: &License,
    subject: &Actor,
    details: Option<String>,
) -> Result<NewAssignmentLog> {
    if license.name.trim().is_empty() {
        return Err(LicensingError::Validation(
            "assignment log entry requires a license name".to_string(),
        ));
    }
    if subject.username.trim().is_empty() {
        return Err(LicensingError::Validation(
            "assignment log entry requires a username".to_string(),
        ));
    }

    Ok(NewAssignmentLog {
        assignment_id,
        action: action.as_str().to_string(),
        license_id: license.id,
        license_name: license.name.clone(),
        user_id: subject.id,
        username: subject.username.clone(),
        email: subject.email.clone(),
        details,
    })
}

/// Build and validate a denormalized security-history entry. The sentinel
/// `unknown` actor is stored with a null user reference.
fn build_security_entry(
    action: SecurityAction,
    object: &str,
    actor: &Actor,
    details: Option<String>,
) -> Result<NewSecurityLog> {
    if object.trim().is_empty() {
        return Err(LicensingError::Validation(
            "security log entry requires an object".to_string(),
        ));
    }
    if actor.username.trim().is_empty() {
        return Err(LicensingError::Validation(
            "security log entry requires an actor username".to_string(),
        ));
    }

    let user_id = if actor.id == UNKNOWN_ACTOR_ID {
        None
    } else {
        Some(actor.id)
    };

    Ok(NewSecurityLog {
        action: action.as_str().to_string(),
        object: object.to_string(),
        user_id,
        username: actor.username.clone(),
        email: actor.email.clone(),
        details,
    })
}
