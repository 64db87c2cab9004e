//! Assignment lifecycle service
//!
//! Owns every state change of seat assignments. Each transition and its
//! history entry are written in one transaction; capacity-sensitive writes
//! are guarded at the statement level (see `db::assignment_repository`), so
//! the seat invariant holds even under concurrent activations.

use sqlx::SqlitePool;
use tracing::error;
use uuid::Uuid;

use crate::db::{
    assignment_repository, AssignmentRepository, LicenseRepository, UserRepository,
};
use crate::models::{
    Actor, Assignment, AssignmentAction, AssignmentTarget, License, LicenseAvailability,
};
use crate::services::access;
use crate::services::audit::AuditService;
use crate::services::error::{LicensingError, Result};

/// Seats still grantable on a license.
pub fn available_seats(seat_count: i64, active_count: i64) -> i64 {
    (seat_count - active_count).max(0)
}

/// Pick the actor-qualified action tag for a transition.
pub(crate) fn transition_action(activating: bool, actor_is_admin: bool) -> AssignmentAction {
    match (activating, actor_is_admin) {
        (true, true) => AssignmentAction::AdminActivated,
        (true, false) => AssignmentAction::UserActivated,
        (false, true) => AssignmentAction::AdminDeactivated,
        (false, false) => AssignmentAction::UserDeactivated,
    }
}

pub struct AssignmentService {
    pool: SqlitePool,
    audit: AuditService,
}

impl AssignmentService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            audit: AuditService::new(pool.clone()),
            pool,
        }
    }

    /// Seat availability summary for a license.
    pub async fn availability(&self, license_id: Uuid) -> Result<LicenseAvailability> {
        let license = self.require_license(license_id).await?;
        let active = LicenseRepository::new(&self.pool)
            .count_active_assignments(license_id)
            .await
            .map_err(|e| storage_error("count active assignments", e))?;

        Ok(LicenseAvailability {
            license_id: license.id,
            seat_count: license.seat_count,
            active_assignments: active,
            available_seats: available_seats(license.seat_count, active),
        })
    }

    /// Self-service activation: take one seat on the license for the actor.
    pub async fn activate(
        &self,
        license_id: Uuid,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<Assignment> {
        if !access::can_self_activate(actor) {
            return Err(LicensingError::NotAuthorized(
                "self-service role required to activate a license".to_string(),
            ));
        }

        let license = self.require_license(license_id).await?;
        if !license.is_assignable() {
            return Err(LicensingError::NotAvailable(
                license.id,
                format!("license status is {}", license.status),
            ));
        }

        let repo = AssignmentRepository::new(&self.pool);
        let active = LicenseRepository::new(&self.pool)
            .count_active_assignments(license_id)
            .await
            .map_err(|e| storage_error("count active assignments", e))?;
        if available_seats(license.seat_count, active) <= 0 {
            return Err(LicensingError::NotAvailable(
                license.id,
                format!("no available seats for license {}", license.name),
            ));
        }

        if repo
            .find_active_for_user(license_id, actor.id)
            .await
            .map_err(|e| storage_error("check for duplicate assignment", e))?
            .is_some()
        {
            return Err(LicensingError::AlreadyAssigned(license.id));
        }

        let action = transition_action(true, actor.is_admin());

        let mut tx = self.pool.begin().await.map_err(LicensingError::from)?;

        // The guarded insert re-checks capacity atomically; losing the race
        // between the precheck above and this statement surfaces here.
        let assignment = assignment_repository::insert_active_in_tx(
            &mut tx,
            license_id,
            AssignmentTarget::User(actor.id),
            notes.as_deref(),
        )
        .await
        .map_err(|e| storage_error("insert assignment", e))?
        .ok_or_else(|| {
            LicensingError::NotAvailable(
                license.id,
                format!("no available seats for license {}", license.name),
            )
        })?;

        self.audit
            .log_assignment_in_tx(&mut tx, action, Some(assignment.id), &license, actor, None)
            .await?;

        tx.commit().await.map_err(LicensingError::from)?;

        Ok(assignment)
    }

    /// Release a seat. Allowed for administrators and the assignment's own
    /// user; deactivating a non-active assignment is an error, never a
    /// silent no-op.
    pub async fn deactivate(&self, assignment_id: Uuid, actor: &Actor) -> Result<Assignment> {
        let repo = AssignmentRepository::new(&self.pool);
        let assignment = repo
            .find(assignment_id)
            .await
            .map_err(|e| storage_error("fetch assignment", e))?
            .ok_or_else(|| LicensingError::NotFound("Assignment".to_string()))?;

        access::authorize_assignment_access(actor, &assignment)?;

        if !assignment.is_active() {
            return Err(LicensingError::Service(format!(
                "Assignment {} is not active",
                assignment_id
            )));
        }

        let license = self.require_license(assignment.license_id).await?;
        let subject = self.subject_for(&assignment, actor).await?;
        let action = transition_action(false, actor.is_admin());

        let mut tx = self.pool.begin().await.map_err(LicensingError::from)?;

        let updated = assignment_repository::deactivate_in_tx(&mut tx, assignment_id)
            .await
            .map_err(|e| storage_error("deactivate assignment", e))?
            .ok_or_else(|| {
                LicensingError::Service(format!("Assignment {} is not active", assignment_id))
            })?;

        self.audit
            .log_assignment_in_tx(&mut tx, action, Some(updated.id), &license, &subject, None)
            .await?;

        tx.commit().await.map_err(LicensingError::from)?;

        Ok(updated)
    }

    /// Administrative pre-approval: create an inactive assignment for a
    /// target user or device. Skips the availability and duplicate checks
    /// that gate self-service activation; the seat is only taken when the
    /// assignment is activated.
    pub async fn approve(
        &self,
        license_id: Uuid,
        target: AssignmentTarget,
        admin: &Actor,
        notes: Option<String>,
    ) -> Result<Assignment> {
        access::require_admin(admin)?;
        let license = self.require_license(license_id).await?;

        let subject = self.target_subject(target, admin).await?;

        let mut tx = self.pool.begin().await.map_err(LicensingError::from)?;

        let assignment =
            assignment_repository::insert_inactive_in_tx(&mut tx, license_id, target, notes.as_deref())
                .await
                .map_err(|e| storage_error("insert approved assignment", e))?;

        self.audit
            .log_assignment_in_tx(
                &mut tx,
                AssignmentAction::AdminApproved,
                Some(assignment.id),
                &license,
                &subject,
                notes,
            )
            .await?;

        tx.commit().await.map_err(LicensingError::from)?;

        Ok(assignment)
    }

    /// Administrative activation of a pre-approved assignment. Seat capacity
    /// is still enforced by the guarded state flip.
    pub async fn admin_activate(&self, assignment_id: Uuid, admin: &Actor) -> Result<Assignment> {
        access::require_admin(admin)?;

        let repo = AssignmentRepository::new(&self.pool);
        let assignment = repo
            .find(assignment_id)
            .await
            .map_err(|e| storage_error("fetch assignment", e))?
            .ok_or_else(|| LicensingError::NotFound("Assignment".to_string()))?;

        if assignment.is_active() {
            return Err(LicensingError::Service(format!(
                "Assignment {} is already active",
                assignment_id
            )));
        }

        let license = self.require_license(assignment.license_id).await?;
        let subject = self.subject_for(&assignment, admin).await?;

        let mut tx = self.pool.begin().await.map_err(LicensingError::from)?;

        let updated = assignment_repository::activate_in_tx(&mut tx, assignment_id)
            .await
            .map_err(|e| storage_error("activate assignment", e))?
            .ok_or_else(|| {
                LicensingError::NotAvailable(
                    license.id,
                    format!("no available seats for license {}", license.name),
                )
            })?;

        self.audit
            .log_assignment_in_tx(
                &mut tx,
                AssignmentAction::AdminActivated,
                Some(updated.id),
                &license,
                &subject,
                None,
            )
            .await?;

        tx.commit().await.map_err(LicensingError::from)?;

        Ok(updated)
    }

    /// Administrative cancellation: hard-delete an inactive assignment. The
    /// history entry keeps the denormalized identity with a null assignment
    /// reference.
    pub async fn cancel(&self, assignment_id: Uuid, admin: &Actor) -> Result<()> {
        access::require_admin(admin)?;

        let repo = AssignmentRepository::new(&self.pool);
        let assignment = repo
            .find(assignment_id)
            .await
            .map_err(|e| storage_error("fetch assignment", e))?
            .ok_or_else(|| LicensingError::NotFound("Assignment".to_string()))?;

        if assignment.is_active() {
            return Err(LicensingError::Service(format!(
                "Assignment {} is active; deactivate it before cancelling",
                assignment_id
            )));
        }

        let license = self.require_license(assignment.license_id).await?;
        let subject = self.subject_for(&assignment, admin).await?;

        let mut tx = self.pool.begin().await.map_err(LicensingError::from)?;

        let deleted = assignment_repository::delete_inactive_in_tx(&mut tx, assignment_id)
            .await
            .map_err(|e| storage_error("delete assignment", e))?;
        if !deleted {
            return Err(LicensingError::Service(format!(
                "Assignment {} could not be cancelled",
                assignment_id
            )));
        }

        self.audit
            .log_assignment_in_tx(
                &mut tx,
                AssignmentAction::AdminCancelled,
                None,
                &license,
                &subject,
                None,
            )
            .await?;

        tx.commit().await.map_err(LicensingError::from)?;

        Ok(())
    }

    /// Assignments for a user, visible to administrators and the user
    /// themselves.
    pub async fn list_for_user(&self, user_id: Uuid, actor: &Actor) -> Result<Vec<Assignment>> {
        if !actor.is_admin() && actor.id != user_id {
            return Err(LicensingError::NotAuthorized(
                "assignments belong to another user".to_string(),
            ));
        }

        AssignmentRepository::new(&self.pool)
            .list_for_user(user_id)
            .await
            .map_err(|e| storage_error("list assignments", e))
    }

    /// The actor's active assignment on a license, used by the self-service
    /// release-by-license entry point.
    pub async fn find_active_for_user(
        &self,
        license_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Assignment>> {
        AssignmentRepository::new(&self.pool)
            .find_active_for_user(license_id, user_id)
            .await
            .map_err(|e| storage_error("fetch active assignment", e))
    }

    pub async fn find(&self, assignment_id: Uuid) -> Result<Option<Assignment>> {
        AssignmentRepository::new(&self.pool)
            .find(assignment_id)
            .await
            .map_err(|e| storage_error("fetch assignment", e))
    }

    async fn require_license(&self, license_id: Uuid) -> Result<License> {
        LicenseRepository::new(&self.pool)
            .find(license_id)
            .await
            .map_err(|e| storage_error("fetch license", e))?
            .ok_or_else(|| LicensingError::NotFound("License".to_string()))
    }

    /// Resolve the identity denormalized into history entries: the holding
    /// user for user assignments, the acting administrator for device
    /// assignments.
    async fn subject_for(&self, assignment: &Assignment, actor: &Actor) -> Result<Actor> {
        match assignment.user_id {
            Some(user_id) => self.load_subject_user(user_id).await,
            None => Ok(actor.clone()),
        }
    }

    async fn target_subject(&self, target: AssignmentTarget, actor: &Actor) -> Result<Actor> {
        match target {
            AssignmentTarget::User(user_id) => self.load_subject_user(user_id).await,
            AssignmentTarget::Device(_) => Ok(actor.clone()),
        }
    }

    async fn load_subject_user(&self, user_id: Uuid) -> Result<Actor> {
        let user = UserRepository::new(&self.pool)
            .find(user_id)
            .await
            .map_err(|e| storage_error("fetch user", e))?
            .ok_or_else(|| LicensingError::NotFound("User".to_string()))?;

        Ok(Actor::new(user.id, user.username, user.email, vec![]))
    }
}

fn storage_error(context: &str, err: anyhow::Error) -> LicensingError {
    error!("{}: {:#}", context, err);
    LicensingError::Service(format!("Failed to {}", context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(5, 0, 5)]
    #[case(5, 3, 2)]
    #[case(5, 5, 0)]
    #[case(1, 0, 1)]
    // Over-allocation never reports negative availability
    #[case(5, 7, 0)]
    fn test_available_seats(#[case] seats: i64, #[case] active: i64, #[case] expected: i64) {
        assert_eq!(available_seats(seats, active), expected);
    }

    #[test]
    fn test_transition_action_qualifies_actor() {
        assert_eq!(
            transition_action(true, false),
            AssignmentAction::UserActivated
        );
        assert_eq!(
            transition_action(true, true),
            AssignmentAction::AdminActivated
        );
        assert_eq!(
            transition_action(false, false),
            AssignmentAction::UserDeactivated
        );
        assert_eq!(
            transition_action(false, true),
            AssignmentAction::AdminDeactivated
        );
    }
}
