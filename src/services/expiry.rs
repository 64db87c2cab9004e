//! License expiry sweep
//!
//! Background task that marks licenses past their expire date as expired.
//! Each license is updated in its own transaction together with a security
//! history entry attributed to the `system` sentinel actor.

use std::str::FromStr;

use anyhow::Result;
use chrono::Utc;
use cron::Schedule;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::db::{license_repository, LicenseRepository};
use crate::models::{Actor, SecurityAction};
use crate::services::audit::AuditService;

/// Default sweep schedule: daily at 00:10 UTC
pub const DEFAULT_EXPIRY_SCHEDULE: &str = "0 10 0 * * *";

pub struct ExpirySweeper {
    pool: SqlitePool,
    audit: AuditService,
}

impl ExpirySweeper {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            audit: AuditService::new(pool.clone()),
            pool,
        }
    }

    /// Expire all overdue licenses. Returns the number of licenses updated.
    pub async fn run_once(&self) -> Result<usize> {
        let today = Utc::now().date_naive();
        let candidates = LicenseRepository::new(&self.pool)
            .list_expiry_candidates(today)
            .await?;

        let mut expired = 0;
        for license in candidates {
            let mut tx = self.pool.begin().await?;

            let updated = license_repository::mark_expired_in_tx(&mut tx, license.id).await?;
            if !updated {
                // Status changed concurrently; nothing to record.
                continue;
            }

            self.audit
                .log_security_in_tx(
                    &mut tx,
                    SecurityAction::LicenseUpdated,
                    &license.name,
                    &Actor::system(),
                    Some(format!(
                        "expired automatically (expire date {})",
                        license
                            .expire_date
                            .map(|d| d.to_string())
                            .unwrap_or_default()
                    )),
                )
                .await
                .map_err(|e| anyhow::anyhow!("failed to log expiry: {}", e))?;

            tx.commit().await?;
            expired += 1;
            info!("License {} ({}) marked expired", license.name, license.id);
        }

        Ok(expired)
    }
}

/// Spawn the background sweep loop. The schedule is a 6-field cron
/// expression evaluated in UTC.
pub fn start_expiry_scheduler(pool: SqlitePool, cron_expr: &str) -> Result<()> {
    let schedule = Schedule::from_str(cron_expr)
        .map_err(|e| anyhow::anyhow!("Invalid expiry schedule '{}': {}", cron_expr, e))?;

    tokio::spawn(async move {
        let sweeper = ExpirySweeper::new(pool);
        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                warn!("Expiry schedule yields no further run times; sweep stopped");
                return;
            };

            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match sweeper.run_once().await {
                Ok(0) => {}
                Ok(n) => info!("Expiry sweep marked {} license(s) expired", n),
                Err(e) => error!("Expiry sweep failed: {:#}", e),
            }
        }
    });

    Ok(())
}

/// Validate a sweep schedule expression
pub fn validate_schedule(cron_expr: &str) -> Result<(), String> {
    Schedule::from_str(cron_expr)
        .map(|_| ())
        .map_err(|e| format!("Invalid cron expression: {}", e))
}
