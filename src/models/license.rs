//! License model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Administrative license status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// Seats may be activated
    #[default]
    Active,
    /// Past its expire date; no new activations
    Expired,
    /// Retired by an administrator; no new activations
    Archived,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Expired => "expired",
            LicenseStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LicenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(LicenseStatus::Active),
            "expired" => Ok(LicenseStatus::Expired),
            "archived" => Ok(LicenseStatus::Archived),
            _ => Err(format!("Invalid license status: {}", s)),
        }
    }
}

/// License entity
///
/// The assignment core consumes licenses and never mutates them; status and
/// seat_count are administrator-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    /// Total grantable seat capacity; active assignments never exceed it
    pub seat_count: i64,
    pub status: LicenseStatus,
    pub expire_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl License {
    pub fn is_assignable(&self) -> bool {
        self.status == LicenseStatus::Active
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLicenseRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 1))]
    pub seat_count: i64,
    pub expire_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLicenseRequest {
    pub name: Option<String>,
    pub seat_count: Option<i64>,
    pub status: Option<LicenseStatus>,
    pub expire_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Seat availability summary for a license
#[derive(Debug, Clone, Serialize)]
pub struct LicenseAvailability {
    pub license_id: Uuid,
    pub seat_count: i64,
    pub active_assignments: i64,
    pub available_seats: i64,
}
