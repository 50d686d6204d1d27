use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ValidationError;
use crate::model::ids::{CourseId, EnrollmentId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl EnrollmentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "PENDING",
            EnrollmentStatus::Active => "ACTIVE",
            EnrollmentStatus::Completed => "COMPLETED",
            EnrollmentStatus::Cancelled => "CANCELLED",
            EnrollmentStatus::Expired => "EXPIRED",
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(EnrollmentStatus::Pending),
            "ACTIVE" => Ok(EnrollmentStatus::Active),
            "COMPLETED" => Ok(EnrollmentStatus::Completed),
            "CANCELLED" => Ok(EnrollmentStatus::Cancelled),
            "EXPIRED" => Ok(EnrollmentStatus::Expired),
            _ => Err(ValidationError::InvalidStatus(s.to_owned())),
        }
    }
}

/// A user's enrollment in a single course, independent of any path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == EnrollmentStatus::Completed
    }

    /// Move to `status`, keeping `completed_at` in step with the COMPLETED state.
    ///
    /// Returns `true` if the status changed.
    pub fn transition_to(&mut self, status: EnrollmentStatus, now: DateTime<Utc>) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.completed_at = if status == EnrollmentStatus::Completed {
            Some(now)
        } else {
            None
        };
        true
    }
}

/// Enrollment that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}

impl NewEnrollment {
    #[must_use]
    pub fn active(user_id: UserId, course_id: CourseId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            course_id,
            status: EnrollmentStatus::Active,
            enrolled_at: now,
        }
    }

    #[must_use]
    pub fn into_enrollment(self, id: EnrollmentId) -> Enrollment {
        let completed_at = (self.status == EnrollmentStatus::Completed).then_some(self.enrolled_at);
        Enrollment {
            id,
            user_id: self.user_id,
            course_id: self.course_id,
            status: self.status,
            enrolled_at: self.enrolled_at,
            completed_at,
        }
    }
}
