use lms_core::model::{CourseId, Enrollment, EnrollmentId, NewEnrollment, UserId};

use super::SqliteTx;
use super::mapping::{db, id_to_i64, map_enrollment_row};
use crate::repository::{EnrollmentQueries, StorageError};

#[async_trait::async_trait]
impl EnrollmentQueries for SqliteTx {
    async fn get_enrollment(
        &mut self,
        id: EnrollmentId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, course_id, status, enrolled_at, completed_at
            FROM enrollments WHERE id = ?1
            ",
        )
        .bind(id_to_i64("enrollment_id", id.value())?)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn find_enrollment(
        &mut self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, course_id, status, enrolled_at, completed_at
            FROM enrollments WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user.value())?)
        .bind(id_to_i64("course_id", course.value())?)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn insert_enrollment(
        &mut self,
        enrollment: NewEnrollment,
    ) -> Result<Enrollment, StorageError> {
        let draft = enrollment.into_enrollment(EnrollmentId::new(0));
        let res = sqlx::query(
            r"
            INSERT INTO enrollments (user_id, course_id, status, enrolled_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_to_i64("user_id", draft.user_id.value())?)
        .bind(id_to_i64("course_id", draft.course_id.value())?)
        .bind(draft.status.as_str())
        .bind(draft.enrolled_at)
        .bind(draft.completed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("enrollment_id sign overflow".into()))?;
        Ok(Enrollment {
            id: EnrollmentId::new(id),
            ..draft
        })
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE enrollments SET status = ?1, completed_at = ?2
            WHERE id = ?3
            ",
        )
        .bind(enrollment.status.as_str())
        .bind(enrollment.completed_at)
        .bind(id_to_i64("enrollment_id", enrollment.id.value())?)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
