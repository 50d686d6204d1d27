use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            tenant_id INTEGER NOT NULL,
            title TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS modules (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learning_paths (
            id INTEGER PRIMARY KEY,
            tenant_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL CHECK (status IN ('DRAFT', 'PUBLISHED', 'ARCHIVED')),
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learning_path_steps (
            id INTEGER PRIMARY KEY,
            path_id INTEGER NOT NULL,
            step_order INTEGER NOT NULL CHECK (step_order > 0),
            content_kind TEXT NOT NULL CHECK (content_kind IN ('course', 'module')),
            object_id INTEGER NOT NULL,
            is_required INTEGER NOT NULL DEFAULT 1,
            UNIQUE (path_id, step_order),
            FOREIGN KEY (path_id) REFERENCES learning_paths(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            status TEXT NOT NULL
                CHECK (status IN ('PENDING', 'ACTIVE', 'COMPLETED', 'CANCELLED', 'EXPIRED')),
            enrolled_at TEXT NOT NULL,
            completed_at TEXT,
            UNIQUE (user_id, course_id),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learning_path_progress (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            path_id INTEGER NOT NULL,
            status TEXT NOT NULL
                CHECK (status IN ('NOT_STARTED', 'IN_PROGRESS', 'COMPLETED', 'PAUSED')),
            started_at TEXT,
            completed_at TEXT,
            current_step_order INTEGER NOT NULL DEFAULT 0 CHECK (current_step_order >= 0),
            UNIQUE (user_id, path_id),
            FOREIGN KEY (path_id) REFERENCES learning_paths(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learning_path_step_progress (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            path_progress_id INTEGER NOT NULL,
            step_id INTEGER NOT NULL,
            status TEXT NOT NULL
                CHECK (status IN ('NOT_STARTED', 'IN_PROGRESS', 'COMPLETED', 'SKIPPED')),
            started_at TEXT,
            completed_at TEXT,
            UNIQUE (user_id, step_id),
            FOREIGN KEY (path_progress_id) REFERENCES learning_path_progress(id) ON DELETE CASCADE,
            FOREIGN KEY (step_id) REFERENCES learning_path_steps(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_steps_content
            ON learning_path_steps (content_kind, object_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_paths_tenant_status
            ON learning_paths (tenant_id, status);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_step_progress_owner
            ON learning_path_step_progress (path_progress_id);
    ",
];

/// Runs the versioned migrations for the current schema.
///
/// Version 1 creates the catalog mirror, paths, steps, enrollments and both progress tables.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
