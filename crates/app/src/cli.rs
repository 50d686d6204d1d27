use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use lms_core::model::{
    ContentKindInput, CourseId, EnrollmentId, EnrollmentStatus, ModuleId, PathId, PathProgressId,
    PathStatus, StepContentInput, StepId, TenantId, UserId,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid --db value: {raw}")]
    InvalidDbUrl { raw: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Parser)]
#[command(name = "lms")]
#[command(about = "Learning-path progress engine over a SQLite database")]
pub struct Cli {
    /// SQLite database URL or file path
    #[arg(long = "db", env = "LMS_DB_URL", default_value = "sqlite://lms.sqlite3", global = true)]
    pub db_url: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LMS_LOG_JSON", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or upgrade the schema and exit
    Migrate,
    /// Insert a small tenant with two courses and a published path
    SeedDemo,
    /// Insert or replace a course
    AddCourse {
        #[arg(long)]
        id: CourseId,
        #[arg(long)]
        tenant: TenantId,
        #[arg(long)]
        title: String,
    },
    /// Insert or replace a module of a course
    AddModule {
        #[arg(long)]
        id: ModuleId,
        #[arg(long)]
        course: CourseId,
        #[arg(long)]
        title: String,
    },
    /// Create a learning path with a unique slug
    CreatePath {
        #[arg(long)]
        tenant: TenantId,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "DRAFT")]
        status: PathStatus,
    },
    /// Change a path's status
    SetPathStatus {
        #[arg(long)]
        path: PathId,
        #[arg(long)]
        status: PathStatus,
    },
    /// List a tenant's paths
    ListPaths {
        #[arg(long)]
        tenant: TenantId,
    },
    /// Append a step to a path
    AddStep {
        #[arg(long)]
        path: PathId,
        #[command(flatten)]
        content: ContentArgs,
        /// Mark the step optional
        #[arg(long)]
        optional: bool,
    },
    /// Delete a step and close the gap it leaves
    DeleteStep {
        #[arg(long)]
        path: PathId,
        #[arg(long)]
        step: StepId,
    },
    /// Reorder every step of a path
    Reorder {
        #[arg(long)]
        path: PathId,
        /// Step ids in their new order, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        steps: Vec<StepId>,
    },
    /// Enroll a user in one course
    Enroll {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        course: CourseId,
    },
    /// Change a course enrollment's status and sync path progress
    SetEnrollmentStatus {
        #[arg(long)]
        enrollment: EnrollmentId,
        #[arg(long)]
        status: EnrollmentStatus,
    },
    /// Re-run progress sync for an enrollment
    Sync {
        #[arg(long)]
        enrollment: EnrollmentId,
    },
    /// Enroll a user in a path and every course it references
    EnrollPath {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        path: PathId,
    },
    /// Start (or resume) a path
    Start {
        #[arg(long)]
        progress: PathProgressId,
    },
    Pause {
        #[arg(long)]
        progress: PathProgressId,
    },
    Resume {
        #[arg(long)]
        progress: PathProgressId,
    },
    /// Mark a step completed
    CompleteStep {
        #[arg(long)]
        progress: PathProgressId,
        #[arg(long)]
        step: StepId,
    },
    /// Reset a step to not started
    ResetStep {
        #[arg(long)]
        progress: PathProgressId,
        #[arg(long)]
        step: StepId,
    },
    /// Show a progress report
    Progress {
        #[arg(long)]
        progress: PathProgressId,
    },
    /// List every path progress of a user
    ListProgress {
        #[arg(long)]
        user: UserId,
    },
}

#[derive(Debug, Args)]
pub struct ContentArgs {
    /// Content kind: `course`, `module`, or a numeric content type id
    #[arg(long)]
    pub kind: String,
    #[arg(long = "object-id")]
    pub object_id: u64,
}

impl ContentArgs {
    #[must_use]
    pub fn into_input(self) -> StepContentInput {
        let kind = match self.kind.trim().parse::<u64>() {
            Ok(type_id) => ContentKindInput::ById(type_id),
            Err(_) => ContentKindInput::ByKind(self.kind),
        };
        StepContentInput {
            kind,
            object_id: self.object_id,
        }
    }
}

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }
    if trimmed.starts_with("sqlite:file:") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file and its directory exist before connecting.
///
/// # Errors
///
/// Returns `CliError::InvalidDbUrl` for an empty path and `CliError::Io` if
/// the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), CliError> {
    if db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| CliError::InvalidDbUrl {
            raw: db_url.to_owned(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(CliError::InvalidDbUrl {
            raw: db_url.to_owned(),
        });
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}
