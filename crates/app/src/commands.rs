use lms_core::model::{
    Course, CourseId, Module, ModuleId, PathStatus, StepContentInput, TenantId,
};
use serde::Serialize;
use services::LmsServices;
use storage::repository::CatalogRepository;
use tracing::info;

use crate::cli::Command;

type CommandResult = Result<serde_json::Value, Box<dyn std::error::Error>>;

fn json(value: &impl Serialize) -> CommandResult {
    Ok(serde_json::to_value(value)?)
}

/// Run one subcommand and return its JSON output.
///
/// # Errors
///
/// Returns the service error of the failed operation.
pub async fn execute(services: &LmsServices, command: Command) -> CommandResult {
    match command {
        Command::Migrate => Ok(serde_json::json!({ "migrated": true })),
        Command::SeedDemo => seed_demo(services).await,
        Command::AddCourse { id, tenant, title } => {
            let course = Course {
                id,
                tenant_id: tenant,
                title,
            };
            services.catalog().upsert_course(&course).await?;
            json(&course)
        }
        Command::AddModule { id, course, title } => {
            let module = Module {
                id,
                course_id: course,
                title,
            };
            services.catalog().upsert_module(&module).await?;
            json(&module)
        }
        Command::CreatePath {
            tenant,
            title,
            description,
            status,
        } => json(
            &services
                .authoring()
                .create_path(tenant, &title, &description, status)
                .await?,
        ),
        Command::SetPathStatus { path, status } => {
            json(&services.authoring().set_path_status(path, status).await?)
        }
        Command::ListPaths { tenant } => json(&services.authoring().list_paths(tenant).await?),
        Command::AddStep {
            path,
            content,
            optional,
        } => json(
            &services
                .authoring()
                .add_step(path, content.into_input(), !optional)
                .await?,
        ),
        Command::DeleteStep { path, step } => {
            services.authoring().delete_step(path, step).await?;
            json(&services.authoring().list_steps(path).await?)
        }
        Command::Reorder { path, steps } => {
            json(&services.authoring().reorder_steps(path, &steps).await?)
        }
        Command::Enroll { user, course } => {
            let (enrollment, created) = services.enrollments().enroll(user, course).await?;
            Ok(serde_json::json!({ "enrollment": enrollment, "created": created }))
        }
        Command::SetEnrollmentStatus { enrollment, status } => json(
            &services
                .enrollments()
                .set_status(enrollment, status)
                .await?,
        ),
        Command::Sync { enrollment } => {
            let touched = services.sync().sync(enrollment).await?;
            Ok(serde_json::json!({ "progress_touched": touched }))
        }
        Command::EnrollPath { user, path } => {
            json(&services.path_enrollment().enroll_in_path(user, path).await?)
        }
        Command::Start { progress } => json(&services.progress().start(progress).await?),
        Command::Pause { progress } => json(&services.progress().pause(progress).await?),
        Command::Resume { progress } => json(&services.progress().resume(progress).await?),
        Command::CompleteStep { progress, step } => {
            json(&services.progress().complete_step(progress, step).await?)
        }
        Command::ResetStep { progress, step } => {
            json(&services.progress().reset_step(progress, step).await?)
        }
        Command::Progress { progress } => json(&services.progress().report(progress).await?),
        Command::ListProgress { user } => json(&services.progress().list_for_user(user).await?),
    }
}

/// Tenant 1 with two courses (the second with a module) and a published path over them.
async fn seed_demo(services: &LmsServices) -> CommandResult {
    let tenant = TenantId::new(1);
    let catalog = services.catalog();
    for (id, title) in [(1, "Intro to Rust"), (2, "Async Rust")] {
        catalog
            .upsert_course(&Course {
                id: CourseId::new(id),
                tenant_id: tenant,
                title: title.to_owned(),
            })
            .await?;
    }
    catalog
        .upsert_module(&Module {
            id: ModuleId::new(1),
            course_id: CourseId::new(2),
            title: "Pinning".to_owned(),
        })
        .await?;

    let authoring = services.authoring();
    let path = authoring
        .create_path(
            tenant,
            "Rust Foundations",
            "From ownership to async",
            PathStatus::Published,
        )
        .await?;
    let contents = [
        StepContentInput::course(CourseId::new(1)),
        StepContentInput::course(CourseId::new(2)),
        StepContentInput::module(ModuleId::new(1)),
    ];
    for content in contents {
        authoring.add_step(path.id, content, true).await?;
    }
    let steps = authoring.list_steps(path.id).await?;
    info!(path_id = %path.id, slug = %path.slug, steps = steps.len(), "demo data seeded");

    Ok(serde_json::json!({ "path": path, "steps": steps }))
}
