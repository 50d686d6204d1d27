use lms_core::model::{
    Course, CourseId, EnrollmentStatus, LearningPath, LearningPathStep, NewStep, PathId,
    PathProgressStatus, PathStatus, StepContentInput, StepProgressStatus, TenantId, UserId,
};
use lms_core::time::{fixed_clock, fixed_now};
use lms_core::{Clock, ValidationError};
use services::{LmsServices, PathServiceError, ProgressReport};
use storage::repository::{CatalogRepository, PathQueries, PathStore, Storage};

const TENANT: TenantId = TenantId::new(1);
const OTHER_TENANT: TenantId = TenantId::new(2);
const USER: UserId = UserId::new(7);

async fn services_with_courses(courses: &[(u64, TenantId)]) -> (LmsServices, Storage) {
    let storage = Storage::in_memory();
    let services = LmsServices::from_storage(&storage, fixed_clock());
    seed_courses(&services, courses).await;
    (services, storage)
}

async fn seed_courses(services: &LmsServices, courses: &[(u64, TenantId)]) {
    for (id, tenant) in courses {
        services
            .catalog()
            .upsert_course(&Course {
                id: CourseId::new(*id),
                tenant_id: *tenant,
                title: format!("Course {id}"),
            })
            .await
            .unwrap();
    }
}

async fn path_over_courses(
    services: &LmsServices,
    title: &str,
    courses: &[u64],
) -> (LearningPath, Vec<LearningPathStep>) {
    let authoring = services.authoring();
    let path = authoring
        .create_path(TENANT, title, "", PathStatus::Published)
        .await
        .unwrap();
    let mut steps = Vec::new();
    for id in courses {
        let step = authoring
            .add_step(path.id, StepContentInput::course(CourseId::new(*id)), true)
            .await
            .unwrap();
        steps.push(step);
    }
    (path, steps)
}

fn step_status(report: &ProgressReport, step: &LearningPathStep) -> StepProgressStatus {
    report
        .steps
        .iter()
        .find(|row| row.step_id == step.id)
        .map(|row| row.status)
        .unwrap()
}

async fn run_two_course_scenario(services: &LmsServices) {
    let (path, steps) = path_over_courses(services, "Rust Basics", &[1, 2]).await;

    let enrolled = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap();
    assert!(enrolled.created);
    assert_eq!(enrolled.progress.status, PathProgressStatus::NotStarted);
    assert_eq!(enrolled.progress.current_step_order, 0);
    assert_eq!(enrolled.course_enrollments.len(), 2);
    assert!(
        enrolled
            .course_enrollments
            .iter()
            .all(|e| e.status == EnrollmentStatus::Active)
    );

    let progress = services.progress();
    let report = progress.report(enrolled.progress.id).await.unwrap();
    assert_eq!(report.steps.len(), 2);
    assert!(
        report
            .steps
            .iter()
            .all(|row| row.status == StepProgressStatus::NotStarted)
    );

    let first = enrolled.course_enrollments[0].id;
    let second = enrolled.course_enrollments[1].id;
    let enrollments = services.enrollments();

    let changed = enrollments
        .set_status(first, EnrollmentStatus::Completed)
        .await
        .unwrap();
    assert!(changed.changed);
    assert!(changed.progress_touched);
    let report = progress.report(enrolled.progress.id).await.unwrap();
    assert_eq!(step_status(&report, &steps[0]), StepProgressStatus::Completed);
    assert_eq!(report.progress.status, PathProgressStatus::InProgress);
    assert_eq!(report.progress.current_step_order, 1);
    assert!(report.progress.started_at.is_some());
    assert_eq!(report.next_step.as_ref().map(|s| s.id), Some(steps[1].id));

    enrollments
        .set_status(second, EnrollmentStatus::Completed)
        .await
        .unwrap();
    let report = progress.report(enrolled.progress.id).await.unwrap();
    assert_eq!(step_status(&report, &steps[1]), StepProgressStatus::Completed);
    assert_eq!(report.progress.status, PathProgressStatus::Completed);
    assert_eq!(report.progress.current_step_order, 2);
    assert!(report.progress.completed_at.is_some());
    assert!((report.progress_percentage - 100.0).abs() < f64::EPSILON);

    enrollments
        .set_status(first, EnrollmentStatus::Active)
        .await
        .unwrap();
    let report = progress.report(enrolled.progress.id).await.unwrap();
    let reverted = report
        .steps
        .iter()
        .find(|row| row.step_id == steps[0].id)
        .unwrap();
    assert_eq!(reverted.status, StepProgressStatus::InProgress);
    assert_eq!(reverted.completed_at, None);
    assert_eq!(report.progress.status, PathProgressStatus::InProgress);
    assert_eq!(report.progress.completed_at, None);
}

#[tokio::test]
async fn two_course_path_follows_enrollment_status() {
    let (services, _storage) =
        services_with_courses(&[(1, TENANT), (2, TENANT)]).await;
    run_two_course_scenario(&services).await;
}

#[tokio::test]
async fn two_course_path_follows_enrollment_status_on_sqlite() {
    let services = LmsServices::new_sqlite(
        "sqlite:file:services_two_course_flow?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
    )
    .await
    .unwrap();
    seed_courses(&services, &[(1, TENANT), (2, TENANT)]).await;
    run_two_course_scenario(&services).await;
}

#[tokio::test]
async fn completion_sync_twice_matches_once() {
    let (services, _storage) = services_with_courses(&[(1, TENANT), (2, TENANT)]).await;
    let (path, _) = path_over_courses(&services, "Twice", &[1, 2]).await;
    let enrolled = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap();
    let enrollment = enrolled.course_enrollments[0].id;
    services
        .enrollments()
        .set_status(enrollment, EnrollmentStatus::Completed)
        .await
        .unwrap();

    let sync = services.sync();
    let once = services.progress().report(enrolled.progress.id).await.unwrap();
    assert!(!sync.apply_course_completion(enrollment).await.unwrap());
    assert!(!sync.sync(enrollment).await.unwrap());
    let twice = services.progress().report(enrolled.progress.id).await.unwrap();
    assert_eq!(once, twice);
}

#[tokio::test]
async fn enrolling_in_an_empty_path_completes_it() {
    let (services, _storage) = services_with_courses(&[]).await;
    let path = services
        .authoring()
        .create_path(TENANT, "Nothing Yet", "", PathStatus::Draft)
        .await
        .unwrap();

    let enrolled = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap();
    assert_eq!(enrolled.progress.status, PathProgressStatus::Completed);
    assert!(enrolled.progress.completed_at.is_some());
    assert!(enrolled.course_enrollments.is_empty());

    let report = services.progress().report(enrolled.progress.id).await.unwrap();
    assert_eq!(report.total_steps, 0);
    assert!(report.progress_percentage.abs() < f64::EPSILON);
}

#[tokio::test]
async fn repeat_path_enrollment_reuses_progress_and_enrollments() {
    let (services, _storage) = services_with_courses(&[(1, TENANT)]).await;
    let (path, _) = path_over_courses(&services, "Again", &[1, 1]).await;
    let cascade = services.path_enrollment();

    let first = cascade.enroll_in_path(USER, path.id).await.unwrap();
    let second = cascade.enroll_in_path(USER, path.id).await.unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.progress.id, second.progress.id);
    assert_eq!(first.course_enrollments.len(), 1);
    assert_eq!(first.course_enrollments, second.course_enrollments);
}

#[tokio::test]
async fn current_step_order_tracks_highest_completed_step() {
    let (services, _storage) =
        services_with_courses(&[(1, TENANT), (2, TENANT), (3, TENANT)]).await;
    let (path, steps) = path_over_courses(&services, "Ordered", &[1, 2, 3]).await;
    let progress = services.progress();
    let id = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap()
        .progress
        .id;

    let mut last = 0;
    for step in &steps {
        let updated = progress.complete_step(id, step.id).await.unwrap();
        assert!(updated.current_step_order > last);
        assert_eq!(updated.current_step_order, step.order);
        last = updated.current_step_order;
    }

    let (other, steps) = path_over_courses(&services, "Shuffled", &[1, 2, 3]).await;
    let id = services
        .path_enrollment()
        .enroll_in_path(USER, other.id)
        .await
        .unwrap()
        .progress
        .id;
    let after_third = progress.complete_step(id, steps[2].id).await.unwrap();
    assert_eq!(after_third.current_step_order, 3);
    let after_first = progress.complete_step(id, steps[0].id).await.unwrap();
    assert_eq!(after_first.current_step_order, 3);
    assert_eq!(after_first.status, PathProgressStatus::InProgress);
}

#[tokio::test]
async fn completing_every_required_step_closes_the_path() {
    let (services, _storage) =
        services_with_courses(&[(1, TENANT), (2, TENANT), (3, TENANT)]).await;
    let (path, steps) = path_over_courses(&services, "Close Out", &[1, 2, 3]).await;
    let progress = services.progress();
    let id = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap()
        .progress
        .id;

    for step in &steps[..2] {
        let partial = progress.complete_step(id, step.id).await.unwrap();
        assert_eq!(partial.status, PathProgressStatus::InProgress);
        assert_eq!(partial.completed_at, None);
    }
    let done = progress.complete_step(id, steps[2].id).await.unwrap();
    assert_eq!(done.status, PathProgressStatus::Completed);
    assert!(done.completed_at.is_some());

    let reopened = progress.reset_step(id, steps[1].id).await.unwrap();
    assert_eq!(reopened.status, PathProgressStatus::InProgress);
    assert_eq!(reopened.completed_at, None);
}

#[tokio::test]
async fn step_completion_resumes_a_paused_path() {
    let (services, _storage) = services_with_courses(&[(1, TENANT), (2, TENANT)]).await;
    let (path, steps) = path_over_courses(&services, "Pausable", &[1, 2]).await;
    let progress = services.progress();
    let id = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap()
        .progress
        .id;

    let started = progress.start(id).await.unwrap();
    assert_eq!(started.status, PathProgressStatus::InProgress);
    let paused = progress.pause(id).await.unwrap();
    assert_eq!(paused.status, PathProgressStatus::Paused);
    assert!(progress.pause(id).await.is_err());

    let resumed = progress.complete_step(id, steps[0].id).await.unwrap();
    assert_eq!(resumed.status, PathProgressStatus::InProgress);
    assert_eq!(resumed.current_step_order, 1);
}

#[tokio::test]
async fn every_permutation_reorders_densely() {
    let (services, _storage) =
        services_with_courses(&[(1, TENANT), (2, TENANT), (3, TENANT)]).await;
    let (path, steps) = path_over_courses(&services, "Permute", &[1, 2, 3]).await;
    let authoring = services.authoring();
    let ids: Vec<_> = steps.iter().map(|s| s.id).collect();

    let permutations = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    for permutation in permutations {
        let requested: Vec<_> = permutation.iter().map(|i| ids[*i]).collect();
        let reordered = authoring.reorder_steps(path.id, &requested).await.unwrap();

        let got: Vec<_> = reordered.iter().map(|s| (s.id, s.order)).collect();
        let want: Vec<_> = requested.iter().copied().zip(1..).collect();
        assert_eq!(got, want);
    }
}

#[tokio::test]
async fn invalid_reorder_leaves_orders_untouched() {
    let (services, _storage) =
        services_with_courses(&[(1, TENANT), (2, TENANT), (3, TENANT)]).await;
    let (path, steps) = path_over_courses(&services, "Guarded", &[1, 2, 3]).await;
    let (_, foreign) = path_over_courses(&services, "Elsewhere", &[1]).await;
    let authoring = services.authoring();

    let duplicate = [steps[0].id, steps[0].id, steps[1].id];
    let stranger = [steps[0].id, steps[1].id, foreign[0].id];
    for bad in [&duplicate[..], &stranger[..]] {
        let err = authoring.reorder_steps(path.id, bad).await.unwrap_err();
        assert!(matches!(err, PathServiceError::Validation(_)));
    }

    let after = authoring.list_steps(path.id).await.unwrap();
    assert_eq!(after, steps);
}

#[tokio::test]
async fn completion_sync_stays_inside_the_course_tenant() {
    let (services, storage) = services_with_courses(&[(1, TENANT)]).await;
    let (own, _) = path_over_courses(&services, "Home", &[1]).await;
    let foreign = services
        .authoring()
        .create_path(OTHER_TENANT, "Away", "", PathStatus::Published)
        .await
        .unwrap();

    let mut tx = storage.paths.begin().await.unwrap();
    tx.insert_step(NewStep {
        path_id: foreign.id,
        order: 1,
        content: lms_core::model::ContentRef::Course(CourseId::new(1)),
        is_required: true,
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let (enrollment, created) = services
        .enrollments()
        .enroll(USER, CourseId::new(1))
        .await
        .unwrap();
    assert!(created);
    let transition = services
        .enrollments()
        .set_status(enrollment.id, EnrollmentStatus::Completed)
        .await
        .unwrap();
    assert!(transition.progress_touched);

    let all = services.progress().list_for_user(USER).await.unwrap();
    let touched: Vec<PathId> = all.iter().map(|p| p.path_id).collect();
    assert_eq!(touched, vec![own.id]);
    assert_eq!(all[0].status, PathProgressStatus::Completed);
}

#[tokio::test]
async fn completed_course_carries_into_a_later_path_enrollment() {
    let (services, _storage) = services_with_courses(&[(1, TENANT), (2, TENANT)]).await;
    let authoring = services.authoring();
    let path = authoring
        .create_path(TENANT, "Draft Path", "", PathStatus::Draft)
        .await
        .unwrap();
    let first = authoring
        .add_step(path.id, StepContentInput::course(CourseId::new(1)), true)
        .await
        .unwrap();
    authoring
        .add_step(path.id, StepContentInput::course(CourseId::new(2)), true)
        .await
        .unwrap();

    let (enrollment, _) = services
        .enrollments()
        .enroll(USER, CourseId::new(1))
        .await
        .unwrap();
    services
        .enrollments()
        .set_status(enrollment.id, EnrollmentStatus::Completed)
        .await
        .unwrap();

    let enrolled = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap();
    assert_eq!(enrolled.progress.status, PathProgressStatus::InProgress);
    assert_eq!(enrolled.progress.current_step_order, 1);
    assert_eq!(enrolled.course_enrollments[0].id, enrollment.id);
    assert_eq!(enrolled.course_enrollments[0].status, EnrollmentStatus::Completed);

    let report = services.progress().report(enrolled.progress.id).await.unwrap();
    assert_eq!(step_status(&report, &first), StepProgressStatus::Completed);
    assert_eq!(report.completed_steps, 1);
}

#[tokio::test]
async fn validation_errors_surface_from_authoring() {
    let (services, _storage) = services_with_courses(&[(1, OTHER_TENANT)]).await;
    let path = services
        .authoring()
        .create_path(TENANT, "Strict", "", PathStatus::Draft)
        .await
        .unwrap();
    let err = services
        .authoring()
        .add_step(path.id, StepContentInput::course(CourseId::new(1)), true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PathServiceError::Validation(ValidationError::ContentWrongTenant { .. })
    ));
}

#[tokio::test]
async fn deleting_a_step_recomputes_progress_on_the_path() {
    let (services, _storage) =
        services_with_courses(&[(1, TENANT), (2, TENANT), (3, TENANT)]).await;
    let (path, steps) = path_over_courses(&services, "Shrinking", &[1, 2, 3]).await;
    let progress = services.progress();
    let id = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap()
        .progress
        .id;
    progress.complete_step(id, steps[1].id).await.unwrap();
    progress.complete_step(id, steps[2].id).await.unwrap();

    services
        .authoring()
        .delete_step(path.id, steps[0].id)
        .await
        .unwrap();

    let report = progress.report(id).await.unwrap();
    assert_eq!(report.completed_steps, 2);
    assert_eq!(report.total_steps, 2);
    assert_eq!(report.progress.status, PathProgressStatus::Completed);
    assert!(report.progress.completed_at.is_some());
    assert_eq!(report.progress.current_step_order, 2);
}

#[tokio::test]
async fn adding_a_step_reopens_a_completed_path() {
    let (services, _storage) = services_with_courses(&[(1, TENANT), (2, TENANT)]).await;
    let (path, steps) = path_over_courses(&services, "Growing", &[1]).await;
    let progress = services.progress();
    let id = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap()
        .progress
        .id;
    let done = progress.complete_step(id, steps[0].id).await.unwrap();
    assert_eq!(done.status, PathProgressStatus::Completed);

    let added = services
        .authoring()
        .add_step(path.id, StepContentInput::course(CourseId::new(2)), true)
        .await
        .unwrap();

    let report = progress.report(id).await.unwrap();
    assert_eq!(report.progress.status, PathProgressStatus::InProgress);
    assert_eq!(report.progress.completed_at, None);
    assert_eq!(report.progress.current_step_order, 1);
    assert_eq!(report.next_step.map(|s| s.id), Some(added.id));
}

#[tokio::test]
async fn reordering_moves_current_step_order_with_the_completed_step() {
    let (services, _storage) =
        services_with_courses(&[(1, TENANT), (2, TENANT), (3, TENANT)]).await;
    let (path, steps) = path_over_courses(&services, "Rearranged", &[1, 2, 3]).await;
    let progress = services.progress();
    let id = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap()
        .progress
        .id;
    let first = progress.complete_step(id, steps[0].id).await.unwrap();
    assert_eq!(first.current_step_order, 1);

    services
        .authoring()
        .reorder_steps(path.id, &[steps[1].id, steps[2].id, steps[0].id])
        .await
        .unwrap();

    let report = progress.report(id).await.unwrap();
    assert_eq!(report.progress.current_step_order, 3);
    assert_eq!(report.progress.status, PathProgressStatus::InProgress);
    assert_eq!(report.next_step, None);
}

fn temp_sqlite_url(name: &str) -> (String, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("lms-{name}-{}.sqlite3", std::process::id()));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
    std::fs::File::create(&path).unwrap();
    (format!("sqlite://{}", path.display()), path)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_course_completions_both_land_on_sqlite() {
    let (url, file) = temp_sqlite_url("concurrent-completions");
    let services = LmsServices::new_sqlite(&url, fixed_clock()).await.unwrap();
    seed_courses(&services, &[(1, TENANT), (2, TENANT)]).await;
    let (path, _) = path_over_courses(&services, "Raced", &[1, 2]).await;
    let enrolled = services
        .path_enrollment()
        .enroll_in_path(USER, path.id)
        .await
        .unwrap();

    let spawn_completion = |enrollment| {
        let enrollments = services.enrollments();
        tokio::spawn(async move {
            enrollments
                .set_status(enrollment, EnrollmentStatus::Completed)
                .await
        })
    };
    let first = spawn_completion(enrolled.course_enrollments[0].id);
    let second = spawn_completion(enrolled.course_enrollments[1].id);
    let (first, second) = tokio::join!(first, second);
    assert!(first.unwrap().unwrap().changed);
    assert!(second.unwrap().unwrap().changed);

    let report = services.progress().report(enrolled.progress.id).await.unwrap();
    assert_eq!(report.progress.status, PathProgressStatus::Completed);
    assert_eq!(report.completed_steps, 2);
    assert_eq!(report.total_steps, 2);

    drop(services);
    let _ = std::fs::remove_file(file);
}
