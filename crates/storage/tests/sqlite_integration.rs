use lms_core::model::{
    ContentRef, Course, CourseId, EnrollmentStatus, Module, ModuleId, NewEnrollment, NewPath,
    NewPathProgress, NewStep, NewStepProgress, PathProgressStatus, PathStatus, StepProgressStatus,
    TenantId, UserId,
};
use lms_core::time::fixed_now;
use storage::repository::{
    CatalogRepository, EnrollmentQueries, PathQueries, PathStore, ProgressQueries, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!(
        "sqlite:file:{name}?mode=memory&cache=shared"
    ))
    .await
    .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seed_course(repo: &SqliteRepository, id: u64, tenant: u64) -> Course {
    let course = Course {
        id: CourseId::new(id),
        tenant_id: TenantId::new(tenant),
        title: format!("Course {id}"),
    };
    repo.upsert_course(&course).await.unwrap();
    course
}

fn course_step(path: lms_core::model::PathId, order: u32, course: CourseId) -> NewStep {
    NewStep {
        path_id: path,
        order,
        content: ContentRef::Course(course),
        is_required: true,
    }
}

#[tokio::test]
async fn sqlite_roundtrip_persists_paths_steps_and_progress() {
    let repo = connect("memdb_roundtrip").await;
    let course = seed_course(&repo, 1, 1).await;
    repo.upsert_module(&Module {
        id: ModuleId::new(10),
        course_id: course.id,
        title: "Intro".into(),
    })
    .await
    .unwrap();

    let mut tx = repo.begin().await.unwrap();
    let path = tx
        .insert_path(
            NewPath::new(TenantId::new(1), "Rust Basics", "", PathStatus::Published, fixed_now())
                .unwrap(),
        )
        .await
        .unwrap();
    let s1 = tx
        .insert_step(course_step(path.id, 1, course.id))
        .await
        .unwrap();
    let s2 = tx
        .insert_step(NewStep {
            path_id: path.id,
            order: 2,
            content: ContentRef::Module(ModuleId::new(10)),
            is_required: false,
        })
        .await
        .unwrap();

    let mut progress = tx
        .insert_path_progress(NewPathProgress {
            user_id: UserId::new(7),
            path_id: path.id,
        })
        .await
        .unwrap();
    let mut row = tx
        .insert_step_progress(NewStepProgress {
            user_id: UserId::new(7),
            path_progress_id: progress.id,
            step_id: s1.id,
        })
        .await
        .unwrap();
    row.mark_completed(fixed_now());
    tx.update_step_progress(&row).await.unwrap();
    progress.status = PathProgressStatus::InProgress;
    progress.started_at = Some(fixed_now());
    progress.current_step_order = 1;
    tx.update_path_progress(&progress).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = repo.begin().await.unwrap();
    let fetched = tx.get_path(path.id).await.unwrap().unwrap();
    assert_eq!(fetched.slug, "rust-basics");
    assert_eq!(fetched.created_at, fixed_now());

    let steps = tx.steps_for_path(path.id).await.unwrap();
    assert_eq!(steps, vec![s1.clone(), s2.clone()]);
    assert!(!steps[1].is_required);

    let stored = tx
        .find_path_progress(UserId::new(7), path.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, progress);
    let rows = tx.step_progress_for(progress.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, StepProgressStatus::Completed);
    assert_eq!(rows[0].completed_at, Some(fixed_now()));
}

#[tokio::test]
async fn sqlite_rollback_discards_writes() {
    let repo = connect("memdb_rollback").await;
    let course = seed_course(&repo, 1, 1).await;

    let mut tx = repo.begin().await.unwrap();
    let path = tx
        .insert_path(
            NewPath::new(TenantId::new(1), "Draft", "", PathStatus::Draft, fixed_now()).unwrap(),
        )
        .await
        .unwrap();
    tx.insert_step(course_step(path.id, 1, course.id))
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    let mut tx = repo.begin().await.unwrap();
    assert!(tx.get_path(path.id).await.unwrap().is_none());
    assert!(!tx.slug_exists("draft").await.unwrap());
}

#[tokio::test]
async fn sqlite_reports_constraint_violations_as_conflicts() {
    let repo = connect("memdb_conflicts").await;
    let course = seed_course(&repo, 1, 1).await;

    let mut tx = repo.begin().await.unwrap();
    let path = tx
        .insert_path(
            NewPath::new(TenantId::new(1), "Dup", "", PathStatus::Draft, fixed_now()).unwrap(),
        )
        .await
        .unwrap();
    let dup_slug =
        NewPath::new(TenantId::new(2), "Dup", "", PathStatus::Draft, fixed_now()).unwrap();
    assert!(matches!(
        tx.insert_path(dup_slug).await,
        Err(StorageError::Conflict(_))
    ));

    let first = tx
        .insert_step(course_step(path.id, 1, course.id))
        .await
        .unwrap();
    let second = tx
        .insert_step(course_step(path.id, 2, course.id))
        .await
        .unwrap();
    assert!(matches!(
        tx.set_step_order(second.id, first.order).await,
        Err(StorageError::Conflict(_))
    ));

    tx.insert_enrollment(NewEnrollment::active(UserId::new(1), course.id, fixed_now()))
        .await
        .unwrap();
    assert!(matches!(
        tx.insert_enrollment(NewEnrollment::active(UserId::new(1), course.id, fixed_now()))
            .await,
        Err(StorageError::Conflict(_))
    ));
}

#[tokio::test]
async fn sqlite_course_steps_filter_by_tenant_and_status() {
    let repo = connect("memdb_course_steps").await;
    let course = seed_course(&repo, 1, 1).await;

    let mut tx = repo.begin().await.unwrap();
    let mut ids = Vec::new();
    for (tenant, title, status) in [
        (1, "Published", PathStatus::Published),
        (1, "Draft", PathStatus::Draft),
        (2, "Other tenant", PathStatus::Published),
    ] {
        let path = tx
            .insert_path(
                NewPath::new(TenantId::new(tenant), title, "", status, fixed_now()).unwrap(),
            )
            .await
            .unwrap();
        tx.insert_step(course_step(path.id, 1, course.id))
            .await
            .unwrap();
        ids.push(path.id);
    }

    let published = tx
        .course_steps_in_tenant(course.id, TenantId::new(1), Some(PathStatus::Published))
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].path_id, ids[0]);

    let any = tx
        .course_steps_in_tenant(course.id, TenantId::new(1), None)
        .await
        .unwrap();
    assert_eq!(
        any.iter().map(|s| s.path_id).collect::<Vec<_>>(),
        vec![ids[0], ids[1]]
    );
}

#[tokio::test]
async fn sqlite_enrollment_updates_and_path_delete_cascades() {
    let repo = connect("memdb_cascade").await;
    let course = seed_course(&repo, 1, 1).await;

    let mut tx = repo.begin().await.unwrap();
    let mut enrollment = tx
        .insert_enrollment(NewEnrollment::active(UserId::new(3), course.id, fixed_now()))
        .await
        .unwrap();
    enrollment.transition_to(EnrollmentStatus::Completed, fixed_now());
    tx.update_enrollment(&enrollment).await.unwrap();
    let stored = tx
        .find_enrollment(UserId::new(3), course.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, EnrollmentStatus::Completed);
    assert_eq!(stored.completed_at, Some(fixed_now()));

    let path = tx
        .insert_path(
            NewPath::new(TenantId::new(1), "Gone", "", PathStatus::Published, fixed_now())
                .unwrap(),
        )
        .await
        .unwrap();
    let step = tx
        .insert_step(course_step(path.id, 1, course.id))
        .await
        .unwrap();
    let progress = tx
        .insert_path_progress(NewPathProgress {
            user_id: UserId::new(3),
            path_id: path.id,
        })
        .await
        .unwrap();
    tx.insert_step_progress(NewStepProgress {
        user_id: UserId::new(3),
        path_progress_id: progress.id,
        step_id: step.id,
    })
    .await
    .unwrap();

    tx.delete_path(path.id).await.unwrap();
    assert!(tx.get_step(step.id).await.unwrap().is_none());
    assert!(tx.get_path_progress(progress.id).await.unwrap().is_none());
    assert!(
        tx.find_step_progress(UserId::new(3), step.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(matches!(
        tx.delete_path(path.id).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sqlite_read_transaction_does_not_wait_for_an_open_writer() {
    let file = std::env::temp_dir().join(format!("lms-read-tx-{}.sqlite3", std::process::id()));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", file.display()));
    }
    std::fs::File::create(&file).unwrap();
    let repo = SqliteRepository::connect(&format!("sqlite://{}", file.display()))
        .await
        .unwrap();
    repo.migrate().await.unwrap();

    let mut writer = repo.begin().await.unwrap();
    writer
        .insert_path(
            NewPath::new(TenantId::new(1), "Pending", "", PathStatus::Draft, fixed_now()).unwrap(),
        )
        .await
        .unwrap();

    let mut reader = repo.begin_read().await.unwrap();
    assert!(reader.list_paths(TenantId::new(1)).await.unwrap().is_empty());
    reader.rollback().await.unwrap();
    writer.rollback().await.unwrap();

    let mut after = repo.begin_read().await.unwrap();
    assert!(after.list_paths(TenantId::new(1)).await.unwrap().is_empty());
    after.rollback().await.unwrap();

    drop(repo);
    let _ = std::fs::remove_file(file);
}
