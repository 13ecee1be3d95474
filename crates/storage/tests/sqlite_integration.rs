use chrono::Duration;
use lesson_core::model::{
    CourseChainEntry, CourseId, Enrollment, EnrollmentUpdate, Lesson, LessonId, MediaRef,
    PackageId, ProgressPercent, ProgressRecord, ProgressUpdate, UserId,
};
use lesson_core::time::fixed_now;
use storage::repository::{
    CourseChainRepository, EnrollmentRepository, LessonRepository, ProgressRepository,
    StorageError,
};
use storage::sqlite::SqliteRepository;

fn build_lesson(id: u64, course: u64, order: u32) -> Lesson {
    Lesson::new(
        LessonId::new(id),
        CourseId::new(course),
        format!("Lesson {id}"),
        order,
        300,
        MediaRef::new(format!("video-{id}")).unwrap(),
    )
    .unwrap()
}

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn pct(v: u32) -> ProgressPercent {
    ProgressPercent::new(v).unwrap()
}

#[tokio::test]
async fn sqlite_lists_lessons_in_course_order() {
    let repo = connect("memdb_lessons").await;
    repo.upsert_lesson(&build_lesson(12, 1, 1)).await.unwrap();
    repo.upsert_lesson(&build_lesson(11, 1, 0)).await.unwrap();
    repo.upsert_lesson(&build_lesson(21, 2, 0)).await.unwrap();

    let lessons = repo.list_lessons(CourseId::new(1)).await.unwrap();
    let ids: Vec<_> = lessons.iter().map(Lesson::id).collect();
    assert_eq!(ids, vec![LessonId::new(11), LessonId::new(12)]);

    let fetched = repo.get_lesson(LessonId::new(21)).await.unwrap().unwrap();
    assert_eq!(fetched.media().as_str(), "video-21");
    assert!(repo.get_lesson(LessonId::new(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_progress_upsert_is_monotone_and_sticky() {
    let repo = connect("memdb_progress").await;
    repo.upsert_lesson(&build_lesson(1, 1, 0)).await.unwrap();
    let (user, lesson, course) = (UserId::new(5), LessonId::new(1), CourseId::new(1));
    let now = fixed_now();

    repo.upsert_progress(user, lesson, course, &ProgressUpdate::watched(pct(40), false, now))
        .await
        .unwrap();
    repo.upsert_progress(
        user,
        lesson,
        course,
        &ProgressUpdate::watched(pct(25), false, now + Duration::seconds(10)),
    )
    .await
    .unwrap();
    let record = repo.get_progress(user, lesson).await.unwrap().unwrap();
    assert_eq!(record.progress_percent(), pct(40));
    assert!(!record.completed());

    let completed_at = now + Duration::minutes(1);
    repo.upsert_progress(user, lesson, course, &ProgressUpdate::completion(completed_at))
        .await
        .unwrap();
    repo.upsert_progress(
        user,
        lesson,
        course,
        &ProgressUpdate::completion(completed_at + Duration::days(1)),
    )
    .await
    .unwrap();
    repo.upsert_progress(
        user,
        lesson,
        course,
        &ProgressUpdate::watched(pct(5), false, completed_at + Duration::days(2)),
    )
    .await
    .unwrap();

    let records = repo.list_progress(user, course).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!(record.completed());
    assert_eq!(record.progress_percent(), ProgressPercent::COMPLETE);
    assert_eq!(record.completed_at(), Some(completed_at));
}

#[tokio::test]
async fn sqlite_last_watched_matches_in_memory_merge() {
    let repo = connect("memdb_last_watched").await;
    repo.upsert_lesson(&build_lesson(1, 1, 0)).await.unwrap();
    let (user, lesson, course) = (UserId::new(6), LessonId::new(1), CourseId::new(1));
    let later = fixed_now() + Duration::hours(1);

    repo.upsert_progress(user, lesson, course, &ProgressUpdate::watched(pct(30), false, later))
        .await
        .unwrap();
    repo.upsert_progress(user, lesson, course, &ProgressUpdate::completion(fixed_now()))
        .await
        .unwrap();

    let stored = repo.get_progress(user, lesson).await.unwrap().unwrap();
    assert_eq!(stored.last_watched_at(), later);
    assert_eq!(stored.completed_at(), Some(fixed_now()));

    let mut expected = ProgressRecord::from_update(
        user,
        lesson,
        course,
        &ProgressUpdate::watched(pct(30), false, later),
    );
    expected.apply_update(&ProgressUpdate::completion(fixed_now()));
    assert_eq!(stored, expected);
}

#[tokio::test]
async fn sqlite_enrollment_completion_keeps_first_date() {
    let repo = connect("memdb_enrollments").await;
    let (user, course) = (UserId::new(1), CourseId::new(7));

    let missing = repo
        .update_enrollment(user, course, EnrollmentUpdate::completed_at(fixed_now()))
        .await;
    assert!(matches!(missing, Err(StorageError::NotFound)));

    repo.insert_enrollment(&Enrollment::new(user, course)).await.unwrap();
    repo.update_enrollment(user, course, EnrollmentUpdate::completed_at(fixed_now()))
        .await
        .unwrap();
    repo.update_enrollment(
        user,
        course,
        EnrollmentUpdate::completed_at(fixed_now() + Duration::days(1)),
    )
    .await
    .unwrap();

    let enrollment = repo.get_enrollment(user, course).await.unwrap().unwrap();
    assert!(enrollment.completed());
    assert_eq!(enrollment.completion_date(), Some(fixed_now()));
}

#[tokio::test]
async fn sqlite_course_chain_orders_entries_and_rejects_clashes() {
    let repo = connect("memdb_chain").await;
    let package = PackageId::new(3);
    for (course, order) in [(30, 2), (10, 0), (20, 1)] {
        repo.upsert_chain_entry(&CourseChainEntry {
            course_id: CourseId::new(course),
            package_id: package,
            order_index: order,
        })
        .await
        .unwrap();
    }

    let chain = repo.list_course_chain(package).await.unwrap();
    let courses: Vec<_> = chain.iter().map(|e| e.course_id.value()).collect();
    assert_eq!(courses, vec![10, 20, 30]);

    let entry = repo.chain_entry_for_course(CourseId::new(20)).await.unwrap().unwrap();
    assert_eq!(entry.order_index, 1);

    let clash = repo
        .upsert_chain_entry(&CourseChainEntry {
            course_id: CourseId::new(40),
            package_id: package,
            order_index: 1,
        })
        .await;
    assert!(matches!(clash, Err(StorageError::Conflict)));
}
