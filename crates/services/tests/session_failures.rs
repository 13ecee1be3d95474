use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lesson_core::model::{
    CourseId, Lesson, LessonId, MediaRef, ProgressPercent, ProgressRecord, ProgressUpdate, UserId,
};
use lesson_core::time::{fixed_clock, fixed_now};
use services::{
    CourseChainResolver, EngineConfig, FlushOutcome, LessonSession, PlaybackAdapterFactory,
    PlaybackEvent, ProgressionServices, ScriptedPlayer, SessionState,
};
use storage::repository::{InMemoryRepository, ProgressRepository, Storage, StorageError};
use tokio::sync::mpsc;

/// Progress store whose writes fail until `heal` is called.
#[derive(Clone, Default)]
struct FlakyProgress {
    inner: InMemoryRepository,
    failing: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl FlakyProgress {
    fn broken() -> Self {
        let store = Self::default();
        store.failing.store(1, Ordering::SeqCst);
        store
    }

    fn heal(&self) {
        self.failing.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProgressRepository for FlakyProgress {
    async fn list_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.inner.list_progress(user_id, course_id).await
    }

    async fn get_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        self.inner.get_progress(user_id, lesson_id).await
    }

    async fn upsert_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        course_id: CourseId,
        update: &ProgressUpdate,
    ) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) > 0 {
            return Err(StorageError::Connection("store offline".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner
            .upsert_progress(user_id, lesson_id, course_id, update)
            .await
    }
}

fn lesson() -> Lesson {
    Lesson::new(
        LessonId::new(1),
        CourseId::new(1),
        "Only lesson",
        0,
        300,
        MediaRef::new("video-1").unwrap(),
    )
    .unwrap()
}

fn resolver(storage: &Storage) -> Arc<CourseChainResolver> {
    Arc::new(CourseChainResolver::new(
        fixed_clock(),
        Arc::clone(&storage.lessons),
        Arc::clone(&storage.progress),
        Arc::clone(&storage.enrollments),
        Arc::clone(&storage.course_chain),
    ))
}

fn session_with(
    player: &ScriptedPlayer,
    store: Arc<dyn ProgressRepository>,
    storage: &Storage,
) -> (LessonSession, mpsc::UnboundedReceiver<PlaybackEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut session = LessonSession::new(
        UserId::new(1),
        lesson(),
        None,
        player.create(tx),
        fixed_clock(),
        &EngineConfig::default(),
        store,
        resolver(storage),
    );
    session.start();
    (session, rx)
}

/// Ready the player, start it and run `secs` regular ticks.
fn watch(session: &mut LessonSession, player: &ScriptedPlayer, secs: u64) {
    session.handle_event(PlaybackEvent::Ready);
    player.play();
    session.handle_event(PlaybackEvent::StateChange(services::PlayerState::Playing));
    let t0 = Instant::now();
    session.tick(t0);
    for i in 1..=secs {
        player.advance(1.0);
        session.tick(t0 + Duration::from_secs(i));
    }
}

#[tokio::test]
async fn failed_flush_is_retried_on_next_flush() {
    let storage = Storage::in_memory();
    storage.lessons.upsert_lesson(&lesson()).await.unwrap();
    let store = FlakyProgress::broken();
    let player = ScriptedPlayer::new(300.0);
    let (mut session, _events) = session_with(&player, Arc::new(store.clone()), &storage);

    watch(&mut session, &player, 30);
    assert_eq!(session.flush().await, FlushOutcome::Failed);
    assert_eq!(session.progress().state, SessionState::Playing);

    store.heal();
    assert_eq!(
        session.flush().await,
        FlushOutcome::Written(ProgressPercent::new(10).unwrap())
    );
    assert_eq!(session.flush().await, FlushOutcome::Skipped);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn completion_write_failure_is_reported() {
    let storage = Storage::in_memory();
    storage.lessons.upsert_lesson(&lesson()).await.unwrap();
    let store = FlakyProgress::broken();
    let player = ScriptedPlayer::new(300.0);
    let (mut session, _events) = session_with(&player, Arc::new(store.clone()), &storage);

    let err = session.mark_complete().await.unwrap_err();
    assert!(matches!(err, services::ProgressionError::Storage(_)));
    assert!(!session.progress().completed);
}

#[tokio::test]
async fn broken_player_degrades_without_writes() {
    let storage = Storage::in_memory();
    storage.lessons.upsert_lesson(&lesson()).await.unwrap();
    let store = FlakyProgress::default();
    let player = ScriptedPlayer::new(300.0);
    let (mut session, _events) = session_with(&player, Arc::new(store.clone()), &storage);

    watch(&mut session, &player, 5);
    player.break_controls();
    session.tick(Instant::now() + Duration::from_secs(60));
    assert_eq!(session.progress().state, SessionState::Degraded);

    assert_eq!(session.flush().await, FlushOutcome::Skipped);
    assert_eq!(session.teardown().await, FlushOutcome::Skipped);
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    assert_eq!(session.progress().state, SessionState::Closed);
    assert!(matches!(
        session.mark_complete().await,
        Err(services::ProgressionError::SessionClosed)
    ));
}

#[tokio::test]
async fn player_init_failure_still_allows_completion() {
    let storage = Storage::in_memory();
    storage.lessons.upsert_lesson(&lesson()).await.unwrap();
    let player = ScriptedPlayer::new(300.0).failing_init();
    let services = ProgressionServices::from_storage(
        storage.clone(),
        fixed_clock(),
        EngineConfig::default(),
        Arc::new(player),
    );

    let handle = services
        .lessons()
        .open_lesson_session(UserId::new(1), LessonId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handle.current().state, SessionState::Degraded);

    handle.mark_complete().await.unwrap();
    handle.teardown().await.unwrap();

    let record = storage
        .progress
        .get_progress(UserId::new(1), LessonId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert!(record.completed());
    assert_eq!(record.completed_at(), Some(fixed_now()));
}
