use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::chain::CourseChainResolver;
use crate::config::EngineConfig;
use crate::error::AppServicesError;
use crate::playback::PlaybackAdapterFactory;
use crate::progress_service::LessonProgressService;

/// Assembles the progression services over one storage backend.
#[derive(Clone)]
pub struct ProgressionServices {
    storage: Storage,
    chain: Arc<CourseChainResolver>,
    lessons: Arc<LessonProgressService>,
}

impl ProgressionServices {
    #[must_use]
    pub fn from_storage(
        storage: Storage,
        clock: Clock,
        config: EngineConfig,
        players: Arc<dyn PlaybackAdapterFactory>,
    ) -> Self {
        let chain = Arc::new(CourseChainResolver::new(
            clock,
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.course_chain),
        ));
        let lessons = Arc::new(LessonProgressService::new(
            clock,
            config,
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
            Arc::clone(&chain),
            players,
        ));
        Self {
            storage,
            chain,
            lessons,
        }
    }

    /// Build services backed by `SQLite` storage, reading engine settings
    /// from the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or an
    /// engine setting is malformed.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        players: Arc<dyn PlaybackAdapterFactory>,
    ) -> Result<Self, AppServicesError> {
        let config = EngineConfig::from_env()?;
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, config, players))
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn lessons(&self) -> Arc<LessonProgressService> {
        Arc::clone(&self.lessons)
    }

    #[must_use]
    pub fn chain(&self) -> Arc<CourseChainResolver> {
        Arc::clone(&self.chain)
    }
}
