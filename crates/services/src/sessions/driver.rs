use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::warn;

use super::progress::WatchProgress;
use super::service::{CompletionOutcome, FlushOutcome, LessonSession};
use crate::chain::ChainResolution;
use crate::error::ProgressionError;
use crate::playback::PlaybackEvent;

/// Owner-side handle of a running lesson session.
///
/// A background task drives the UI tick, the persistence tick and player
/// events. Dropping the handle tears the session down like [`Self::teardown`].
pub struct LessonSessionHandle {
    session: Arc<Mutex<LessonSession>>,
    progress: watch::Receiver<WatchProgress>,
    chain: watch::Receiver<Option<ChainResolution>>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl LessonSessionHandle {
    /// Start `session` and spawn its driver on the current tokio runtime.
    #[must_use]
    pub fn spawn(
        mut session: LessonSession,
        events: mpsc::UnboundedReceiver<PlaybackEvent>,
        ui_tick: Duration,
        flush_interval: Duration,
    ) -> Self {
        session.start();
        let progress = session.subscribe();
        let chain = session.chain_updates();
        let session = Arc::new(Mutex::new(session));
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(drive(
            Arc::clone(&session),
            events,
            shutdown_rx,
            ui_tick,
            flush_interval,
        ));
        Self {
            session,
            progress,
            chain,
            shutdown,
            task,
        }
    }

    /// Live session progress for display.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<WatchProgress> {
        self.progress.clone()
    }

    #[must_use]
    pub fn current(&self) -> WatchProgress {
        *self.progress.borrow()
    }

    /// Course-level outcome of the latest completion, if any.
    #[must_use]
    pub fn chain_updates(&self) -> watch::Receiver<Option<ChainResolution>> {
        self.chain.clone()
    }

    /// # Errors
    ///
    /// See [`LessonSession::mark_complete`].
    pub async fn mark_complete(&self) -> Result<CompletionOutcome, ProgressionError> {
        self.session.lock().await.mark_complete().await
    }

    /// Flush now instead of waiting for the persistence tick.
    pub async fn flush(&self) -> FlushOutcome {
        self.session.lock().await.flush().await
    }

    /// Stop the driver; the returned task finishes after the final flush.
    pub fn teardown(self) -> JoinHandle<()> {
        let _ = self.shutdown.send(());
        self.task
    }
}

/// Ticks, flushes and events all take the session lock, so at most one flush
/// is in flight and ticks wait for it.
async fn drive(
    session: Arc<Mutex<LessonSession>>,
    mut events: mpsc::UnboundedReceiver<PlaybackEvent>,
    mut shutdown: oneshot::Receiver<()>,
    ui_tick: Duration,
    flush_interval: Duration,
) {
    let mut ui = time::interval(ui_tick);
    ui.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut persist = time::interval_at(time::Instant::now() + flush_interval, flush_interval);
    persist.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut events_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv(), if events_open => {
                let Some(event) = event else {
                    events_open = false;
                    continue;
                };
                let mut guard = session.lock().await;
                if guard.handle_event(event) {
                    if let Err(err) = guard.mark_complete().await {
                        warn!(
                            lesson = %guard.lesson().id(),
                            error = %err,
                            "completion on video end failed"
                        );
                    }
                }
            }
            at = ui.tick() => {
                session.lock().await.tick(at.into_std());
            }
            _ = persist.tick() => {
                session.lock().await.flush().await;
            }
        }
    }

    session.lock().await.teardown().await;
}
