mod driver;
mod progress;
mod service;
mod tracker;

pub use driver::LessonSessionHandle;
pub use progress::{SessionState, WatchProgress};
pub use service::{CompletionOutcome, FlushOutcome, LessonSession};
pub use tracker::{FlushTicket, PlaybackSample, WatchTimeTracker};
