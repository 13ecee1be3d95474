mod course_chain;
mod enrollment;
mod ids;
mod lesson;
mod progress;

pub use ids::{CourseId, LessonId, PackageId, ParseIdError, UserId};

pub use course_chain::{CourseChainEntry, next_course};
pub use enrollment::{Enrollment, EnrollmentUpdate};
pub use lesson::{Lesson, LessonError, MediaRef};
pub use progress::{ProgressError, ProgressPercent, ProgressRecord, ProgressUpdate};
