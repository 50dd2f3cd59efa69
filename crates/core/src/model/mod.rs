mod ids;
mod percent;
mod progress;
mod summary;

pub use ids::{CourseId, ModuleId, SlideId, UserId};
pub use percent::{Percent, PercentOutOfRange};
pub use progress::ProgressMap;
pub use summary::CourseSummary;
