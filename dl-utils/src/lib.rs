pub mod encoding;
pub mod schedule;

pub use encoding::{argmax, one_hot, LabelError};
pub use schedule::{cosine_learning_schedule, CosineSchedule, CosineScheduleConfig, ScheduleError};
