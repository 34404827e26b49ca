mod capsule;

pub use capsule::{split_goal, Capsule, CapsuleScheduler, ScheduleContext, SchedulerConfig};
