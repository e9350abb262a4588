pub mod backup;
pub mod catalog;
pub mod plan;
pub mod session;
pub mod setting;
pub mod user;

pub use backup::Backup;
pub use catalog::{can_modify, Category, Course, Topic};
pub use plan::{Plan, PlanGoals, PlanStatus};
pub use session::{PomodoroSettings, SessionStatus, StudySession};
pub use setting::{Setting, SettingType, TypedSetting};
pub use user::{PublicUser, User, UserRole};
