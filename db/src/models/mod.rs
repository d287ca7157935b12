pub mod attendance_record;
pub mod attendance_session;
pub mod course;
pub mod failed_attempt;

pub use attendance_record::Entity as AttendanceRecord;
pub use attendance_session::Entity as AttendanceSession;
pub use course::Entity as Course;
pub use failed_attempt::Entity as FailedAttempt;
