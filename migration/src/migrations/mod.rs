pub mod m202601050001_create_courses;
pub mod m202601050002_create_attendance;
pub mod m202601050003_create_failed_attempts;
