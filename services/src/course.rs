use chrono::{DateTime, TimeZone, Utc};
use db::models::attendance_session::Model as Session;
use db::models::course::{Model as Course, NewCourse};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use util::geo::Coordinates;
use util::schedule::{CourseSchedule, ScheduleForm, generate_scheduled_sessions};
use validator::{Validate, ValidationError};

use crate::ServiceError;
use crate::validation::error_with;

pub const MAX_CODE_LEN: usize = 20;
pub const MAX_SECTION_LEN: usize = 10;

fn course_code_rule(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(error_with("required", "Course code is required"));
    }
    if value.chars().count() > MAX_CODE_LEN {
        return Err(error_with("length", "Course code must be at most 20 characters"));
    }
    Ok(())
}

fn section_rule(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(error_with("required", "Section is required"));
    }
    if value.chars().count() > MAX_SECTION_LEN {
        return Err(error_with("length", "Section must be at most 10 characters"));
    }
    Ok(())
}

/// Course setup as entered by the instructor.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct CourseForm {
    #[validate(custom(function = "course_code_rule"))]
    pub code: String,
    #[validate(custom(function = "section_rule"))]
    pub section: String,
    pub schedule: ScheduleForm,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,
    #[validate(range(exclusive_min = 0.0, message = "Radius must be greater than zero"))]
    pub radius_meters: f64,
    #[validate(range(max = 240, message = "Late threshold must be at most 240 minutes"))]
    pub late_threshold_minutes: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseSetup {
    pub course: Course,
    /// Generated sessions, earliest first.
    pub sessions: Vec<Session>,
}

/// Checks the course fields and its schedule, returning every problem found.
pub fn validate_course(form: &CourseForm) -> Result<CourseSchedule, Vec<String>> {
    let mut errors = match form.validate() {
        Ok(()) => Vec::new(),
        Err(e) => common::validation_messages(&e),
    };

    match CourseSchedule::try_from(&form.schedule) {
        Ok(schedule) if errors.is_empty() => Ok(schedule),
        Ok(_) => Err(errors),
        Err(schedule_errors) => {
            errors.extend(schedule_errors);
            Err(errors)
        }
    }
}

/// Creates a course and one scheduled session per meeting in its schedule.
///
/// Dates and times in the schedule are read in `tz`.
pub async fn create_course<Tz: TimeZone>(
    db: &DatabaseConnection,
    form: &CourseForm,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Result<CourseSetup, ServiceError> {
    let schedule = validate_course(form).map_err(ServiceError::Validation)?;

    let class_name = Course::class_name_for(&form.code, &form.section);
    if Course::find_by_class_name(db, &class_name).await?.is_some() {
        return Err(ServiceError::validation(format!(
            "Course {class_name} already exists"
        )));
    }

    let txn = db.begin().await?;

    let course = Course::create(
        &txn,
        &NewCourse {
            code: form.code.clone(),
            section: form.section.clone(),
            schedule,
            location: Coordinates::new(form.latitude, form.longitude),
            radius_meters: form.radius_meters,
            late_threshold_minutes: form.late_threshold_minutes,
        },
        now,
    )
    .await?;

    let drafts = generate_scheduled_sessions(&course.schedule_course(), &course.schedule(), tz);
    let mut sessions = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        sessions.push(Session::create_scheduled(&txn, draft, now).await?);
    }

    txn.commit().await?;

    log::info!(
        "Created course {} with {} scheduled sessions",
        course.class_name,
        sessions.len()
    );
    Ok(CourseSetup { course, sessions })
}
