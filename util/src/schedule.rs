//! Expansion of a recurring weekly course schedule into concrete sessions.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::geo::Coordinates;

pub const MIN_WEEKS: u32 = 1;
pub const MAX_WEEKS: u32 = 20;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Lifecycle state of an attendance session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionStatus {
    Scheduled,
    Active,
    Ended,
}

/// Schedule fields exactly as entered in the course-setup form. Empty strings
/// mean the field was left blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleForm {
    pub days: Vec<String>,
    pub start_time: String,
    pub end_time: String,
    pub weeks: u32,
    pub start_date: String,
}

/// Outcome of schedule validation; `errors` holds every violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// A schedule that has passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSchedule {
    pub days: Vec<Weekday>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub weeks: u32,
    pub start_date: NaiveDate,
}

/// Course settings copied onto every generated session.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleCourse {
    pub id: i64,
    pub class_name: String,
    pub location: Coordinates,
    pub radius_meters: f64,
    pub late_threshold_minutes: u32,
}

/// A session draft produced from a schedule; not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledSession {
    pub id: Uuid,
    pub course_id: i64,
    pub class_name: String,
    pub location: Coordinates,
    pub radius_meters: f64,
    pub late_threshold_minutes: u32,
    pub scheduled_for: DateTime<Utc>,
    pub status: SessionStatus,
    pub active: bool,
}

fn parse_required<T>(
    value: &str,
    label: &str,
    format_hint: &str,
    parse: impl Fn(&str) -> Option<T>,
    errors: &mut Vec<String>,
) -> Option<T> {
    let value = value.trim();
    if value.is_empty() {
        errors.push(format!("{label} is required"));
        return None;
    }
    let parsed = parse(value);
    if parsed.is_none() {
        errors.push(format!("{label} must be in {format_hint} format"));
    }
    parsed
}

fn parse_schedule(form: &ScheduleForm) -> Result<CourseSchedule, Vec<String>> {
    let mut errors = Vec::new();

    let mut days = Vec::new();
    if form.days.is_empty() {
        errors.push("Please select at least one day".to_string());
    }
    for name in &form.days {
        match name.trim().parse::<Weekday>() {
            Ok(day) if !days.contains(&day) => days.push(day),
            Ok(_) => errors.push(format!("{} is selected more than once", name.trim())),
            Err(_) => errors.push(format!("Unknown day: {name}")),
        }
    }

    let start_date = parse_required(
        &form.start_date,
        "Start date",
        "YYYY-MM-DD",
        |s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok(),
        &mut errors,
    );
    let start_time = parse_required(
        &form.start_time,
        "Start time",
        "HH:MM",
        |s| NaiveTime::parse_from_str(s, TIME_FORMAT).ok(),
        &mut errors,
    );
    let end_time = parse_required(
        &form.end_time,
        "End time",
        "HH:MM",
        |s| NaiveTime::parse_from_str(s, TIME_FORMAT).ok(),
        &mut errors,
    );

    if let (Some(start), Some(end)) = (start_time, end_time) {
        if start >= end {
            errors.push("End time must be after start time".to_string());
        }
    }

    if !(MIN_WEEKS..=MAX_WEEKS).contains(&form.weeks) {
        errors.push(format!(
            "Number of weeks must be between {MIN_WEEKS} and {MAX_WEEKS}"
        ));
    }

    match (start_date, start_time, end_time) {
        (Some(start_date), Some(start_time), Some(end_time)) if errors.is_empty() => {
            Ok(CourseSchedule {
                days,
                start_time,
                end_time,
                weeks: form.weeks,
                start_date,
            })
        }
        _ => Err(errors),
    }
}

/// Checks every schedule rule in one pass.
pub fn validate_schedule(form: &ScheduleForm) -> ScheduleValidation {
    match parse_schedule(form) {
        Ok(_) => ScheduleValidation {
            valid: true,
            errors: Vec::new(),
        },
        Err(errors) => ScheduleValidation {
            valid: false,
            errors,
        },
    }
}

impl TryFrom<&ScheduleForm> for CourseSchedule {
    type Error = Vec<String>;

    fn try_from(form: &ScheduleForm) -> Result<Self, Self::Error> {
        parse_schedule(form)
    }
}

/// Days to advance from `from` to reach the next `target` (0 when they match).
fn days_until(from: Weekday, target: Weekday) -> i64 {
    let from = i64::from(from.num_days_from_sunday());
    let target = i64::from(target.num_days_from_sunday());
    (target - from).rem_euclid(7)
}

/// First date on or after `start` that falls on `weekday`.
pub fn first_occurrence(start: NaiveDate, weekday: Weekday) -> NaiveDate {
    start + Duration::days(days_until(start.weekday(), weekday))
}

fn local_to_utc<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
        .with_timezone(&Utc)
}

/// Expands `schedule` into `days × weeks` session drafts, ordered by start time.
///
/// `tz` is the time zone the schedule's dates and times are expressed in.
pub fn generate_scheduled_sessions<Tz: TimeZone>(
    course: &ScheduleCourse,
    schedule: &CourseSchedule,
    tz: &Tz,
) -> Vec<ScheduledSession> {
    let mut sessions: Vec<ScheduledSession> = schedule
        .days
        .iter()
        .flat_map(|&day| {
            let first = first_occurrence(schedule.start_date, day);
            (0..schedule.weeks).map(move |week| first + Duration::weeks(i64::from(week)))
        })
        .map(|date| ScheduledSession {
            id: Uuid::new_v4(),
            course_id: course.id,
            class_name: course.class_name.clone(),
            location: course.location,
            radius_meters: course.radius_meters,
            late_threshold_minutes: course.late_threshold_minutes,
            scheduled_for: local_to_utc(tz, date, schedule.start_time),
            status: SessionStatus::Scheduled,
            active: false,
        })
        .collect();

    sessions.sort_by_key(|s| s.scheduled_for);
    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use std::collections::HashSet;

    fn form(days: &[&str], weeks: u32, start_date: &str) -> ScheduleForm {
        ScheduleForm {
            days: days.iter().map(|d| d.to_string()).collect(),
            start_time: "10:00".into(),
            end_time: "11:30".into(),
            weeks,
            start_date: start_date.into(),
        }
    }

    fn course() -> ScheduleCourse {
        ScheduleCourse {
            id: 7,
            class_name: "COS301-A".into(),
            location: Coordinates::new(-25.7545, 28.2314),
            radius_meters: 80.0,
            late_threshold_minutes: 10,
        }
    }

    #[test]
    fn valid_schedule_has_no_errors() {
        let result = validate_schedule(&form(&["Monday", "wed", "FRI"], 12, "2026-01-05"));
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn every_violation_is_reported_at_once() {
        let bad = ScheduleForm {
            days: vec![],
            start_time: "14:00".into(),
            end_time: "13:00".into(),
            weeks: 0,
            start_date: String::new(),
        };
        let result = validate_schedule(&bad);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![
                "Please select at least one day",
                "Start date is required",
                "End time must be after start time",
                "Number of weeks must be between 1 and 20",
            ]
        );
    }

    #[test]
    fn missing_times_and_equal_times_are_rejected() {
        let mut missing = form(&["Mon"], 4, "2026-01-05");
        missing.start_time = " ".into();
        missing.end_time = String::new();
        let errors = validate_schedule(&missing).errors;
        assert!(errors.contains(&"Start time is required".to_string()));
        assert!(errors.contains(&"End time is required".to_string()));

        let mut equal = form(&["Mon"], 4, "2026-01-05");
        equal.end_time = "10:00".into();
        assert_eq!(
            validate_schedule(&equal).errors,
            vec!["End time must be after start time"]
        );
    }

    #[test]
    fn malformed_values_are_reported() {
        let mut bad = form(&["Mon", "Funday"], 21, "05/01/2026");
        bad.start_time = "9am".into();
        let errors = validate_schedule(&bad).errors;
        assert_eq!(
            errors,
            vec![
                "Unknown day: Funday",
                "Start date must be in YYYY-MM-DD format",
                "Start time must be in HH:MM format",
                "Number of weeks must be between 1 and 20",
            ]
        );
    }

    #[test]
    fn week_bounds_are_inclusive() {
        assert!(validate_schedule(&form(&["Mon"], 1, "2026-01-05")).valid);
        assert!(validate_schedule(&form(&["Mon"], 20, "2026-01-05")).valid);
        assert!(!validate_schedule(&form(&["Mon"], 21, "2026-01-05")).valid);
    }

    #[test]
    fn first_occurrence_wraps_into_next_week() {
        let friday = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        assert_eq!(friday.weekday(), Weekday::Fri);
        assert_eq!(
            first_occurrence(friday, Weekday::Mon),
            NaiveDate::from_ymd_opt(2026, 1, 12).unwrap()
        );
        assert_eq!(first_occurrence(friday, Weekday::Fri), friday);
        assert_eq!(
            first_occurrence(friday, Weekday::Thu),
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
        );
    }

    #[test]
    fn generates_days_times_weeks_in_order() {
        let schedule = CourseSchedule::try_from(&form(&["Mon", "Wed", "Fri"], 2, "2026-01-05")).unwrap();
        let sessions = generate_scheduled_sessions(&course(), &schedule, &Utc);

        assert_eq!(sessions.len(), 6);
        for pair in sessions.windows(2) {
            assert!(pair[1].scheduled_for > pair[0].scheduled_for);
        }

        let dates: Vec<String> = sessions
            .iter()
            .map(|s| s.scheduled_for.format("%Y-%m-%d %H:%M").to_string())
            .collect();
        assert_eq!(
            dates,
            vec![
                "2026-01-05 10:00",
                "2026-01-07 10:00",
                "2026-01-09 10:00",
                "2026-01-12 10:00",
                "2026-01-14 10:00",
                "2026-01-16 10:00",
            ]
        );
    }

    #[test]
    fn drafts_carry_course_settings() {
        let schedule = CourseSchedule::try_from(&form(&["Tue"], 3, "2026-01-05")).unwrap();
        let sessions = generate_scheduled_sessions(&course(), &schedule, &Utc);

        let ids: HashSet<Uuid> = sessions.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 3);
        for s in &sessions {
            assert_eq!(s.course_id, 7);
            assert_eq!(s.class_name, "COS301-A");
            assert_eq!(s.radius_meters, 80.0);
            assert_eq!(s.late_threshold_minutes, 10);
            assert_eq!(s.status, SessionStatus::Scheduled);
            assert!(!s.active);
        }
    }

    #[test]
    fn start_time_is_interpreted_in_the_given_zone() {
        let sast = FixedOffset::east_opt(2 * 3600).unwrap();
        let schedule = CourseSchedule::try_from(&form(&["Mon"], 1, "2026-01-05")).unwrap();
        let sessions = generate_scheduled_sessions(&course(), &schedule, &sast);

        assert_eq!(
            sessions[0].scheduled_for,
            Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn repeated_day_is_rejected() {
        let repeated = form(&["Mon", "Wed", "monday"], 2, "2026-01-05");
        let result = validate_schedule(&repeated);
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["monday is selected more than once"]);
        assert!(CourseSchedule::try_from(&repeated).is_err());
    }

    #[test]
    fn session_count_is_days_times_weeks() {
        let days = ["Mon", "Wed", "Fri"];
        let schedule = CourseSchedule::try_from(&form(&days, 4, "2026-01-05")).unwrap();
        assert_eq!(
            generate_scheduled_sessions(&course(), &schedule, &Utc).len(),
            days.len() * 4
        );
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(SessionStatus::Scheduled.to_string(), "scheduled");
        assert_eq!("Ended".parse::<SessionStatus>().unwrap(), SessionStatus::Ended);
    }
}
