//! Attendance summaries for a single session and across a class.

use db::models::attendance_record::Model as AttendanceRecord;
use db::models::attendance_session::Model as Session;
use db::models::failed_attempt::Model as FailedAttempt;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use util::schedule::SessionStatus;

use crate::ServiceError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total: usize,
    pub on_time: usize,
    pub late: usize,
    pub manual: usize,
    pub failed_attempts: usize,
    /// Mean distance of device check-ins; manual entries carry no real location.
    pub average_distance_meters: Option<f64>,
    pub total_participation: i64,
}

pub fn summarize_session(records: &[AttendanceRecord], failed: &[FailedAttempt]) -> SessionSummary {
    let late = records.iter().filter(|r| r.is_late).count();
    let manual = records.iter().filter(|r| r.manual).count();

    let distances: Vec<f64> = records
        .iter()
        .filter(|r| !r.manual)
        .map(|r| r.distance_meters)
        .collect();
    let average_distance_meters = if distances.is_empty() {
        None
    } else {
        Some(distances.iter().sum::<f64>() / distances.len() as f64)
    };

    SessionSummary {
        total: records.len(),
        on_time: records.len() - late,
        late,
        manual,
        failed_attempts: failed.len(),
        average_distance_meters,
        total_participation: records.iter().map(|r| i64::from(r.participation)).sum(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAttendance {
    pub student_id: String,
    pub student_name: String,
    pub email: String,
    pub attended: usize,
    pub late: usize,
    pub participation: i64,
    /// `attended / sessions held`, in `[0, 1]`.
    pub rate: f64,
}

/// Per-student totals over the ended sessions in `sessions`, ordered by
/// student id. Records for other sessions are ignored.
pub fn student_attendance(sessions: &[Session], records: &[AttendanceRecord]) -> Vec<StudentAttendance> {
    let held: HashSet<i64> = sessions
        .iter()
        .filter(|s| s.status() == SessionStatus::Ended)
        .map(|s| s.id)
        .collect();

    let mut by_student: BTreeMap<&str, StudentAttendance> = BTreeMap::new();
    let mut relevant: Vec<&AttendanceRecord> =
        records.iter().filter(|r| held.contains(&r.session_id)).collect();
    relevant.sort_by_key(|r| r.taken_at);

    for record in relevant {
        let entry = by_student
            .entry(record.student_id.as_str())
            .or_insert_with(|| StudentAttendance {
                student_id: record.student_id.clone(),
                student_name: String::new(),
                email: String::new(),
                attended: 0,
                late: 0,
                participation: 0,
                rate: 0.0,
            });
        // Latest record wins for contact details.
        entry.student_name.clone_from(&record.student_name);
        entry.email.clone_from(&record.email);
        entry.attended += 1;
        entry.late += usize::from(record.is_late);
        entry.participation += i64::from(record.participation);
    }

    by_student
        .into_values()
        .map(|mut s| {
            s.rate = s.attended as f64 / held.len() as f64;
            s
        })
        .collect()
}

pub async fn session_summary(db: &DatabaseConnection, session_id: i64) -> Result<SessionSummary, ServiceError> {
    crate::session::get_session(db, session_id).await?;
    let records = AttendanceRecord::find_for_session(db, session_id).await?;
    let failed = FailedAttempt::find_for_session(db, session_id).await?;
    Ok(summarize_session(&records, &failed))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassReport {
    pub class_name: String,
    pub sessions_held: usize,
    pub students: Vec<StudentAttendance>,
}

pub async fn class_report(db: &DatabaseConnection, class_name: &str) -> Result<ClassReport, ServiceError> {
    let sessions = Session::find_by_class(db, class_name).await?;
    let held: Vec<i64> = sessions
        .iter()
        .filter(|s| s.status() == SessionStatus::Ended)
        .map(|s| s.id)
        .collect();
    let records = AttendanceRecord::find_for_sessions(db, held.clone()).await?;

    log::debug!(
        "Building report for {class_name}: {} sessions, {} records",
        held.len(),
        records.len()
    );

    Ok(ClassReport {
        class_name: class_name.to_owned(),
        sessions_held: held.len(),
        students: student_attendance(&sessions, &records),
    })
}
