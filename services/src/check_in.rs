//! Student check-ins and instructor manual entries.
//!
//! A check-in is judged by [`evaluate_check_in`] without touching storage, then
//! [`submit_check_in`] writes either an attendance record or a failed attempt.
//! The read and the write share a transaction, and the record's primary key on
//! `(session_id, student_id)` settles races between two submissions.

use chrono::{DateTime, Utc};
use db::models::attendance_record::{Model as AttendanceRecord, NewAttendanceRecord};
use db::models::attendance_session::Model as Session;
use db::models::failed_attempt::{FailureReason, Model as FailedAttempt, NewFailedAttempt};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use util::geo::Coordinates;
use util::validators::{is_late_check_in, is_valid_code, is_valid_email, normalize_code};
use validator::{Validate, ValidationError};

use crate::ServiceError;
use crate::error::is_unique_violation;
use crate::validation::{error_with, validate_form};

/// Device id stored on records an instructor adds by hand.
pub const MANUAL_DEVICE_ID: &str = "MANUAL";

fn student_id_rule(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error_with("required", "Student ID is required"));
    }
    Ok(())
}

fn student_name_rule(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error_with("required", "Name is required"));
    }
    Ok(())
}

fn email_rule(value: &str) -> Result<(), ValidationError> {
    if !is_valid_email(value.trim()) {
        return Err(error_with("email", "Please enter a valid email address"));
    }
    Ok(())
}

fn code_rule(value: &str) -> Result<(), ValidationError> {
    if !is_valid_code(value.trim()) {
        return Err(error_with("code", "Code must be 6 letters or digits"));
    }
    Ok(())
}

fn device_rule(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error_with("required", "Device ID is required"));
    }
    Ok(())
}

/// A student's check-in as submitted from their device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CheckInRequest {
    #[validate(custom(function = "student_id_rule"))]
    pub student_id: String,
    #[validate(custom(function = "student_name_rule"))]
    pub student_name: String,
    #[validate(custom(function = "email_rule"))]
    pub email: String,
    #[validate(custom(function = "code_rule"))]
    pub code: String,
    #[validate(custom(function = "device_rule"))]
    pub device_id: String,
    pub location: Coordinates,
}

impl CheckInRequest {
    /// Builds a request with trimmed fields and a normalised code, reporting
    /// every invalid field at once.
    pub fn new(
        student_id: &str,
        student_name: &str,
        email: &str,
        code: &str,
        device_id: &str,
        location: Coordinates,
    ) -> Result<Self, ServiceError> {
        let request = Self {
            student_id: student_id.trim().to_owned(),
            student_name: student_name.trim().to_owned(),
            email: email.trim().to_owned(),
            code: normalize_code(code),
            device_id: device_id.trim().to_owned(),
            location,
        };
        validate_form(&request)?;
        Ok(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckInDecision {
    Accepted {
        distance_meters: f64,
        is_late: bool,
    },
    Rejected {
        reason: FailureReason,
        /// Only known once the location has been compared.
        distance_meters: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckInOutcome {
    Recorded(AttendanceRecord),
    Rejected {
        reason: FailureReason,
        attempt: FailedAttempt,
    },
}

impl CheckInOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }

    /// Message to show the student.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Recorded(record) if record.is_late => "Checked in (late)",
            Self::Recorded(_) => "Checked in",
            Self::Rejected { reason, .. } => reason.message(),
        }
    }
}

/// Decides a check-in against the session and the records already taken.
///
/// Checks run in a fixed order and the first failure wins: session open, code,
/// duplicate student, duplicate device, then distance.
pub fn evaluate_check_in(
    session: &Session,
    request: &CheckInRequest,
    existing: &[AttendanceRecord],
    now: DateTime<Utc>,
) -> CheckInDecision {
    let reject = |reason| CheckInDecision::Rejected {
        reason,
        distance_meters: None,
    };

    if !session.active {
        return reject(FailureReason::SessionInactive);
    }
    if normalize_code(&request.code) != session.code {
        return reject(FailureReason::InvalidCode);
    }
    if existing.iter().any(|r| r.student_id == request.student_id) {
        return reject(FailureReason::DuplicateStudent);
    }
    if existing.iter().any(|r| r.device_id == request.device_id) {
        return reject(FailureReason::DuplicateDevice);
    }

    let classroom = session.location();
    let distance = classroom.distance_to(&request.location);
    if !classroom.within_radius(&request.location, session.radius_meters) {
        return CheckInDecision::Rejected {
            reason: FailureReason::OutOfRange,
            distance_meters: Some(distance),
        };
    }

    CheckInDecision::Accepted {
        distance_meters: distance,
        is_late: is_late_check_in(now, session.created_at, session.threshold_minutes()),
    }
}

/// Judges and stores a check-in in one transaction. A concurrent insert that
/// beats this one to the same student is reported as a duplicate student.
pub async fn submit_check_in(
    db: &DatabaseConnection,
    session_id: i64,
    request: &CheckInRequest,
    now: DateTime<Utc>,
) -> Result<CheckInOutcome, ServiceError> {
    let txn = db.begin().await?;
    let session = Session::find_by_id(&txn, session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Attendance session ID {session_id} not found")))?;
    let existing = AttendanceRecord::find_for_session(&txn, session_id).await?;

    let (reason, distance_meters) = match evaluate_check_in(&session, request, &existing, now) {
        CheckInDecision::Accepted {
            distance_meters,
            is_late,
        } => {
            let inserted = AttendanceRecord::create(
                &txn,
                &NewAttendanceRecord {
                    session_id,
                    student_id: request.student_id.clone(),
                    student_name: request.student_name.clone(),
                    email: request.email.clone(),
                    device_id: request.device_id.clone(),
                    location: request.location,
                    distance_meters,
                    allowed_radius: session.radius_meters,
                    taken_at: now,
                    is_late,
                    manual: false,
                },
            )
            .await;

            match inserted {
                Ok(record) => {
                    txn.commit().await?;
                    log::info!(
                        "Student {} checked in to session {} ({:.1}m{})",
                        record.student_id,
                        session_id,
                        distance_meters,
                        if is_late { ", late" } else { "" }
                    );
                    return Ok(CheckInOutcome::Recorded(record));
                }
                Err(e) if is_unique_violation(&e) => {
                    txn.rollback().await?;
                    log::debug!("Lost insert race for {} in session {session_id}", request.student_id);
                    let attempt =
                        record_rejection(db, session_id, request, FailureReason::DuplicateStudent, None, now)
                            .await?;
                    return Ok(CheckInOutcome::Rejected {
                        reason: FailureReason::DuplicateStudent,
                        attempt,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        CheckInDecision::Rejected {
            reason,
            distance_meters,
        } => (reason, distance_meters),
    };

    let attempt = record_rejection(&txn, session_id, request, reason, distance_meters, now).await?;
    txn.commit().await?;
    Ok(CheckInOutcome::Rejected { reason, attempt })
}

async fn record_rejection<C: ConnectionTrait>(
    conn: &C,
    session_id: i64,
    request: &CheckInRequest,
    reason: FailureReason,
    distance_meters: Option<f64>,
    now: DateTime<Utc>,
) -> Result<FailedAttempt, ServiceError> {
    let attempt = FailedAttempt::create(
        conn,
        &NewFailedAttempt {
            session_id,
            student_id: request.student_id.clone(),
            student_name: request.student_name.clone(),
            email: request.email.clone(),
            device_id: request.device_id.clone(),
            reason,
        },
        now,
    )
    .await?;

    match distance_meters {
        Some(d) => log::warn!(
            "Rejected check-in by {} for session {}: {} ({:.1}m)",
            request.student_id,
            session_id,
            reason,
            d
        ),
        None => log::warn!(
            "Rejected check-in by {} for session {}: {}",
            request.student_id,
            session_id,
            reason
        ),
    }
    Ok(attempt)
}

/// A student added by the instructor without a device check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ManualEntry {
    #[validate(custom(function = "student_id_rule"))]
    pub student_id: String,
    #[validate(custom(function = "student_name_rule"))]
    pub student_name: String,
    #[validate(custom(function = "email_rule"))]
    pub email: String,
}

/// Records a student by hand at the classroom location. Lateness is measured
/// from the session start to `now`, as for a normal check-in.
pub async fn add_manual_entry(
    db: &DatabaseConnection,
    session_id: i64,
    entry: &ManualEntry,
    now: DateTime<Utc>,
) -> Result<AttendanceRecord, ServiceError> {
    validate_form(entry)?;
    let session = crate::session::get_session(db, session_id).await?;

    let student_id = entry.student_id.trim();
    if AttendanceRecord::find(db, session_id, student_id).await?.is_some() {
        return Err(ServiceError::InvalidState(format!(
            "Student {student_id} already has a record in session {session_id}"
        )));
    }

    let is_late = is_late_check_in(now, session.created_at, session.threshold_minutes());
    let record = AttendanceRecord::create(
        db,
        &NewAttendanceRecord {
            session_id,
            student_id: student_id.to_owned(),
            student_name: entry.student_name.trim().to_owned(),
            email: entry.email.trim().to_owned(),
            device_id: MANUAL_DEVICE_ID.to_owned(),
            location: session.location(),
            distance_meters: 0.0,
            allowed_radius: session.radius_meters,
            taken_at: now,
            is_late,
            manual: true,
        },
    )
    .await?;

    log::info!("Manual entry for {} added to session {}", record.student_id, session_id);
    Ok(record)
}
