use chrono::{DateTime, Utc};
use common::config::AppConfig;
use db::models::attendance_session::{Model as Session, NewSession};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use util::geo::Coordinates;
use util::schedule::SessionStatus;
use validator::{Validate, ValidationError};

use crate::ServiceError;
use crate::validation::{error_with, validate_form};

pub const MAX_CLASS_NAME_LEN: usize = 64;

fn class_name_rule(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(error_with("required", "Class name is required"));
    }
    if trimmed.chars().count() > MAX_CLASS_NAME_LEN {
        return Err(error_with("length", "Class name must be at most 64 characters"));
    }
    Ok(())
}

/// What an instructor submits to start a session right now.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct StartSession {
    #[validate(custom(function = "class_name_rule"))]
    pub class_name: String,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,
    #[validate(range(exclusive_min = 0.0, message = "Radius must be greater than zero"))]
    pub radius_meters: f64,
    #[validate(range(max = 240, message = "Late threshold must be at most 240 minutes"))]
    pub late_threshold_minutes: u32,
    pub course_id: Option<i64>,
}

impl StartSession {
    /// A session at `location` using the configured radius and late threshold.
    pub fn with_defaults(class_name: impl Into<String>, location: Coordinates) -> Self {
        let config = AppConfig::global();
        Self {
            class_name: class_name.into(),
            latitude: location.lat,
            longitude: location.lng,
            radius_meters: config.default_radius_meters,
            late_threshold_minutes: config.default_late_threshold_minutes,
            course_id: None,
        }
    }
}

pub async fn start_session(
    db: &DatabaseConnection,
    params: &StartSession,
    now: DateTime<Utc>,
) -> Result<Session, ServiceError> {
    validate_form(params)?;

    let session = Session::create(
        db,
        &NewSession {
            class_name: params.class_name.trim().to_owned(),
            location: Coordinates::new(params.latitude, params.longitude),
            radius_meters: params.radius_meters,
            late_threshold_minutes: params.late_threshold_minutes,
            course_id: params.course_id,
        },
        now,
    )
    .await?;

    log::info!(
        "Started attendance session {} for {} (radius {}m, late after {}min)",
        session.id,
        session.class_name,
        session.radius_meters,
        session.late_threshold_minutes
    );
    Ok(session)
}

pub async fn get_session(db: &DatabaseConnection, session_id: i64) -> Result<Session, ServiceError> {
    Session::find_by_id(db, session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Attendance session ID {session_id} not found")))
}

pub async fn end_session(
    db: &DatabaseConnection,
    session_id: i64,
    now: DateTime<Utc>,
) -> Result<Session, ServiceError> {
    let session = Session::end(db, session_id, now).await?;
    log::info!("Ended attendance session {}", session.id);
    Ok(session)
}

/// Reopens an ended session for late check-ins under a fresh code.
pub async fn reopen_session(
    db: &DatabaseConnection,
    session_id: i64,
    now: DateTime<Utc>,
) -> Result<Session, ServiceError> {
    let session = get_session(db, session_id).await?;
    if session.status() != SessionStatus::Ended {
        return Err(ServiceError::InvalidState(format!(
            "Attendance session ID {session_id} is {} and cannot be reopened",
            session.status()
        )));
    }

    let session = Session::reopen(db, session_id, now).await?;
    log::info!("Reopened attendance session {}", session.id);
    Ok(session)
}

/// Opens a session generated from a course schedule.
pub async fn activate_scheduled(
    db: &DatabaseConnection,
    session_id: i64,
    now: DateTime<Utc>,
) -> Result<Session, ServiceError> {
    let session = get_session(db, session_id).await?;
    if session.status() != SessionStatus::Scheduled {
        return Err(ServiceError::InvalidState(format!(
            "Attendance session ID {session_id} is {} and cannot be activated",
            session.status()
        )));
    }

    let session = Session::activate(db, session_id, now).await?;
    log::info!("Activated scheduled session {} ({})", session.id, session.class_name);
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use db::test_utils::setup_test_db;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 21, 10, 0, 0).unwrap()
    }

    fn params() -> StartSession {
        StartSession {
            class_name: "  COS301 ".into(),
            latitude: -25.7545,
            longitude: 28.2314,
            radius_meters: 80.0,
            late_threshold_minutes: 10,
            course_id: None,
        }
    }

    #[tokio::test]
    async fn start_trims_class_name() {
        let db = setup_test_db().await;
        let session = start_session(&db, &params(), t0()).await.unwrap();
        assert_eq!(session.class_name, "COS301");
        assert!(session.active);
    }

    #[tokio::test]
    async fn invalid_settings_are_all_reported() {
        let db = setup_test_db().await;
        let mut bad = params();
        bad.class_name = "   ".into();
        bad.latitude = 91.0;
        bad.radius_meters = 0.0;

        match start_session(&db, &bad, t0()).await {
            Err(ServiceError::Validation(errors)) => {
                assert_eq!(
                    errors,
                    vec![
                        "Class name is required",
                        "Latitude must be between -90 and 90",
                        "Radius must be greater than zero",
                    ]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn only_ended_sessions_reopen() {
        let db = setup_test_db().await;
        let session = start_session(&db, &params(), t0()).await.unwrap();

        assert!(matches!(
            reopen_session(&db, session.id, t0()).await,
            Err(ServiceError::InvalidState(_))
        ));

        end_session(&db, session.id, t0() + Duration::minutes(45)).await.unwrap();
        let reopened = reopen_session(&db, session.id, t0() + Duration::minutes(50))
            .await
            .unwrap();
        assert!(reopened.active);
        assert_eq!(reopened.created_at, t0());
    }

    #[tokio::test]
    async fn live_sessions_cannot_be_activated() {
        let db = setup_test_db().await;
        let session = start_session(&db, &params(), t0()).await.unwrap();
        assert!(matches!(
            activate_scheduled(&db, session.id, t0()).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let db = setup_test_db().await;
        assert!(matches!(
            end_session(&db, 99, t0()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
