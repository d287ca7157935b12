use chrono::{DateTime, TimeZone};
use common::config::AppConfig;
use db::models::attendance_session::Model as Session;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use util::smart_default::{PreviousClass, find_smart_default, previous_classes as derive_previous_classes};

use crate::ServiceError;

/// One entry per class that has had a session, most recently used first.
pub async fn previous_classes(db: &DatabaseConnection) -> Result<Vec<PreviousClass>, ServiceError> {
    let sessions = Session::find_history(db).await?;
    Ok(derive_previous_classes(&sessions))
}

/// The class to pre-select when starting a session at `now`.
pub async fn smart_default<Tz: TimeZone>(
    db: &DatabaseConnection,
    now: &DateTime<Tz>,
) -> Result<Option<String>, ServiceError> {
    let sessions = Session::find_history(db).await?;
    let previous = derive_previous_classes(&sessions);
    Ok(find_smart_default(&previous, &sessions, now))
}

/// Pre-filled values for the start-session form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupDefaults {
    pub class_name: Option<String>,
    pub radius_meters: f64,
    pub late_threshold_minutes: u32,
    pub previous: Vec<PreviousClass>,
}

/// Suggested class plus its last-used settings, falling back to the
/// configured radius and threshold when nothing has been run yet.
pub async fn setup_defaults<Tz: TimeZone>(
    db: &DatabaseConnection,
    now: &DateTime<Tz>,
) -> Result<SetupDefaults, ServiceError> {
    let sessions = Session::find_history(db).await?;
    let previous = derive_previous_classes(&sessions);
    let class_name = find_smart_default(&previous, &sessions, now);

    let (fallback_radius, fallback_threshold) = {
        let config = AppConfig::global();
        (config.default_radius_meters, config.default_late_threshold_minutes)
    };

    let chosen = class_name
        .as_deref()
        .and_then(|name| previous.iter().find(|p| p.class_name == name));
    let (radius_meters, late_threshold_minutes) = match chosen {
        Some(p) => (p.radius_meters, p.late_threshold_minutes),
        None => (fallback_radius, fallback_threshold),
    };

    Ok(SetupDefaults {
        class_name,
        radius_meters,
        late_threshold_minutes,
        previous,
    })
}
