//! Picks the class name to pre-select when an instructor opens session setup.
//!
//! Instructors usually teach the same class in the same weekly slot, so a
//! session created in the current weekday/hour within the last two weeks wins;
//! otherwise the most recently used class is suggested.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How far back a session may be and still count as "this slot".
pub const MATCH_WINDOW_DAYS: i64 = 14;

/// Anything that records which class it was created for and when.
pub trait ClassSession {
    fn class_name(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn radius_meters(&self) -> f64;
    fn late_threshold_minutes(&self) -> u32;
}

/// One distinct class name with the settings of its newest session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousClass {
    pub class_name: String,
    pub last_used: DateTime<Utc>,
    pub radius_meters: f64,
    pub late_threshold_minutes: u32,
}

/// Derives one entry per class name, most recently used first.
pub fn previous_classes<S: ClassSession>(sessions: &[S]) -> Vec<PreviousClass> {
    let mut latest: HashMap<&str, &S> = HashMap::new();
    for session in sessions {
        latest
            .entry(session.class_name())
            .and_modify(|current| {
                if session.created_at() > current.created_at() {
                    *current = session;
                }
            })
            .or_insert(session);
    }

    let mut classes: Vec<PreviousClass> = latest
        .into_values()
        .map(|s| PreviousClass {
            class_name: s.class_name().to_owned(),
            last_used: s.created_at(),
            radius_meters: s.radius_meters(),
            late_threshold_minutes: s.late_threshold_minutes(),
        })
        .collect();

    classes.sort_by(|a, b| {
        b.last_used
            .cmp(&a.last_used)
            .then_with(|| a.class_name.cmp(&b.class_name))
    });
    classes
}

/// Returns the class to pre-select, or `None` when no class has been used yet.
///
/// `previous` must be ordered most-recent-first. Day-of-week and hour are
/// evaluated in the time zone of `now`.
pub fn find_smart_default<Tz, S>(
    previous: &[PreviousClass],
    sessions: &[S],
    now: &DateTime<Tz>,
) -> Option<String>
where
    Tz: TimeZone,
    S: ClassSession,
{
    let most_recent = previous.first()?;
    if sessions.is_empty() {
        return Some(most_recent.class_name.clone());
    }

    let tz = now.timezone();
    let weekday = now.weekday();
    let hour = now.hour();
    let now_utc = now.with_timezone(&Utc);
    let window_start = now_utc - Duration::days(MATCH_WINDOW_DAYS);

    let best_match = sessions
        .iter()
        .filter(|s| {
            let created = s.created_at();
            if created < window_start || created > now_utc {
                return false;
            }
            let local = created.with_timezone(&tz);
            local.weekday() == weekday && local.hour() == hour
        })
        .max_by_key(|s| s.created_at());

    match best_match {
        Some(session) => Some(session.class_name().to_owned()),
        None => Some(most_recent.class_name.clone()),
    }
}
