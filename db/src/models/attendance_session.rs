use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{IntoActiveModel, QueryOrder};
use serde::{Deserialize, Serialize};
use util::code::generate_code;
use util::geo::Coordinates;
use util::schedule::{ScheduledSession, SessionStatus};
use util::smart_default::ClassSession;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub class_name: String,
    pub code: String,
    pub course_id: Option<i64>,
    pub active: bool,
    pub radius_meters: f64,
    pub late_threshold_minutes: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Course,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
    #[sea_orm(has_many = "super::failed_attempt::Entity")]
    FailedAttempts,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl Related<super::failed_attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FailedAttempts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Settings for a session started on the spot by an instructor.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub class_name: String,
    pub location: Coordinates,
    pub radius_meters: f64,
    pub late_threshold_minutes: u32,
    pub course_id: Option<i64>,
}

fn minutes_to_column(minutes: u32) -> i32 {
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        params: &NewSession,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        let active_model = ActiveModel {
            class_name: Set(params.class_name.clone()),
            code: Set(generate_code()),
            course_id: Set(params.course_id),
            active: Set(true),
            radius_meters: Set(params.radius_meters),
            late_threshold_minutes: Set(minutes_to_column(params.late_threshold_minutes)),
            latitude: Set(params.location.lat),
            longitude: Set(params.location.lng),
            created_at: Set(now),
            scheduled_for: Set(None),
            ended_at: Set(None),
            updated_at: Set(now),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    /// Persists a schedule-generated draft as an inactive session.
    pub async fn create_scheduled<C: ConnectionTrait>(
        db: &C,
        draft: &ScheduledSession,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        let active_model = ActiveModel {
            class_name: Set(draft.class_name.clone()),
            code: Set(generate_code()),
            course_id: Set(Some(draft.course_id)),
            active: Set(draft.active),
            radius_meters: Set(draft.radius_meters),
            late_threshold_minutes: Set(minutes_to_column(draft.late_threshold_minutes)),
            latitude: Set(draft.location.lat),
            longitude: Set(draft.location.lng),
            created_at: Set(now),
            scheduled_for: Set(Some(draft.scheduled_for)),
            ended_at: Set(None),
            updated_at: Set(now),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    async fn get(db: &DatabaseConnection, id: i64) -> Result<Self, DbErr> {
        Self::find_by_id(db, id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("Attendance session ID {id} not found")))
    }

    pub async fn find_active(db: &DatabaseConnection) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::Active.eq(true))
            .order_by_desc(Column::CreatedAt)
            .all(db)
            .await
    }

    /// Every session that has been run or is running, newest first. Scheduled
    /// sessions that were never opened are left out.
    pub async fn find_history(db: &DatabaseConnection) -> Result<Vec<Self>, DbErr> {
        let sessions = Entity::find()
            .order_by_desc(Column::CreatedAt)
            .all(db)
            .await?;
        Ok(sessions
            .into_iter()
            .filter(|s| s.status() != SessionStatus::Scheduled)
            .collect())
    }

    pub async fn find_by_class(
        db: &DatabaseConnection,
        class_name: &str,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::ClassName.eq(class_name))
            .order_by_asc(Column::CreatedAt)
            .all(db)
            .await
    }

    pub async fn find_scheduled_for_course(
        db: &DatabaseConnection,
        course_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::ScheduledFor.is_not_null())
            .order_by_asc(Column::ScheduledFor)
            .all(db)
            .await
    }

    /// Replaces the code of an active session. Returns `None` when the session
    /// is no longer active, leaving it untouched.
    pub async fn set_code(
        db: &DatabaseConnection,
        id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, DbErr> {
        let session = Self::get(db, id).await?;
        if !session.active {
            return Ok(None);
        }

        let mut active_model = session.into_active_model();
        active_model.code = Set(code.to_owned());
        active_model.updated_at = Set(now);
        active_model.update(db).await.map(Some)
    }

    pub async fn end(db: &DatabaseConnection, id: i64, now: DateTime<Utc>) -> Result<Self, DbErr> {
        let session = Self::get(db, id).await?;
        if !session.active {
            return Ok(session);
        }

        let mut active_model = session.into_active_model();
        active_model.active = Set(false);
        active_model.ended_at = Set(Some(now));
        active_model.updated_at = Set(now);
        active_model.update(db).await
    }

    /// Opens an ended session again for late check-ins, under a new code.
    /// The original start time is kept so lateness is still measured from it.
    pub async fn reopen(
        db: &DatabaseConnection,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        let session = Self::get(db, id).await?;

        let mut active_model = session.into_active_model();
        active_model.code = Set(generate_code());
        active_model.active = Set(true);
        active_model.ended_at = Set(None);
        active_model.updated_at = Set(now);
        active_model.update(db).await
    }

    /// Starts a scheduled session: it becomes active with a fresh code and its
    /// start time becomes `now`.
    pub async fn activate(
        db: &DatabaseConnection,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        let session = Self::get(db, id).await?;
        if session.status() != SessionStatus::Scheduled {
            return Err(DbErr::Custom(format!(
                "Attendance session ID {id} is not scheduled"
            )));
        }

        let mut active_model = session.into_active_model();
        active_model.code = Set(generate_code());
        active_model.active = Set(true);
        active_model.created_at = Set(now);
        active_model.updated_at = Set(now);
        active_model.update(db).await
    }

    pub async fn delete(db: &DatabaseConnection, id: i64) -> Result<bool, DbErr> {
        let result = Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }

    pub fn status(&self) -> SessionStatus {
        if self.active {
            SessionStatus::Active
        } else if self.ended_at.is_some() {
            SessionStatus::Ended
        } else if self.scheduled_for.is_some() {
            SessionStatus::Scheduled
        } else {
            SessionStatus::Ended
        }
    }

    pub fn location(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    pub fn threshold_minutes(&self) -> u32 {
        u32::try_from(self.late_threshold_minutes).unwrap_or(0)
    }
}

impl ClassSession for Model {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    fn late_threshold_minutes(&self) -> u32 {
        self.threshold_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::course;
    use crate::test_utils::setup_test_db;
    use chrono::{Duration, TimeZone};
    use util::schedule::{CourseSchedule, ScheduleForm, generate_scheduled_sessions};
    use util::validators::is_valid_code;

    fn lecture_hall() -> NewSession {
        NewSession {
            class_name: "COS301".into(),
            location: Coordinates::new(-25.7545, 28.2314),
            radius_meters: 75.0,
            late_threshold_minutes: 10,
            course_id: None,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 21, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn create_starts_an_active_session_with_a_code() {
        let db = setup_test_db().await;
        let session = Model::create(&db, &lecture_hall(), t0()).await.unwrap();

        assert!(session.active);
        assert_eq!(session.status(), SessionStatus::Active);
        assert!(is_valid_code(&session.code));
        assert_eq!(session.location(), Coordinates::new(-25.7545, 28.2314));
        assert_eq!(session.threshold_minutes(), 10);
        assert_eq!(Model::find_active(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_code_only_touches_active_sessions() {
        let db = setup_test_db().await;
        let session = Model::create(&db, &lecture_hall(), t0()).await.unwrap();

        let rotated = Model::set_code(&db, session.id, "XYZ234", t0() + Duration::seconds(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rotated.code, "XYZ234");

        Model::end(&db, session.id, t0() + Duration::minutes(50)).await.unwrap();
        let after_end = Model::set_code(&db, session.id, "QQQ222", t0() + Duration::minutes(51))
            .await
            .unwrap();
        assert!(after_end.is_none());

        let stored = Model::find_by_id(&db, session.id).await.unwrap().unwrap();
        assert_eq!(stored.code, "XYZ234");
    }

    #[tokio::test]
    async fn end_then_reopen_keeps_start_time() {
        let db = setup_test_db().await;
        let session = Model::create(&db, &lecture_hall(), t0()).await.unwrap();

        let ended = Model::end(&db, session.id, t0() + Duration::minutes(50)).await.unwrap();
        assert!(!ended.active);
        assert_eq!(ended.status(), SessionStatus::Ended);
        assert_eq!(ended.ended_at, Some(t0() + Duration::minutes(50)));

        let reopened = Model::reopen(&db, session.id, t0() + Duration::minutes(55))
            .await
            .unwrap();
        assert!(reopened.active);
        assert_eq!(reopened.ended_at, None);
        assert_eq!(reopened.created_at, t0());
        assert!(is_valid_code(&reopened.code));
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let db = setup_test_db().await;
        let err = Model::end(&db, 404, t0()).await.unwrap_err();
        assert!(matches!(err, DbErr::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn history_excludes_unopened_scheduled_sessions() {
        let db = setup_test_db().await;
        let live = Model::create(&db, &lecture_hall(), t0()).await.unwrap();

        let form = ScheduleForm {
            days: vec!["Wed".into()],
            start_time: "10:00".into(),
            end_time: "11:00".into(),
            weeks: 1,
            start_date: "2026-01-22".into(),
        };
        let course = course::Model::create(
            &db,
            &course::NewCourse {
                code: "COS301".into(),
                section: "A".into(),
                schedule: CourseSchedule::try_from(&form).unwrap(),
                location: Coordinates::new(-25.7545, 28.2314),
                radius_meters: 50.0,
                late_threshold_minutes: 5,
            },
            t0(),
        )
        .await
        .unwrap();

        let drafts = generate_scheduled_sessions(&course.schedule_course(), &course.schedule(), &Utc);
        let scheduled = Model::create_scheduled(&db, &drafts[0], t0()).await.unwrap();
        assert_eq!(scheduled.status(), SessionStatus::Scheduled);
        assert!(!scheduled.active);
        assert_eq!(scheduled.course_id, Some(course.id));
        assert_eq!(
            Model::find_scheduled_for_course(&db, course.id).await.unwrap().len(),
            1
        );

        let history = Model::find_history(&db).await.unwrap();
        assert_eq!(history.iter().map(|s| s.id).collect::<Vec<_>>(), vec![live.id]);

        let start = drafts[0].scheduled_for;
        let activated = Model::activate(&db, scheduled.id, start).await.unwrap();
        assert_eq!(activated.status(), SessionStatus::Active);
        assert_eq!(activated.created_at, start);
        assert!(Model::activate(&db, live.id, t0()).await.is_err());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_went() {
        let db = setup_test_db().await;
        let session = Model::create(&db, &lecture_hall(), t0()).await.unwrap();

        assert!(Model::delete(&db, session.id).await.unwrap());
        assert!(!Model::delete(&db, session.id).await.unwrap());
    }
}
