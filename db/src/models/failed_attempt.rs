use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A rejected check-in, kept so the instructor can review or dismiss it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "failed_attempts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    pub student_id: String,
    pub student_name: String,
    pub email: String,
    pub device_id: String,
    pub reason: FailureReason,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "failure_reason")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FailureReason {
    #[sea_orm(string_value = "session_inactive")]
    SessionInactive,

    #[sea_orm(string_value = "invalid_code")]
    InvalidCode,

    #[sea_orm(string_value = "duplicate_student")]
    DuplicateStudent,

    #[sea_orm(string_value = "duplicate_device")]
    DuplicateDevice,

    #[sea_orm(string_value = "out_of_range")]
    OutOfRange,
}

impl FailureReason {
    /// Message shown to the student whose check-in was refused.
    pub fn message(&self) -> &'static str {
        match self {
            Self::SessionInactive => "This session is not accepting check-ins",
            Self::InvalidCode => "The code you entered is incorrect or has expired",
            Self::DuplicateStudent => "You have already checked in to this session",
            Self::DuplicateDevice => "This device has already been used to check in",
            Self::OutOfRange => "You are too far from the class location",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_session::Entity",
        from = "Column::SessionId",
        to = "super::attendance_session::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Session,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFailedAttempt {
    pub session_id: i64,
    pub student_id: String,
    pub student_name: String,
    pub email: String,
    pub device_id: String,
    pub reason: FailureReason,
}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        params: &NewFailedAttempt,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        let active_model = ActiveModel {
            session_id: Set(params.session_id),
            student_id: Set(params.student_id.clone()),
            student_name: Set(params.student_name.clone()),
            email: Set(params.email.clone()),
            device_id: Set(params.device_id.clone()),
            reason: Set(params.reason),
            created_at: Set(now),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    pub async fn find_for_session(
        db: &DatabaseConnection,
        session_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .order_by_desc(Column::CreatedAt)
            .all(db)
            .await
    }

    pub async fn dismiss(db: &DatabaseConnection, id: i64) -> Result<bool, DbErr> {
        let result = Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }

    /// Returns how many attempts were removed.
    pub async fn dismiss_all(db: &DatabaseConnection, session_id: i64) -> Result<u64, DbErr> {
        let result = Entity::delete_many()
            .filter(Column::SessionId.eq(session_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attendance_session::{self, NewSession};
    use crate::test_utils::setup_test_db;
    use chrono::{Duration, TimeZone};
    use util::geo::Coordinates;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 21, 10, 0, 0).unwrap()
    }

    async fn seed_session(db: &DatabaseConnection, class_name: &str) -> i64 {
        attendance_session::Model::create(
            db,
            &NewSession {
                class_name: class_name.into(),
                location: Coordinates::new(0.0, 0.0),
                radius_meters: 50.0,
                late_threshold_minutes: 5,
                course_id: None,
            },
            t0(),
        )
        .await
        .unwrap()
        .id
    }

    fn attempt(session_id: i64, reason: FailureReason) -> NewFailedAttempt {
        NewFailedAttempt {
            session_id,
            student_id: "u1".into(),
            student_name: "Sam".into(),
            email: "sam@tuks.co.za".into(),
            device_id: "DEV-00000001".into(),
            reason,
        }
    }

    #[tokio::test]
    async fn attempts_are_listed_newest_first() {
        let db = setup_test_db().await;
        let sid = seed_session(&db, "COS301").await;

        Model::create(&db, &attempt(sid, FailureReason::InvalidCode), t0())
            .await
            .unwrap();
        Model::create(&db, &attempt(sid, FailureReason::OutOfRange), t0() + Duration::minutes(1))
            .await
            .unwrap();

        let listed = Model::find_for_session(&db, sid).await.unwrap();
        let reasons: Vec<FailureReason> = listed.iter().map(|a| a.reason).collect();
        assert_eq!(reasons, vec![FailureReason::OutOfRange, FailureReason::InvalidCode]);
    }

    #[tokio::test]
    async fn dismiss_one_or_all() {
        let db = setup_test_db().await;
        let sid = seed_session(&db, "COS301").await;
        let other = seed_session(&db, "COS332").await;

        let first = Model::create(&db, &attempt(sid, FailureReason::InvalidCode), t0())
            .await
            .unwrap();
        Model::create(&db, &attempt(sid, FailureReason::DuplicateDevice), t0())
            .await
            .unwrap();
        Model::create(&db, &attempt(sid, FailureReason::OutOfRange), t0())
            .await
            .unwrap();
        Model::create(&db, &attempt(other, FailureReason::OutOfRange), t0())
            .await
            .unwrap();

        assert!(Model::dismiss(&db, first.id).await.unwrap());
        assert!(!Model::dismiss(&db, first.id).await.unwrap());
        assert_eq!(Model::dismiss_all(&db, sid).await.unwrap(), 2);
        assert!(Model::find_for_session(&db, sid).await.unwrap().is_empty());
        assert_eq!(Model::find_for_session(&db, other).await.unwrap().len(), 1);
    }

    #[test]
    fn reasons_render_as_snake_case() {
        assert_eq!(FailureReason::OutOfRange.to_string(), "out_of_range");
        assert!(!FailureReason::InvalidCode.message().is_empty());
    }
}
