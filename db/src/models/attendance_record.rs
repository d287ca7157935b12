use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{IntoActiveModel, QueryOrder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use util::geo::Coordinates;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub session_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_id: String,

    pub student_name: String,
    pub email: String,
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    pub allowed_radius: f64,
    pub taken_at: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub is_late: bool,
    pub participation: i32,
    pub manual: bool,
    pub note: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attendance_status")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AttendanceStatus {
    #[sea_orm(string_value = "on_time")]
    OnTime,

    #[sea_orm(string_value = "late")]
    Late,
}

impl AttendanceStatus {
    pub fn from_lateness(is_late: bool) -> Self {
        if is_late { Self::Late } else { Self::OnTime }
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

/// Everything needed to write a record; lateness and distance are computed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceRecord {
    pub session_id: i64,
    pub student_id: String,
    pub student_name: String,
    pub email: String,
    pub device_id: String,
    pub location: Coordinates,
    pub distance_meters: f64,
    pub allowed_radius: f64,
    pub taken_at: DateTime<Utc>,
    pub is_late: bool,
    pub manual: bool,
}

/// Instructor corrections; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordEdit {
    pub student_name: Option<String>,
    pub email: Option<String>,
    pub status: Option<AttendanceStatus>,
}

impl Model {
    /// Fails with a unique-constraint error when the student already has a
    /// record in the session.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        params: &NewAttendanceRecord,
    ) -> Result<Self, DbErr> {
        let active_model = ActiveModel {
            session_id: Set(params.session_id),
            student_id: Set(params.student_id.clone()),
            student_name: Set(params.student_name.clone()),
            email: Set(params.email.clone()),
            device_id: Set(params.device_id.clone()),
            latitude: Set(params.location.lat),
            longitude: Set(params.location.lng),
            distance_meters: Set(params.distance_meters),
            allowed_radius: Set(params.allowed_radius),
            taken_at: Set(params.taken_at),
            status: Set(AttendanceStatus::from_lateness(params.is_late)),
            is_late: Set(params.is_late),
            participation: Set(0),
            manual: Set(params.manual),
            note: Set(None),
        };

        active_model.insert(db).await
    }

    pub async fn find(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id((session_id, student_id.to_owned()))
            .one(db)
            .await
    }

    async fn get(db: &DatabaseConnection, session_id: i64, student_id: &str) -> Result<Self, DbErr> {
        Self::find(db, session_id, student_id).await?.ok_or_else(|| {
            DbErr::RecordNotFound(format!(
                "Attendance record for student {student_id} in session {session_id} not found"
            ))
        })
    }

    pub async fn find_for_session<C: ConnectionTrait>(
        db: &C,
        session_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .order_by_asc(Column::TakenAt)
            .all(db)
            .await
    }

    pub async fn find_for_sessions(
        db: &DatabaseConnection,
        session_ids: Vec<i64>,
    ) -> Result<Vec<Self>, DbErr> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::SessionId.is_in(session_ids))
            .order_by_asc(Column::TakenAt)
            .all(db)
            .await
    }

    pub async fn find_by_device(
        db: &DatabaseConnection,
        session_id: i64,
        device_id: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::DeviceId.eq(device_id))
            .one(db)
            .await
    }

    pub async fn increment_participation(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: &str,
    ) -> Result<Self, DbErr> {
        Self::adjust_participation(db, session_id, student_id, 1).await
    }

    /// Never takes participation below zero.
    pub async fn decrement_participation(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: &str,
    ) -> Result<Self, DbErr> {
        Self::adjust_participation(db, session_id, student_id, -1).await
    }

    async fn adjust_participation(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: &str,
        delta: i32,
    ) -> Result<Self, DbErr> {
        let record = Self::get(db, session_id, student_id).await?;
        let updated = record.participation.saturating_add(delta).max(0);
        if updated == record.participation {
            return Ok(record);
        }

        let mut active_model = record.into_active_model();
        active_model.participation = Set(updated);
        active_model.update(db).await
    }

    pub async fn edit(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: &str,
        changes: &RecordEdit,
    ) -> Result<Self, DbErr> {
        let record = Self::get(db, session_id, student_id).await?;
        if *changes == RecordEdit::default() {
            return Ok(record);
        }
        let mut active_model = record.into_active_model();

        if let Some(name) = &changes.student_name {
            active_model.student_name = Set(name.clone());
        }
        if let Some(email) = &changes.email {
            active_model.email = Set(email.clone());
        }
        if let Some(status) = changes.status {
            active_model.status = Set(status);
            active_model.is_late = Set(status == AttendanceStatus::Late);
        }

        active_model.update(db).await
    }

    /// Blank notes are stored as no note.
    pub async fn set_note(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: &str,
        note: Option<&str>,
    ) -> Result<Self, DbErr> {
        let record = Self::get(db, session_id, student_id).await?;
        let note = note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_owned);

        let mut active_model = record.into_active_model();
        active_model.note = Set(note);
        active_model.update(db).await
    }

    pub async fn remove(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: &str,
    ) -> Result<bool, DbErr> {
        let result = Entity::delete_by_id((session_id, student_id.to_owned()))
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub fn location(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}
