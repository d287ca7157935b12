use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use util::geo::Coordinates;
use util::schedule::{CourseSchedule, ScheduleCourse};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub code: String,
    pub section: String,
    #[sea_orm(unique)]
    pub class_name: String,
    /// Comma-separated weekday abbreviations, e.g. `Mon,Wed,Fri`.
    pub days: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub weeks: i32,
    pub start_date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub late_threshold_minutes: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attendance_session::Entity")]
    Sessions,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCourse {
    pub code: String,
    pub section: String,
    pub schedule: CourseSchedule,
    pub location: Coordinates,
    pub radius_meters: f64,
    pub late_threshold_minutes: u32,
}

impl Model {
    /// `COS301` + `A` → `COS301-A`.
    pub fn class_name_for(code: &str, section: &str) -> String {
        format!("{}-{}", code.trim(), section.trim())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        params: &NewCourse,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        let days = params
            .schedule
            .days
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let active_model = ActiveModel {
            code: Set(params.code.trim().to_owned()),
            section: Set(params.section.trim().to_owned()),
            class_name: Set(Self::class_name_for(&params.code, &params.section)),
            days: Set(days),
            start_time: Set(params.schedule.start_time),
            end_time: Set(params.schedule.end_time),
            weeks: Set(i32::try_from(params.schedule.weeks).unwrap_or(i32::MAX)),
            start_date: Set(params.schedule.start_date),
            latitude: Set(params.location.lat),
            longitude: Set(params.location.lng),
            radius_meters: Set(params.radius_meters),
            late_threshold_minutes: Set(i32::try_from(params.late_threshold_minutes).unwrap_or(i32::MAX)),
            created_at: Set(now),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    pub async fn find_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn find_by_class_name(
        db: &DatabaseConnection,
        class_name: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::ClassName.eq(class_name))
            .one(db)
            .await
    }

    pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Self>, DbErr> {
        Entity::find().order_by_asc(Column::ClassName).all(db).await
    }

    /// Weekdays in stored order; unknown entries are skipped.
    pub fn weekdays(&self) -> Vec<Weekday> {
        self.days
            .split(',')
            .filter_map(|d| d.trim().parse::<Weekday>().ok())
            .collect()
    }

    pub fn schedule(&self) -> CourseSchedule {
        CourseSchedule {
            days: self.weekdays(),
            start_time: self.start_time,
            end_time: self.end_time,
            weeks: u32::try_from(self.weeks).unwrap_or(0),
            start_date: self.start_date,
        }
    }

    pub fn location(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// The settings every generated session inherits from this course.
    pub fn schedule_course(&self) -> ScheduleCourse {
        ScheduleCourse {
            id: self.id,
            class_name: self.class_name.clone(),
            location: self.location(),
            radius_meters: self.radius_meters,
            late_threshold_minutes: u32::try_from(self.late_threshold_minutes).unwrap_or(0),
        }
    }
}
