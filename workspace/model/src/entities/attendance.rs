use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    #[sea_orm(string_value = "PRESENT")]
    Present,
    #[sea_orm(string_value = "ABSENT")]
    Absent,
    #[sea_orm(string_value = "EXCUSED")]
    Excused,
}

/// Attendance of one parent at one meeting. The (meeting_id, parent_id) pair is unique.
///
/// `has_penalty`/`penalty_amount` hold the assessment; `penalty_applied` flips once
/// the assessment has been turned into a penalty record.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "attendance")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub meeting_id: i32,
    pub parent_id: i32,
    pub status: AttendanceStatus,
    #[sea_orm(default_value = "false")]
    pub is_late: bool,
    #[sea_orm(default_value = "0")]
    pub late_minutes: i32,
    #[sea_orm(default_value = "false")]
    pub has_penalty: bool,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub penalty_amount: Decimal,
    #[sea_orm(default_value = "false")]
    pub penalty_applied: bool,
    #[sea_orm(default_value = "false")]
    pub scanned_via_qr: bool,
    pub qr_scanned_at: Option<NaiveDateTime>,
    pub checked_in_at: Option<NaiveDateTime>,
    pub remarks: Option<String>,
    pub recorded_by: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::meeting::Entity",
        from = "Column::MeetingId",
        to = "super::meeting::Column::Id",
        on_delete = "Cascade"
    )]
    Meeting,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ParentId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Parent,
}

impl Related<super::meeting::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meeting.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
