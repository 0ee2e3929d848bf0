use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::payment::PaymentStatus;

/// A fine owed by a parent, usually produced from a meeting attendance record.
///
/// While not waived: `balance == amount - discount_amount - amount_paid`.
/// Once waived the remainder moves into `waived_amount` and `balance` is zero.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "penalties")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub parent_id: i32,
    pub meeting_id: Option<i32>,
    pub attendance_id: Option<i32>,
    pub reason: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount_paid: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub waived_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub balance: Decimal,
    pub payment_status: PaymentStatus,
    #[sea_orm(default_value = "false")]
    pub is_paid: bool,
    #[sea_orm(default_value = "false")]
    pub is_waived: bool,
    pub waived_reason: Option<String>,
    pub waived_at: Option<NaiveDateTime>,
    pub due_date: Option<NaiveDate>,
    #[sea_orm(default_value = "false")]
    pub is_overdue: bool,
    #[sea_orm(default_value = "0")]
    pub days_overdue: i32,
    pub paid_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ParentId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Parent,
    #[sea_orm(
        belongs_to = "super::meeting::Entity",
        from = "Column::MeetingId",
        to = "super::meeting::Column::Id",
        on_delete = "SetNull"
    )]
    Meeting,
    #[sea_orm(has_many = "super::penalty_payment::Entity")]
    Payments,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parent.def()
    }
}

impl Related<super::penalty_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
