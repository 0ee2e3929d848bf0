use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

/// Primary key of the only settings row.
pub const SETTINGS_ID: i32 = 1;

/// Association-wide configuration, stored as a single keyed row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub school_name: String,
    /// Fine for missing a meeting without excuse.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub absent_penalty_amount: Decimal,
    /// Fine for checking in after the late threshold.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub late_penalty_amount: Decimal,
    pub late_threshold_minutes: i32,
    pub qr_expiry_minutes: i32,
    /// Days between a penalty being applied and it falling due.
    pub penalty_due_days: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub default_contribution_amount: Decimal,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
