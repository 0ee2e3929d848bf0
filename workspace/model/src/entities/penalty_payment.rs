use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::payment::PaymentMethod;

/// Append-only payment history of a penalty.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "penalty_payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub penalty_id: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub paid_at: NaiveDateTime,
    pub recorded_by: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::penalty::Entity",
        from = "Column::PenaltyId",
        to = "super::penalty::Column::Id",
        on_delete = "Restrict"
    )]
    Penalty,
}

impl Related<super::penalty::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Penalty.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
