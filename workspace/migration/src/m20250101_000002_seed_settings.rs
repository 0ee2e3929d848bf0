use crate::entity_iden::EntityIden;
use model::entities::prelude::*;
use model::entities::settings;
use sea_orm::prelude::Decimal;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Insert the single settings row with association defaults
        let insert = Query::insert()
            .into_table(Settings::table())
            .columns([
                Settings::column(settings::Column::Id),
                Settings::column(settings::Column::SchoolName),
                Settings::column(settings::Column::AbsentPenaltyAmount),
                Settings::column(settings::Column::LatePenaltyAmount),
                Settings::column(settings::Column::LateThresholdMinutes),
                Settings::column(settings::Column::QrExpiryMinutes),
                Settings::column(settings::Column::PenaltyDueDays),
                Settings::column(settings::Column::DefaultContributionAmount),
                Settings::column(settings::Column::UpdatedAt),
            ])
            .values_panic([
                settings::SETTINGS_ID.into(),
                "Parent-Teacher Association".into(),
                Decimal::new(50, 0).into(),
                Decimal::new(20, 0).into(),
                15.into(),
                60.into(),
                30.into(),
                Decimal::new(100, 0).into(),
                Expr::current_timestamp().into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let delete = Query::delete()
            .from_table(Settings::table())
            .and_where(Expr::col(Settings::column(settings::Column::Id)).eq(settings::SETTINGS_ID))
            .to_owned();

        manager.exec_stmt(delete).await?;

        Ok(())
    }
}
