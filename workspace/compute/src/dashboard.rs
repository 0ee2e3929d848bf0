//! Dashboard figures. Sums are folded in Rust over the fetched rows so the same
//! code runs on SQLite and PostgreSQL.

use chrono::NaiveDateTime;
use common::{DashboardSummary, MoneyTotals, ParentBalanceSummary};
use model::entities::attendance::AttendanceStatus;
use model::entities::meeting::MeetingStatus;
use model::entities::parent_student::LinkStatus;
use model::entities::project::ProjectStatus;
use model::entities::{
    attendance, contribution, meeting, parent_student, penalty, project, student, user,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::{debug, instrument};

use crate::error::Result;

fn penalty_totals(rows: &[penalty::Model]) -> MoneyTotals {
    let mut totals = MoneyTotals::default();
    for row in rows {
        totals.add(
            row.amount,
            row.discount_amount,
            row.amount_paid,
            row.waived_amount,
            row.balance,
            row.is_overdue,
        );
    }
    totals
}

fn contribution_totals(rows: &[contribution::Model]) -> MoneyTotals {
    let mut totals = MoneyTotals::default();
    for row in rows {
        totals.add(
            row.amount,
            row.discount_amount,
            row.amount_paid,
            row.waived_amount,
            row.balance,
            row.is_overdue,
        );
    }
    totals
}

#[instrument(skip(db))]
pub async fn admin_summary(db: &DatabaseConnection, now: NaiveDateTime) -> Result<DashboardSummary> {
    let parents = user::Entity::find().filter(user::Column::Role.eq(user::UserRole::Parent));
    let total_parents = parents.clone().count(db).await?;
    let active_parents = parents
        .filter(user::Column::IsActive.eq(true))
        .count(db)
        .await?;
    let total_students = student::Entity::find()
        .filter(student::Column::IsActive.eq(true))
        .count(db)
        .await?;
    let pending_links = parent_student::Entity::find()
        .filter(parent_student::Column::Status.eq(LinkStatus::Pending))
        .count(db)
        .await?;
    let upcoming_meetings = meeting::Entity::find()
        .filter(meeting::Column::MeetingDate.gte(now))
        .filter(meeting::Column::Status.eq(MeetingStatus::Scheduled))
        .count(db)
        .await?;

    let projects = project::Entity::find().all(db).await?;
    let active_projects = projects
        .iter()
        .filter(|p| matches!(p.status, ProjectStatus::Planning | ProjectStatus::Ongoing))
        .count() as u64;

    let penalties = penalty_totals(&penalty::Entity::find().all(db).await?);
    let contributions = contribution_totals(&contribution::Entity::find().all(db).await?);

    debug!(
        "Dashboard: {} parents, {} outstanding penalties, {} outstanding contributions",
        total_parents, penalties.outstanding, contributions.outstanding
    );
    Ok(DashboardSummary {
        total_parents,
        active_parents,
        total_students,
        pending_links,
        upcoming_meetings,
        active_projects,
        penalties,
        contributions,
        project_budget_total: projects.iter().map(|p| p.budget).sum(),
        project_expenses_total: projects.iter().map(|p| p.total_expenses).sum(),
    })
}

#[instrument(skip(db))]
pub async fn parent_summary(db: &DatabaseConnection, parent_id: i32) -> Result<ParentBalanceSummary> {
    let penalties = penalty_totals(
        &penalty::Entity::find()
            .filter(penalty::Column::ParentId.eq(parent_id))
            .all(db)
            .await?,
    );
    let contributions = contribution_totals(
        &contribution::Entity::find()
            .filter(contribution::Column::ParentId.eq(parent_id))
            .all(db)
            .await?,
    );
    let approved_students = parent_student::Entity::find()
        .filter(parent_student::Column::ParentId.eq(parent_id))
        .filter(parent_student::Column::Status.eq(LinkStatus::Approved))
        .count(db)
        .await?;
    let attendance = attendance::Entity::find()
        .filter(attendance::Column::ParentId.eq(parent_id))
        .all(db)
        .await?;

    Ok(ParentBalanceSummary {
        parent_id,
        total_outstanding: penalties.outstanding + contributions.outstanding,
        penalties,
        contributions,
        approved_students,
        meetings_attended: attendance
            .iter()
            .filter(|row| row.status == AttendanceStatus::Present)
            .count() as u64,
        meetings_missed: attendance
            .iter()
            .filter(|row| row.status == AttendanceStatus::Absent)
            .count() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::PaymentInput;
    use crate::penalty::{create_penalty, record_penalty_payment, NewPenalty};
    use crate::testing::{at, d, new_meeting, new_parent, new_project, now, setup_db};
    use model::entities::payment::PaymentMethod;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_summaries() -> Result<()> {
        let db = setup_db().await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        new_parent(&db, "other@example.com").await?;
        new_meeting(&db, at(2025, 7, 1, 9, 0)).await?;
        new_meeting(&db, at(2025, 5, 1, 9, 0)).await?;
        new_project(&db, d(1000)).await?;

        let penalty = create_penalty(
            &db,
            NewPenalty {
                parent_id: parent.id,
                meeting_id: None,
                attendance_id: None,
                reason: "Absent".to_string(),
                amount: d(50),
                discount_amount: Decimal::ZERO,
                due_date: None,
            },
            now(),
        )
        .await?;
        record_penalty_payment(
            &db,
            penalty.id,
            PaymentInput {
                amount: d(20),
                method: PaymentMethod::Cash,
                reference: None,
                notes: None,
                recorded_by: None,
            },
            now(),
        )
        .await?;

        let summary = admin_summary(&db, now()).await?;
        assert_eq!(summary.total_parents, 2);
        assert_eq!(summary.active_parents, 2);
        assert_eq!(summary.upcoming_meetings, 1);
        assert_eq!(summary.active_projects, 1);
        assert_eq!(summary.penalties.outstanding, d(30));
        assert_eq!(summary.penalties.total_paid, d(20));
        assert_eq!(summary.project_budget_total, d(1000));

        let mine = parent_summary(&db, parent.id).await?;
        assert_eq!(mine.penalties.record_count, 1);
        assert_eq!(mine.total_outstanding, d(30));
        assert_eq!(mine.contributions.record_count, 0);

        Ok(())
    }
}
