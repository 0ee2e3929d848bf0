//! Penalty service: creation, edits, payments, waivers and the overdue scan.

use chrono::{NaiveDate, NaiveDateTime};
use model::entities::payment::PaymentStatus;
use model::entities::{meeting, penalty, penalty_payment, user};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument};

use crate::balance::{BalanceState, PaymentInput};
use crate::error::{ComputeError, Result};
use crate::record::{self, BalanceRecord};

/// Input for a new penalty.
#[derive(Debug, Clone)]
pub struct NewPenalty {
    pub parent_id: i32,
    pub meeting_id: Option<i32>,
    pub attendance_id: Option<i32>,
    pub reason: String,
    pub amount: Decimal,
    pub discount_amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

/// Partial edit of a penalty. `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default)]
pub struct PenaltyUpdate {
    pub reason: Option<String>,
    pub amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Default)]
pub struct PenaltyFilter {
    pub parent_id: Option<i32>,
    pub meeting_id: Option<i32>,
    pub status: Option<PaymentStatus>,
}

pub(crate) async fn ensure_parent_exists<C: ConnectionTrait>(db: &C, parent_id: i32) -> Result<user::Model> {
    user::Entity::find_by_id(parent_id)
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::not_found("Parent", parent_id))
}

async fn find_penalty<C: ConnectionTrait>(db: &C, id: i32) -> Result<penalty::Model> {
    penalty::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::not_found("Penalty", id))
}

async fn has_payments<C: ConnectionTrait>(db: &C, penalty_id: i32) -> Result<bool> {
    let count = penalty_payment::Entity::find()
        .filter(penalty_payment::Column::PenaltyId.eq(penalty_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Creates a penalty in its initial (UNPAID) state.
///
/// Generic over the connection so it can run inside the meeting finalization
/// transaction.
#[instrument(skip(db, input), fields(parent_id = input.parent_id))]
pub async fn create_penalty<C: ConnectionTrait>(
    db: &C,
    input: NewPenalty,
    now: NaiveDateTime,
) -> Result<penalty::Model> {
    ensure_parent_exists(db, input.parent_id).await?;
    if let Some(meeting_id) = input.meeting_id {
        meeting::Entity::find_by_id(meeting_id)
            .one(db)
            .await?
            .ok_or_else(|| ComputeError::not_found("Meeting", meeting_id))?;
    }
    if input.reason.trim().is_empty() {
        return Err(ComputeError::InvalidInput("Reason is required".to_string()));
    }

    let state = BalanceState::new(input.amount, input.discount_amount)?;
    let mut active = penalty::ActiveModel {
        parent_id: Set(input.parent_id),
        meeting_id: Set(input.meeting_id),
        attendance_id: Set(input.attendance_id),
        reason: Set(input.reason),
        waived_reason: Set(None),
        waived_at: Set(None),
        due_date: Set(input.due_date),
        paid_at: Set(if state.is_paid() { Some(now) } else { None }),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    penalty::Model::apply_state(&mut active, &state);

    let model = active.insert(db).await?;
    debug!("Created penalty {} for parent {}", model.id, model.parent_id);
    Ok(model)
}

#[instrument(skip(db))]
pub async fn get_penalty(db: &DatabaseConnection, id: i32) -> Result<penalty::Model> {
    find_penalty(db, id).await
}

#[instrument(skip(db))]
pub async fn list_penalties(
    db: &DatabaseConnection,
    filter: &PenaltyFilter,
) -> Result<Vec<penalty::Model>> {
    let mut query = penalty::Entity::find();
    if let Some(parent_id) = filter.parent_id {
        query = query.filter(penalty::Column::ParentId.eq(parent_id));
    }
    if let Some(meeting_id) = filter.meeting_id {
        query = query.filter(penalty::Column::MeetingId.eq(meeting_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(penalty::Column::PaymentStatus.eq(status));
    }
    Ok(query
        .order_by_desc(penalty::Column::CreatedAt)
        .order_by_desc(penalty::Column::Id)
        .all(db)
        .await?)
}

/// Payment history of a penalty, oldest first.
pub async fn list_penalty_payments(
    db: &DatabaseConnection,
    penalty_id: i32,
) -> Result<Vec<penalty_payment::Model>> {
    find_penalty(db, penalty_id).await?;
    Ok(penalty_payment::Entity::find()
        .filter(penalty_payment::Column::PenaltyId.eq(penalty_id))
        .order_by_asc(penalty_payment::Column::PaidAt)
        .order_by_asc(penalty_payment::Column::Id)
        .all(db)
        .await?)
}

#[instrument(skip(db, update))]
pub async fn update_penalty(
    db: &DatabaseConnection,
    id: i32,
    update: PenaltyUpdate,
    now: NaiveDateTime,
) -> Result<penalty::Model> {
    let txn = db.begin().await?;

    let existing = find_penalty(&txn, id).await?;
    let state = existing.state();
    state.ensure_editable()?;

    let mut active: penalty::ActiveModel = existing.into();

    if update.amount.is_some() || update.discount_amount.is_some() {
        let payments = has_payments(&txn, id).await?;
        record::reprice::<penalty::Model>(
            &mut active,
            &state,
            update.amount,
            update.discount_amount,
            payments,
            now,
        )?;
    }
    if let Some(reason) = update.reason {
        if reason.trim().is_empty() {
            return Err(ComputeError::InvalidInput("Reason is required".to_string()));
        }
        active.reason = Set(reason);
    }
    if let Some(due_date) = update.due_date {
        active.due_date = Set(due_date);
    }
    active.updated_at = Set(now);

    let model = active.update(&txn).await?;
    txn.commit().await?;

    debug!("Updated penalty {}", id);
    Ok(model)
}

#[instrument(skip(db))]
pub async fn delete_penalty(db: &DatabaseConnection, id: i32) -> Result<()> {
    let txn = db.begin().await?;

    let existing = find_penalty(&txn, id).await?;
    let payments = has_payments(&txn, id).await?;
    existing.state().ensure_deletable(payments)?;

    penalty::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted penalty {}", id);
    Ok(())
}

/// Appends a payment row and updates the penalty balance in one transaction.
#[instrument(skip(db, payment), fields(amount = %payment.amount))]
pub async fn record_penalty_payment(
    db: &DatabaseConnection,
    id: i32,
    payment: PaymentInput,
    now: NaiveDateTime,
) -> Result<(penalty::Model, penalty_payment::Model)> {
    let txn = db.begin().await?;

    let existing = find_penalty(&txn, id).await?;
    let next = existing.state().record_payment(payment.amount)?;

    let history = penalty_payment::ActiveModel {
        penalty_id: Set(id),
        amount: Set(payment.amount),
        method: Set(payment.method),
        reference: Set(payment.reference),
        notes: Set(payment.notes),
        paid_at: Set(now),
        recorded_by: Set(payment.recorded_by),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let model = record::save_payment(&txn, existing, &next, now).await?;

    txn.commit().await?;

    info!(
        "Recorded payment of {} on penalty {} (balance {}, {:?})",
        history.amount, id, model.balance, model.payment_status
    );
    Ok((model, history))
}

#[instrument(skip(db))]
pub async fn waive_penalty(
    db: &DatabaseConnection,
    id: i32,
    reason: Option<String>,
    now: NaiveDateTime,
) -> Result<penalty::Model> {
    let txn = db.begin().await?;

    let existing = find_penalty(&txn, id).await?;
    let next = existing.state().waive()?;

    let model = record::save_waiver(&txn, existing, &next, reason, now).await?;

    txn.commit().await?;

    info!("Waived penalty {} ({} forgiven)", id, model.waived_amount);
    Ok(model)
}

/// Flags every open penalty whose due date has passed. Returns how many rows changed.
#[instrument(skip(db))]
pub async fn mark_overdue_penalties(
    db: &DatabaseConnection,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<u64> {
    let txn = db.begin().await?;

    let candidates = penalty::Entity::find()
        .filter(penalty::Column::PaymentStatus.is_in([
            PaymentStatus::Unpaid,
            PaymentStatus::Partial,
            PaymentStatus::Overdue,
        ]))
        .filter(penalty::Column::DueDate.lt(today))
        .all(&txn)
        .await?;

    let touched = record::flag_overdue(&txn, candidates, today, now).await?;

    txn.commit().await?;

    info!("Marked {} penalties overdue as of {}", touched, today);
    Ok(touched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, d, date, new_meeting, new_parent, now, setup_db};
    use model::entities::payment::PaymentMethod;

    fn cash(amount: Decimal) -> PaymentInput {
        PaymentInput {
            amount,
            method: PaymentMethod::Cash,
            reference: None,
            notes: None,
            recorded_by: None,
        }
    }

    fn new_penalty(parent_id: i32, amount: Decimal) -> NewPenalty {
        NewPenalty {
            parent_id,
            meeting_id: None,
            attendance_id: None,
            reason: "Absent from general assembly".to_string(),
            amount,
            discount_amount: Decimal::ZERO,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn test_payment_flow_persists_history() -> Result<()> {
        let db = setup_db().await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let penalty = create_penalty(&db, new_penalty(parent.id, d(500)), now()).await?;
        assert_eq!(penalty.payment_status, PaymentStatus::Unpaid);
        assert_eq!(penalty.balance, d(500));

        let (penalty, _) = record_penalty_payment(&db, penalty.id, cash(d(200)), now()).await?;
        assert_eq!(penalty.balance, d(300));
        assert_eq!(penalty.payment_status, PaymentStatus::Partial);

        let (penalty, _) = record_penalty_payment(&db, penalty.id, cash(d(300)), now()).await?;
        assert_eq!(penalty.balance, Decimal::ZERO);
        assert_eq!(penalty.payment_status, PaymentStatus::Paid);
        assert!(penalty.is_paid);
        assert_eq!(penalty.paid_at, Some(now()));

        let err = record_penalty_payment(&db, penalty.id, cash(d(1)), now())
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::Rule(_)));

        let history = list_penalty_payments(&db, penalty.id).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, d(200));

        Ok(())
    }

    #[tokio::test]
    async fn test_overpayment_leaves_state_unchanged() -> Result<()> {
        let db = setup_db().await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let penalty = create_penalty(&db, new_penalty(parent.id, d(100)), now()).await?;

        let err = record_penalty_payment(&db, penalty.id, cash(d(150)), now())
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::Rule(_)));

        let reloaded = get_penalty(&db, penalty.id).await?;
        assert_eq!(reloaded, penalty);
        assert!(list_penalty_payments(&db, penalty.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_blocked_by_payment_history() -> Result<()> {
        let db = setup_db().await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let paid = create_penalty(&db, new_penalty(parent.id, d(100)), now()).await?;
        record_penalty_payment(&db, paid.id, cash(d(10)), now()).await?;

        let err = delete_penalty(&db, paid.id).await.unwrap_err();
        assert!(err.to_string().contains("waive it instead"));

        let untouched = create_penalty(&db, new_penalty(parent.id, d(100)), now()).await?;
        delete_penalty(&db, untouched.id).await?;
        assert!(matches!(
            get_penalty(&db, untouched.id).await,
            Err(ComputeError::NotFound(_))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_edits_locked_after_payment() -> Result<()> {
        let db = setup_db().await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let penalty = create_penalty(&db, new_penalty(parent.id, d(100)), now()).await?;

        let edited = update_penalty(
            &db,
            penalty.id,
            PenaltyUpdate {
                amount: Some(d(80)),
                discount_amount: Some(d(30)),
                ..Default::default()
            },
            now(),
        )
        .await?;
        assert_eq!(edited.balance, d(50));

        record_penalty_payment(&db, penalty.id, cash(d(5)), now()).await?;
        let err = update_penalty(
            &db,
            penalty.id,
            PenaltyUpdate {
                amount: Some(d(60)),
                ..Default::default()
            },
            now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ComputeError::Rule(_)));

        // non-monetary fields can still change
        let edited = update_penalty(
            &db,
            penalty.id,
            PenaltyUpdate {
                reason: Some("Late arrival".to_string()),
                ..Default::default()
            },
            now(),
        )
        .await?;
        assert_eq!(edited.reason, "Late arrival");

        Ok(())
    }

    #[tokio::test]
    async fn test_waive() -> Result<()> {
        let db = setup_db().await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let penalty = create_penalty(&db, new_penalty(parent.id, d(100)), now()).await?;
        record_penalty_payment(&db, penalty.id, cash(d(40)), now()).await?;

        let waived = waive_penalty(&db, penalty.id, Some("Hardship".to_string()), now()).await?;
        assert_eq!(waived.payment_status, PaymentStatus::Waived);
        assert!(waived.is_waived);
        assert_eq!(waived.balance, Decimal::ZERO);
        assert_eq!(waived.waived_amount, d(60));
        assert_eq!(waived.waived_reason.as_deref(), Some("Hardship"));

        assert!(waive_penalty(&db, penalty.id, None, now()).await.is_err());
        assert!(
            update_penalty(&db, penalty.id, PenaltyUpdate::default(), now())
                .await
                .is_err()
        );

        let paid = create_penalty(&db, new_penalty(parent.id, d(10)), now()).await?;
        record_penalty_payment(&db, paid.id, cash(d(10)), now()).await?;
        let err = waive_penalty(&db, paid.id, None, now()).await.unwrap_err();
        assert!(matches!(err, ComputeError::Rule(_)));

        Ok(())
    }

    #[tokio::test]
    async fn test_mark_overdue() -> Result<()> {
        let db = setup_db().await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let meeting = new_meeting(&db, at(2025, 5, 1, 9, 0)).await?;

        let mut late = new_penalty(parent.id, d(100));
        late.meeting_id = Some(meeting.id);
        late.due_date = Some(date(2025, 6, 1));
        let late = create_penalty(&db, late, now()).await?;

        let mut partial = new_penalty(parent.id, d(100));
        partial.due_date = Some(date(2025, 6, 4));
        let partial = create_penalty(&db, partial, now()).await?;
        record_penalty_payment(&db, partial.id, cash(d(30)), now()).await?;

        let mut not_due = new_penalty(parent.id, d(100));
        not_due.due_date = Some(date(2025, 7, 1));
        let not_due = create_penalty(&db, not_due, now()).await?;

        let no_due_date = create_penalty(&db, new_penalty(parent.id, d(100)), now()).await?;

        let touched = mark_overdue_penalties(&db, date(2025, 6, 14), now()).await?;
        assert_eq!(touched, 2);

        let late = get_penalty(&db, late.id).await?;
        assert_eq!(late.payment_status, PaymentStatus::Overdue);
        assert!(late.is_overdue);
        assert_eq!(late.days_overdue, 13);

        let partial = get_penalty(&db, partial.id).await?;
        assert_eq!(partial.payment_status, PaymentStatus::Partial);
        assert!(partial.is_overdue);
        assert_eq!(partial.days_overdue, 10);

        assert!(!get_penalty(&db, not_due.id).await?.is_overdue);
        assert!(!get_penalty(&db, no_due_date.id).await?.is_overdue);

        // running it again on the same day changes nothing
        assert_eq!(mark_overdue_penalties(&db, date(2025, 6, 14), now()).await?, 0);
        // a day later the counters move
        assert_eq!(mark_overdue_penalties(&db, date(2025, 6, 15), now()).await?, 2);

        // a payment clears the flag
        let (paid, _) = record_penalty_payment(&db, late.id, cash(d(10)), now()).await?;
        assert!(!paid.is_overdue);
        assert_eq!(paid.payment_status, PaymentStatus::Partial);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_validates_input() -> Result<()> {
        let db = setup_db().await?;
        let parent = new_parent(&db, "parent@example.com").await?;

        let err = create_penalty(&db, new_penalty(999, d(100)), now()).await.unwrap_err();
        assert!(matches!(err, ComputeError::NotFound(_)));

        let mut bad = new_penalty(parent.id, d(100));
        bad.discount_amount = d(120);
        assert!(matches!(
            create_penalty(&db, bad, now()).await,
            Err(ComputeError::InvalidInput(_))
        ));

        let filter = PenaltyFilter {
            parent_id: Some(parent.id),
            ..Default::default()
        };
        assert!(list_penalties(&db, &filter).await?.is_empty());

        Ok(())
    }
}
