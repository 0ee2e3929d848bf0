//! Contribution service. Shares the balance rules with penalties and adds
//! bulk assignment to every active parent.

use chrono::{NaiveDate, NaiveDateTime};
use model::entities::payment::PaymentStatus;
use model::entities::{contribution, contribution_payment, project, user};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument};

use crate::balance::{BalanceState, PaymentInput};
use crate::error::{ComputeError, Result};
use crate::record::{self, BalanceRecord};
use crate::penalty::ensure_parent_exists;

/// Contribution fields shared by single and bulk creation.
#[derive(Debug, Clone)]
pub struct ContributionTerms {
    pub project_id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub discount_amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct ContributionUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Default)]
pub struct ContributionFilter {
    pub parent_id: Option<i32>,
    pub project_id: Option<i32>,
    pub status: Option<PaymentStatus>,
}

async fn find_contribution<C: ConnectionTrait>(db: &C, id: i32) -> Result<contribution::Model> {
    contribution::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::not_found("Contribution", id))
}

async fn has_payments<C: ConnectionTrait>(db: &C, contribution_id: i32) -> Result<bool> {
    let count = contribution_payment::Entity::find()
        .filter(contribution_payment::Column::ContributionId.eq(contribution_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

async fn validate_terms<C: ConnectionTrait>(db: &C, terms: &ContributionTerms) -> Result<BalanceState> {
    if terms.title.trim().is_empty() {
        return Err(ComputeError::InvalidInput("Title is required".to_string()));
    }
    if let Some(project_id) = terms.project_id {
        project::Entity::find_by_id(project_id)
            .one(db)
            .await?
            .ok_or_else(|| ComputeError::not_found("Project", project_id))?;
    }
    BalanceState::new(terms.amount, terms.discount_amount)
}

fn new_active(
    parent_id: i32,
    terms: &ContributionTerms,
    state: &BalanceState,
    now: NaiveDateTime,
) -> contribution::ActiveModel {
    let mut active = contribution::ActiveModel {
        parent_id: Set(parent_id),
        project_id: Set(terms.project_id),
        title: Set(terms.title.clone()),
        description: Set(terms.description.clone()),
        waived_reason: Set(None),
        waived_at: Set(None),
        due_date: Set(terms.due_date),
        paid_at: Set(if state.is_paid() { Some(now) } else { None }),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    contribution::Model::apply_state(&mut active, state);
    active
}

#[instrument(skip(db, terms))]
pub async fn create_contribution(
    db: &DatabaseConnection,
    parent_id: i32,
    terms: ContributionTerms,
    now: NaiveDateTime,
) -> Result<contribution::Model> {
    ensure_parent_exists(db, parent_id).await?;
    let state = validate_terms(db, &terms).await?;

    let model = new_active(parent_id, &terms, &state, now).insert(db).await?;
    debug!("Created contribution {} for parent {}", model.id, parent_id);
    Ok(model)
}

/// Assigns the same contribution to every active parent. Returns the created rows.
#[instrument(skip(db, terms))]
pub async fn create_contributions_for_all_parents(
    db: &DatabaseConnection,
    terms: ContributionTerms,
    now: NaiveDateTime,
) -> Result<Vec<contribution::Model>> {
    let txn = db.begin().await?;
    let state = validate_terms(&txn, &terms).await?;

    let parents = user::Entity::find()
        .filter(user::Column::Role.eq(user::UserRole::Parent))
        .filter(user::Column::IsActive.eq(true))
        .order_by_asc(user::Column::Id)
        .all(&txn)
        .await?;

    let mut created = Vec::with_capacity(parents.len());
    for parent in &parents {
        created.push(new_active(parent.id, &terms, &state, now).insert(&txn).await?);
    }
    txn.commit().await?;

    info!(
        "Assigned contribution '{}' to {} parents",
        terms.title,
        created.len()
    );
    Ok(created)
}

#[instrument(skip(db))]
pub async fn get_contribution(db: &DatabaseConnection, id: i32) -> Result<contribution::Model> {
    find_contribution(db, id).await
}

#[instrument(skip(db))]
pub async fn list_contributions(
    db: &DatabaseConnection,
    filter: &ContributionFilter,
) -> Result<Vec<contribution::Model>> {
    let mut query = contribution::Entity::find();
    if let Some(parent_id) = filter.parent_id {
        query = query.filter(contribution::Column::ParentId.eq(parent_id));
    }
    if let Some(project_id) = filter.project_id {
        query = query.filter(contribution::Column::ProjectId.eq(project_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(contribution::Column::PaymentStatus.eq(status));
    }
    Ok(query
        .order_by_desc(contribution::Column::CreatedAt)
        .order_by_desc(contribution::Column::Id)
        .all(db)
        .await?)
}

pub async fn list_contribution_payments(
    db: &DatabaseConnection,
    contribution_id: i32,
) -> Result<Vec<contribution_payment::Model>> {
    find_contribution(db, contribution_id).await?;
    Ok(contribution_payment::Entity::find()
        .filter(contribution_payment::Column::ContributionId.eq(contribution_id))
        .order_by_asc(contribution_payment::Column::PaidAt)
        .order_by_asc(contribution_payment::Column::Id)
        .all(db)
        .await?)
}

#[instrument(skip(db, update))]
pub async fn update_contribution(
    db: &DatabaseConnection,
    id: i32,
    update: ContributionUpdate,
    now: NaiveDateTime,
) -> Result<contribution::Model> {
    let txn = db.begin().await?;

    let existing = find_contribution(&txn, id).await?;
    let state = existing.state();
    state.ensure_editable()?;

    let mut active: contribution::ActiveModel = existing.into();
    if update.amount.is_some() || update.discount_amount.is_some() {
        let payments = has_payments(&txn, id).await?;
        record::reprice::<contribution::Model>(
            &mut active,
            &state,
            update.amount,
            update.discount_amount,
            payments,
            now,
        )?;
    }
    if let Some(title) = update.title {
        if title.trim().is_empty() {
            return Err(ComputeError::InvalidInput("Title is required".to_string()));
        }
        active.title = Set(title);
    }
    if let Some(description) = update.description {
        active.description = Set(description);
    }
    if let Some(due_date) = update.due_date {
        active.due_date = Set(due_date);
    }
    active.updated_at = Set(now);

    let model = active.update(&txn).await?;
    txn.commit().await?;

    debug!("Updated contribution {}", id);
    Ok(model)
}

#[instrument(skip(db))]
pub async fn delete_contribution(db: &DatabaseConnection, id: i32) -> Result<()> {
    let txn = db.begin().await?;

    let existing = find_contribution(&txn, id).await?;
    let payments = has_payments(&txn, id).await?;
    existing.state().ensure_deletable(payments)?;

    contribution::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted contribution {}", id);
    Ok(())
}

#[instrument(skip(db, payment), fields(amount = %payment.amount))]
pub async fn record_contribution_payment(
    db: &DatabaseConnection,
    id: i32,
    payment: PaymentInput,
    now: NaiveDateTime,
) -> Result<(contribution::Model, contribution_payment::Model)> {
    let txn = db.begin().await?;

    let existing = find_contribution(&txn, id).await?;
    let next = existing.state().record_payment(payment.amount)?;

    let history = contribution_payment::ActiveModel {
        contribution_id: Set(id),
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
        "Recorded payment of {} on contribution {} (balance {}, {:?})",
        history.amount, id, model.balance, model.payment_status
    );
    Ok((model, history))
}

#[instrument(skip(db))]
pub async fn waive_contribution(
    db: &DatabaseConnection,
    id: i32,
    reason: Option<String>,
    now: NaiveDateTime,
) -> Result<contribution::Model> {
    let txn = db.begin().await?;

    let existing = find_contribution(&txn, id).await?;
    let next = existing.state().waive()?;

    let model = record::save_waiver(&txn, existing, &next, reason, now).await?;

    txn.commit().await?;

    info!("Waived contribution {} ({} forgiven)", id, model.waived_amount);
    Ok(model)
}

#[instrument(skip(db))]
pub async fn mark_overdue_contributions(
    db: &DatabaseConnection,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<u64> {
    let txn = db.begin().await?;

    let candidates = contribution::Entity::find()
        .filter(contribution::Column::PaymentStatus.is_in([
            PaymentStatus::Unpaid,
            PaymentStatus::Partial,
            PaymentStatus::Overdue,
        ]))
        .filter(contribution::Column::DueDate.lt(today))
        .all(&txn)
        .await?;

    let touched = record::flag_overdue(&txn, candidates, today, now).await?;

    txn.commit().await?;

    info!("Marked {} contributions overdue as of {}", touched, today);
    Ok(touched)
}
