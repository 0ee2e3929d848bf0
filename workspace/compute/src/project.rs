//! Projects and their expense ledger.
//!
//! Every expense write is paired with an adjustment of the project's
//! `total_expenses` and `balance` by the same delta inside one transaction, so
//! `balance == budget - total_expenses` holds after each call.

use chrono::{NaiveDate, NaiveDateTime};
use model::entities::{contribution, project, project_expense};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{ComputeError, Result};

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub budget: Decimal,
    pub status: project::ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub budget: Option<Decimal>,
    pub status: Option<project::ProjectStatus>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub description: String,
    pub category: Option<String>,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub receipt_url: Option<String>,
    pub recorded_by: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct ExpenseUpdate {
    pub description: Option<String>,
    pub category: Option<Option<String>>,
    pub amount: Option<Decimal>,
    pub expense_date: Option<NaiveDate>,
    pub receipt_url: Option<Option<String>>,
}

async fn find_project<C: ConnectionTrait>(db: &C, id: i32) -> Result<project::Model> {
    project::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::not_found("Project", id))
}

async fn find_expense<C: ConnectionTrait>(
    db: &C,
    project_id: i32,
    expense_id: i32,
) -> Result<project_expense::Model> {
    project_expense::Entity::find_by_id(expense_id)
        .filter(project_expense::Column::ProjectId.eq(project_id))
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::not_found("Expense", expense_id))
}

fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ComputeError::InvalidInput(
                "End date cannot be before the start date".to_string(),
            ));
        }
    }
    Ok(())
}

/// Moves `total_expenses` by `delta` and re-derives the balance.
///
/// Fails without writing when the balance would drop below zero.
async fn apply_expense_delta<C: ConnectionTrait>(
    db: &C,
    project: project::Model,
    delta: Decimal,
    now: NaiveDateTime,
) -> Result<project::Model> {
    let total_expenses = project.total_expenses + delta;
    let balance = project.budget - total_expenses;
    if balance < Decimal::ZERO {
        return Err(ComputeError::Rule(format!(
            "Expense exceeds the remaining project balance of {}",
            project.balance
        )));
    }

    let mut active: project::ActiveModel = project.into();
    active.total_expenses = Set(total_expenses);
    active.balance = Set(balance);
    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}

#[instrument(skip(db, input))]
pub async fn create_project(
    db: &DatabaseConnection,
    input: NewProject,
    now: NaiveDateTime,
) -> Result<project::Model> {
    if input.name.trim().is_empty() {
        return Err(ComputeError::InvalidInput("Name is required".to_string()));
    }
    if input.budget < Decimal::ZERO {
        return Err(ComputeError::InvalidInput(
            "Budget cannot be negative".to_string(),
        ));
    }
    validate_dates(input.start_date, input.end_date)?;

    let model = project::ActiveModel {
        name: Set(input.name),
        description: Set(input.description),
        budget: Set(input.budget),
        total_expenses: Set(Decimal::ZERO),
        balance: Set(input.budget),
        total_raised: Set(Decimal::ZERO),
        status: Set(input.status),
        start_date: Set(input.start_date),
        end_date: Set(input.end_date),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created project {} ({})", model.id, model.name);
    Ok(model)
}

pub async fn get_project(db: &DatabaseConnection, id: i32) -> Result<project::Model> {
    find_project(db, id).await
}

pub async fn list_projects(
    db: &DatabaseConnection,
    status: Option<project::ProjectStatus>,
) -> Result<Vec<project::Model>> {
    let mut query = project::Entity::find();
    if let Some(status) = status {
        query = query.filter(project::Column::Status.eq(status));
    }
    Ok(query.order_by_desc(project::Column::CreatedAt).all(db).await?)
}

/// Edits a project. A budget change re-derives the balance and is rejected if
/// the recorded expenses would exceed it.
#[instrument(skip(db, update))]
pub async fn update_project(
    db: &DatabaseConnection,
    id: i32,
    update: ProjectUpdate,
    now: NaiveDateTime,
) -> Result<project::Model> {
    let txn = db.begin().await?;
    let existing = find_project(&txn, id).await?;

    let start_date = update.start_date.unwrap_or(existing.start_date);
    let end_date = update.end_date.unwrap_or(existing.end_date);
    validate_dates(start_date, end_date)?;

    let mut active: project::ActiveModel = existing.clone().into();
    if let Some(budget) = update.budget {
        let balance = budget - existing.total_expenses;
        if budget < Decimal::ZERO || balance < Decimal::ZERO {
            return Err(ComputeError::Rule(format!(
                "Budget cannot be lower than the recorded expenses of {}",
                existing.total_expenses
            )));
        }
        active.budget = Set(budget);
        active.balance = Set(balance);
    }
    if let Some(name) = update.name {
        if name.trim().is_empty() {
            return Err(ComputeError::InvalidInput("Name is required".to_string()));
        }
        active.name = Set(name);
    }
    if let Some(description) = update.description {
        active.description = Set(description);
    }
    if let Some(status) = update.status {
        active.status = Set(status);
    }
    active.start_date = Set(start_date);
    active.end_date = Set(end_date);
    active.updated_at = Set(now);

    let model = active.update(&txn).await?;
    txn.commit().await?;

    debug!("Updated project {}", id);
    Ok(model)
}

#[instrument(skip(db))]
pub async fn delete_project(db: &DatabaseConnection, id: i32) -> Result<()> {
    let txn = db.begin().await?;
    find_project(&txn, id).await?;

    let expenses = project_expense::Entity::find()
        .filter(project_expense::Column::ProjectId.eq(id))
        .count(&txn)
        .await?;
    let contributions = contribution::Entity::find()
        .filter(contribution::Column::ProjectId.eq(id))
        .count(&txn)
        .await?;
    if expenses > 0 || contributions > 0 {
        warn!(
            "Refusing to delete project {} ({} expenses, {} contributions)",
            id, expenses, contributions
        );
        return Err(ComputeError::Rule(
            "Cannot delete a project with recorded expenses or contributions".to_string(),
        ));
    }

    project::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted project {}", id);
    Ok(())
}

pub async fn list_expenses(
    db: &DatabaseConnection,
    project_id: i32,
) -> Result<Vec<project_expense::Model>> {
    find_project(db, project_id).await?;
    Ok(project_expense::Entity::find()
        .filter(project_expense::Column::ProjectId.eq(project_id))
        .order_by_desc(project_expense::Column::ExpenseDate)
        .order_by_desc(project_expense::Column::Id)
        .all(db)
        .await?)
}

#[instrument(skip(db, input), fields(amount = %input.amount))]
pub async fn add_expense(
    db: &DatabaseConnection,
    project_id: i32,
    input: NewExpense,
    now: NaiveDateTime,
) -> Result<(project_expense::Model, project::Model)> {
    if input.amount <= Decimal::ZERO {
        return Err(ComputeError::InvalidInput(
            "Expense amount must be greater than zero".to_string(),
        ));
    }
    if input.description.trim().is_empty() {
        return Err(ComputeError::InvalidInput(
            "Description is required".to_string(),
        ));
    }

    let txn = db.begin().await?;
    let project = find_project(&txn, project_id).await?;
    let project = apply_expense_delta(&txn, project, input.amount, now).await?;

    let expense = project_expense::ActiveModel {
        project_id: Set(project_id),
        description: Set(input.description),
        category: Set(input.category),
        amount: Set(input.amount),
        expense_date: Set(input.expense_date),
        receipt_url: Set(input.receipt_url),
        recorded_by: Set(input.recorded_by),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
        "Recorded expense {} of {} on project {} (balance {})",
        expense.id, expense.amount, project_id, project.balance
    );
    Ok((expense, project))
}

#[instrument(skip(db, update))]
pub async fn update_expense(
    db: &DatabaseConnection,
    project_id: i32,
    expense_id: i32,
    update: ExpenseUpdate,
    now: NaiveDateTime,
) -> Result<(project_expense::Model, project::Model)> {
    let txn = db.begin().await?;
    let existing = find_expense(&txn, project_id, expense_id).await?;
    let mut project = find_project(&txn, project_id).await?;

    let mut active: project_expense::ActiveModel = existing.clone().into();
    if let Some(amount) = update.amount {
        if amount <= Decimal::ZERO {
            return Err(ComputeError::InvalidInput(
                "Expense amount must be greater than zero".to_string(),
            ));
        }
        let delta = amount - existing.amount;
        if !delta.is_zero() {
            project = apply_expense_delta(&txn, project, delta, now).await?;
        }
        active.amount = Set(amount);
    }
    if let Some(description) = update.description {
        if description.trim().is_empty() {
            return Err(ComputeError::InvalidInput(
                "Description is required".to_string(),
            ));
        }
        active.description = Set(description);
    }
    if let Some(category) = update.category {
        active.category = Set(category);
    }
    if let Some(expense_date) = update.expense_date {
        active.expense_date = Set(expense_date);
    }
    if let Some(receipt_url) = update.receipt_url {
        active.receipt_url = Set(receipt_url);
    }
    active.updated_at = Set(now);

    let expense = active.update(&txn).await?;
    txn.commit().await?;

    debug!("Updated expense {} on project {}", expense_id, project_id);
    Ok((expense, project))
}

#[instrument(skip(db))]
pub async fn delete_expense(
    db: &DatabaseConnection,
    project_id: i32,
    expense_id: i32,
    now: NaiveDateTime,
) -> Result<project::Model> {
    let txn = db.begin().await?;
    let existing = find_expense(&txn, project_id, expense_id).await?;
    let project = find_project(&txn, project_id).await?;

    project_expense::Entity::delete_by_id(expense_id)
        .exec(&txn)
        .await?;
    let project = apply_expense_delta(&txn, project, -existing.amount, now).await?;

    txn.commit().await?;

    info!("Deleted expense {} from project {}", expense_id, project_id);
    Ok(project)
}

/// Re-derives the ledger from the stored rows and refreshes `total_raised` from
/// the amounts paid on the project's contributions.
#[instrument(skip(db))]
pub async fn recalculate_project_totals(
    db: &DatabaseConnection,
    project_id: i32,
    now: NaiveDateTime,
) -> Result<project::Model> {
    let txn = db.begin().await?;
    let project = find_project(&txn, project_id).await?;

    let total_expenses: Decimal = project_expense::Entity::find()
        .filter(project_expense::Column::ProjectId.eq(project_id))
        .all(&txn)
        .await?
        .iter()
        .map(|expense| expense.amount)
        .sum();
    let total_raised: Decimal = contribution::Entity::find()
        .filter(contribution::Column::ProjectId.eq(project_id))
        .all(&txn)
        .await?
        .iter()
        .map(|contribution| contribution.amount_paid)
        .sum();

    if total_expenses != project.total_expenses {
        warn!(
            "Project {} expense total drifted: stored {}, recomputed {}",
            project_id, project.total_expenses, total_expenses
        );
    }

    let budget = project.budget;
    let mut active: project::ActiveModel = project.into();
    active.total_expenses = Set(total_expenses);
    active.balance = Set(budget - total_expenses);
    active.total_raised = Set(total_raised);
    active.updated_at = Set(now);
    let model = active.update(&txn).await?;

    txn.commit().await?;

    info!(
        "Recalculated project {}: raised {}, spent {}, balance {}",
        project_id, model.total_raised, model.total_expenses, model.balance
    );
    Ok(model)
}
