//! Money and attendance rules of the association.
//!
//! Each service function takes a database handle plus an explicit `now`/`today`
//! and performs its checks and writes inside a single transaction.

pub mod attendance;
pub mod balance;
pub mod contribution;
pub mod dashboard;
pub mod error;
pub mod penalty;
pub mod project;
mod record;

#[cfg(test)]
mod testing;

use chrono::{NaiveDate, NaiveDateTime};
use common::OverdueScanSummary;
use sea_orm::DatabaseConnection;
use tracing::instrument;

/// Runs the overdue scan over penalties and contributions.
#[instrument(skip(db))]
pub async fn mark_overdue(
    db: &DatabaseConnection,
    today: NaiveDate,
    now: NaiveDateTime,
) -> error::Result<OverdueScanSummary> {
    let penalties_marked = penalty::mark_overdue_penalties(db, today, now).await?;
    let contributions_marked = contribution::mark_overdue_contributions(db, today, now).await?;
    Ok(OverdueScanSummary {
        as_of: today,
        penalties_marked,
        contributions_marked,
    })
}
