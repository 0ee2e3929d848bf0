use anyhow::{Context, Result};
use sea_orm::Database;
use tracing::{info, trace};

use crate::handlers::now;

pub async fn mark_overdue(database_url: &str) -> Result<()> {
    trace!("Entering mark_overdue function");
    let db = Database::connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", database_url))?;

    let timestamp = now();
    let summary = compute::mark_overdue(&db, timestamp.date(), timestamp).await?;
    info!(
        "Overdue scan as of {}: {} penalties and {} contributions marked",
        summary.as_of, summary.penalties_marked, summary.contributions_marked
    );
    Ok(())
}
