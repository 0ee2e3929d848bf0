use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tracing::{debug, info, trace};

/// Connects and applies every pending migration, including the settings seed.
pub async fn run_migrations(database_url: &str) -> Result<DatabaseConnection> {
    trace!("Connecting to database for migrations");
    debug!("Database URL: {}", database_url);
    let db = Database::connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", database_url))?;

    info!("Running database migrations");
    Migrator::up(&db, None)
        .await
        .context("Failed to run database migrations")?;
    debug!("All pending migrations have been applied");
    Ok(db)
}

pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    run_migrations(database_url).await?;
    info!("Database initialization completed successfully!");
    Ok(())
}
