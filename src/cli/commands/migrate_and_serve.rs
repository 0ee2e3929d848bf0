use anyhow::Result;
use tracing::{info, trace};

use super::initdb::run_migrations;
use super::serve::serve;
use crate::config::AppConfig;

pub async fn migrate_and_serve(config: AppConfig) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");

    // The connection used for migrations is dropped; serving opens its own.
    run_migrations(&config.database_url).await?;
    serve(config).await
}
