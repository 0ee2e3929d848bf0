use anyhow::{bail, Context, Result};
use model::entities::user::{self, UserRole};
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, trace};

use crate::auth::hash_password;
use crate::config::AppConfig;
use crate::handlers::{normalize_email, now};

/// Creates an administrator that can log in immediately.
///
/// Self-registration only ever produces parents, so the first admin of a fresh
/// installation has to come from here.
pub async fn create_admin(
    config: &AppConfig,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<()> {
    trace!("Entering create_admin function");
    let email = normalize_email(email);
    if !email.contains('@') {
        bail!("'{}' is not a valid email address", email);
    }
    if password.len() < 8 {
        bail!("Password must be at least 8 characters long");
    }

    let db = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", config.database_url))?;

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&db)
        .await?;
    if existing.is_some() {
        bail!("An account with email {} already exists", email);
    }

    debug!("Hashing password with cost {}", config.bcrypt_cost);
    let password_hash = hash_password(password.to_string(), config.bcrypt_cost).await?;
    let timestamp = now();
    let admin = user::ActiveModel {
        email: Set(email),
        password_hash: Set(password_hash),
        first_name: Set(first_name.trim().to_string()),
        last_name: Set(last_name.trim().to_string()),
        phone: Set(None),
        role: Set(UserRole::Admin),
        is_active: Set(true),
        is_verified: Set(true),
        created_at: Set(timestamp),
        updated_at: Set(timestamp),
        ..Default::default()
    }
    .insert(&db)
    .await
    .context("Failed to create administrator")?;

    info!("Administrator {} created with id {}", admin.email, admin.id);
    Ok(())
}
