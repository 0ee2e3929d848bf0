//! Database fixtures shared by the compute tests.

use chrono::{NaiveDate, NaiveDateTime};
use migration::{Migrator, MigratorTrait};
use model::entities::{meeting, project, settings, user};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Set,
};

pub async fn setup_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    // Enable foreign keys
    db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

    Migrator::up(&db, None).await.expect("Migrations failed.");
    Ok(db)
}

pub fn d(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

pub fn date(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn at(y: i32, m: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    date(y, m, day).and_hms_opt(hour, minute, 0).unwrap()
}

/// Fixed "now" used by most tests.
pub fn now() -> NaiveDateTime {
    at(2025, 6, 14, 9, 0)
}

pub async fn new_user(
    db: &DatabaseConnection,
    email: &str,
    role: user::UserRole,
) -> Result<user::Model, DbErr> {
    user::ActiveModel {
        email: Set(email.to_string()),
        password_hash: Set("not-a-real-hash".to_string()),
        first_name: Set("Ana".to_string()),
        last_name: Set("Reyes".to_string()),
        phone: Set(None),
        role: Set(role),
        is_active: Set(true),
        is_verified: Set(true),
        created_at: Set(now()),
        updated_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn new_parent(db: &DatabaseConnection, email: &str) -> Result<user::Model, DbErr> {
    new_user(db, email, user::UserRole::Parent).await
}

pub async fn new_meeting(
    db: &DatabaseConnection,
    meeting_date: NaiveDateTime,
) -> Result<meeting::Model, DbErr> {
    meeting::ActiveModel {
        title: Set("General Assembly".to_string()),
        description: Set(None),
        meeting_date: Set(meeting_date),
        location: Set(Some("Covered court".to_string())),
        status: Set(meeting::MeetingStatus::Scheduled),
        qr_code: Set(None),
        qr_code_expires_at: Set(None),
        created_by: Set(None),
        created_at: Set(now()),
        updated_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn new_project(db: &DatabaseConnection, budget: Decimal) -> Result<project::Model, DbErr> {
    project::ActiveModel {
        name: Set("Library repainting".to_string()),
        description: Set(None),
        budget: Set(budget),
        total_expenses: Set(Decimal::ZERO),
        balance: Set(budget),
        total_raised: Set(Decimal::ZERO),
        status: Set(project::ProjectStatus::Planning),
        start_date: Set(None),
        end_date: Set(None),
        created_at: Set(now()),
        updated_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn load_settings(db: &DatabaseConnection) -> Result<settings::Model, DbErr> {
    settings::Entity::find_by_id(settings::SETTINGS_ID)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("settings".to_string()))
}
