pub mod announcements;
pub mod attendance;
pub mod auth;
pub mod contributions;
pub mod dashboard;
pub mod health;
pub mod meetings;
pub mod officers;
pub mod penalties;
pub mod projects;
pub mod settings;
pub mod students;
pub mod users;

use chrono::{NaiveDateTime, Utc};

/// Current UTC time; every service call receives it explicitly.
pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
