use anyhow::{Context, Result};
use config::{Config, Environment, File};
use moka::future::Cache;
use sea_orm::Database;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::JwtManager;
use crate::notifications::{LettreMailer, LogMailer, Mailer};
use crate::schemas::AppState;

const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

/// SMTP relay used for outgoing mail.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

/// Application configuration.
///
/// Layered from built-in defaults, an optional `ptadesk.toml` next to the
/// binary and environment variables (`DATABASE_URL`, `JWT_SECRET`,
/// `SMTP__HOST`, ...). A `.env` file is loaded first.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    pub bcrypt_cost: u32,
    pub otp_ttl_minutes: i64,
    pub mail_from: String,
    pub smtp: Option<SmtpConfig>,
    pub notification_batch_size: usize,
    pub notification_batch_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://ptadesk.db?mode=rwc".to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expiration_seconds: 60 * 60 * 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            otp_ttl_minutes: 10,
            mail_from: "PTA Desk <no-reply@ptadesk.local>".to_string(),
            smtp: None,
            notification_batch_size: 10,
            notification_batch_delay_ms: 1000,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = AppConfig::default();
        let config = Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("bind_address", defaults.bind_address)?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_expiration_seconds", defaults.jwt_expiration_seconds as i64)?
            .set_default("bcrypt_cost", i64::from(defaults.bcrypt_cost))?
            .set_default("otp_ttl_minutes", defaults.otp_ttl_minutes)?
            .set_default("mail_from", defaults.mail_from)?
            .set_default("notification_batch_size", defaults.notification_batch_size as i64)?
            .set_default("notification_batch_delay_ms", defaults.notification_batch_delay_ms as i64)?
            .add_source(File::with_name("ptadesk").required(false))
            .add_source(Environment::default().separator("__").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;

        if app_config.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("JWT_SECRET is not set; using the built-in development secret");
        }
        Ok(app_config)
    }

    pub fn notification_batch_delay(&self) -> Duration {
        Duration::from_millis(self.notification_batch_delay_ms)
    }
}

fn build_mailer(config: &AppConfig) -> Result<Arc<dyn Mailer>> {
    match &config.smtp {
        Some(smtp) => {
            debug!("Using SMTP relay {}:{}", smtp.host, smtp.port);
            Ok(Arc::new(LettreMailer::new(smtp, &config.mail_from)?))
        }
        None => {
            warn!("SMTP is not configured; outgoing mail will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Connects to the database and assembles the shared handler state.
pub async fn initialize_app_state(config: AppConfig) -> Result<AppState> {
    info!("Connecting to database: {}", config.database_url);
    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let cache = Cache::builder()
        .max_capacity(100)
        .time_to_live(Duration::from_secs(300)) // 5 minutes
        .build();

    let mailer = build_mailer(&config)?;
    let jwt = Arc::new(JwtManager::new(
        &config.jwt_secret,
        config.jwt_expiration_seconds,
    ));

    Ok(AppState {
        db,
        cache,
        config: Arc::new(config),
        jwt,
        mailer,
    })
}
