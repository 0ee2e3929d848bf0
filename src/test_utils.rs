use crate::auth::JwtManager;
use crate::config::AppConfig;
use crate::handlers::now;
use crate::notifications::RecordingMailer;
use crate::router::create_router;
use crate::schemas::AppState;
use axum::http::{header::AUTHORIZATION, HeaderValue};
use axum_test::{TestRequest, TestServer};
use migration::{Migrator, MigratorTrait};
use model::entities::user::{self, UserRole};
use moka::future::Cache;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    // Also seeds the settings row
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Configuration tuned for tests: cheap hashing, no pause between mail batches.
pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        bcrypt_cost: 4,
        notification_batch_delay_ms: 0,
        ..AppConfig::default()
    }
}

/// Initialize tracing for tests with output to STDERR.
///
/// The level comes from RUST_LOG and defaults to WARN.
fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// A running test server plus handles on its database and outbox.
pub struct TestApp {
    pub server: TestServer,
    pub db: DatabaseConnection,
    pub mailer: Arc<RecordingMailer>,
    _tracing: tracing::subscriber::DefaultGuard,
}

pub async fn setup_test_app() -> TestApp {
    let tracing_guard = init_test_tracing();

    let db = setup_test_db().await;
    let config = test_config();
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState {
        db: db.clone(),
        cache: Cache::new(100),
        jwt: Arc::new(JwtManager::new(
            &config.jwt_secret,
            config.jwt_expiration_seconds,
        )),
        config: Arc::new(config),
        mailer: mailer.clone(),
    };

    let server = TestServer::new(create_router(state)).expect("Failed to start test server");
    TestApp {
        server,
        db,
        mailer,
        _tracing: tracing_guard,
    }
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header value")
}

impl TestApp {
    pub fn get_as(&self, path: &str, token: &str) -> TestRequest {
        self.server.get(path).add_header(AUTHORIZATION, bearer(token))
    }

    pub fn post_as(&self, path: &str, token: &str) -> TestRequest {
        self.server.post(path).add_header(AUTHORIZATION, bearer(token))
    }

    pub fn put_as(&self, path: &str, token: &str) -> TestRequest {
        self.server.put(path).add_header(AUTHORIZATION, bearer(token))
    }

    pub fn delete_as(&self, path: &str, token: &str) -> TestRequest {
        self.server.delete(path).add_header(AUTHORIZATION, bearer(token))
    }

    /// Inserts a verified, active account directly, bypassing the OTP flow.
    pub async fn insert_user(&self, email: &str, role: UserRole) -> user::Model {
        let timestamp = now();
        user::ActiveModel {
            email: Set(email.to_string()),
            password_hash: Set(bcrypt::hash(TEST_PASSWORD, 4).expect("hash password")),
            first_name: Set("Test".to_string()),
            last_name: Set(format!("{:?}", role)),
            phone: Set(None),
            role: Set(role),
            is_active: Set(true),
            is_verified: Set(true),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert user")
    }

    pub async fn login(&self, email: &str) -> String {
        let response = self
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": email, "password": TEST_PASSWORD }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["data"]["token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }

    pub async fn admin(&self) -> (user::Model, String) {
        let admin = self.insert_user("admin@school.test", UserRole::Admin).await;
        let token = self.login(&admin.email).await;
        (admin, token)
    }

    pub async fn parent(&self, email: &str) -> (user::Model, String) {
        let parent = self.insert_user(email, UserRole::Parent).await;
        let token = self.login(&parent.email).await;
        (parent, token)
    }
}
