//! Authentication primitives: JWT tokens, password hashing, one-time codes and
//! the [`AuthUser`] request extractor.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, NaiveDateTime};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use model::entities::otp_code::{self, OtpPurpose};
use model::entities::user::{self, UserRole};
use rand::Rng;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::schemas::AppState;

/// Wrong guesses allowed before a code is burned.
pub const MAX_OTP_ATTEMPTS: i32 = 5;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id as a string
    pub sub: String,
    pub exp: usize,
    pub role: UserRole,
    pub user_id: i32,
}

pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_seconds: u64,
}

impl fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtManager")
            .field("expiration_seconds", &self.expiration_seconds)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(secret: &str, expiration_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_seconds,
        }
    }

    pub fn expiration_seconds(&self) -> u64 {
        self.expiration_seconds
    }

    pub fn generate_token(&self, user: &user::Model) -> ApiResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .as_secs();

        let claims = Claims {
            sub: user.id.to_string(),
            exp: (now + self.expiration_seconds) as usize,
            role: user.role,
            user_id: user.id,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
    }
}

/// Hashes a password on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

pub async fn verify_password(password: String, hash: String) -> ApiResult<bool> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    match verified {
        Ok(valid) => Ok(valid),
        Err(e) => {
            warn!("Stored password hash could not be verified: {}", e);
            Ok(false)
        }
    }
}

pub fn generate_otp() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

pub fn hash_otp(code: &str) -> String {
    format!("{:x}", Sha256::digest(code.trim().as_bytes()))
}

/// Issues a fresh code for `purpose`, consuming any older outstanding ones.
/// Returns the plain code so it can be mailed.
pub async fn issue_otp(
    db: &DatabaseConnection,
    user_id: i32,
    purpose: OtpPurpose,
    ttl_minutes: i64,
    now: NaiveDateTime,
) -> ApiResult<String> {
    otp_code::Entity::update_many()
        .col_expr(otp_code::Column::ConsumedAt, Expr::value(now))
        .filter(otp_code::Column::UserId.eq(user_id))
        .filter(otp_code::Column::Purpose.eq(purpose))
        .filter(otp_code::Column::ConsumedAt.is_null())
        .exec(db)
        .await?;

    let code = generate_otp();
    otp_code::ActiveModel {
        user_id: Set(user_id),
        purpose: Set(purpose),
        code_hash: Set(hash_otp(&code)),
        expires_at: Set(now + Duration::minutes(ttl_minutes)),
        attempts: Set(0),
        consumed_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!("Issued {:?} code for user {}", purpose, user_id);
    Ok(code)
}

/// Checks `code` against the newest outstanding code and consumes it on success.
pub async fn verify_otp(
    db: &DatabaseConnection,
    user_id: i32,
    purpose: OtpPurpose,
    code: &str,
    now: NaiveDateTime,
) -> ApiResult<()> {
    let invalid = || ApiError::BadRequest("Invalid or expired code".to_string());

    let pending = otp_code::Entity::find()
        .filter(otp_code::Column::UserId.eq(user_id))
        .filter(otp_code::Column::Purpose.eq(purpose))
        .filter(otp_code::Column::ConsumedAt.is_null())
        .order_by_desc(otp_code::Column::CreatedAt)
        .order_by_desc(otp_code::Column::Id)
        .one(db)
        .await?
        .ok_or_else(invalid)?;

    if pending.expires_at < now || pending.attempts >= MAX_OTP_ATTEMPTS {
        return Err(invalid());
    }

    let matches = pending.code_hash == hash_otp(code);
    let attempts = pending.attempts + 1;
    let mut active: otp_code::ActiveModel = pending.into();
    if matches {
        active.consumed_at = Set(Some(now));
    } else {
        active.attempts = Set(attempts);
        if attempts >= MAX_OTP_ATTEMPTS {
            active.consumed_at = Set(Some(now));
        }
    }
    active.update(db).await?;

    if matches {
        Ok(())
    } else {
        warn!("Wrong {:?} code for user {} (attempt {})", purpose, user_id, attempts);
        Err(invalid())
    }
}

/// The authenticated caller, loaded from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: user::Model,
}

impl AuthUser {
    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Administrator access required".to_string()))
        }
    }

    pub fn ensure_can_view_parent(&self, parent_id: i32) -> ApiResult<()> {
        if self.is_admin() || self.user.id == parent_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You can only access your own records".to_string(),
            ))
        }
    }

    /// Parent filter for list endpoints: parents always see only their own rows.
    pub fn scope_parent(&self, requested: Option<i32>) -> ApiResult<Option<i32>> {
        if self.is_admin() {
            return Ok(requested);
        }
        if let Some(parent_id) = requested {
            self.ensure_can_view_parent(parent_id)?;
        }
        Ok(Some(self.user.id))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = state.jwt.validate_token(token.trim()).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })?;

        let user = user::Entity::find_by_id(claims.user_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;
        if !user.is_active {
            return Err(ApiError::Unauthorized("Account is deactivated".to_string()));
        }

        Ok(AuthUser { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    fn sample_user(role: UserRole) -> user::Model {
        let now = chrono::Utc::now().naive_utc();
        user::Model {
            id: 7,
            email: "someone@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Some".to_string(),
            last_name: "One".to_string(),
            phone: None,
            role,
            is_active: true,
            is_verified: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_token_round_trip_and_wrong_secret() {
        let jwt = JwtManager::new("secret-a", 3600);
        let token = jwt.generate_token(&sample_user(UserRole::Admin)).unwrap();

        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.role, UserRole::Admin);

        let other = JwtManager::new("secret-b", 3600);
        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn test_otp_format_and_hash() {
        let code = generate_otp();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let hash = hash_otp("123456");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_otp(" 123456 "));
        assert_ne!(hash, hash_otp("123457"));
    }

    #[test]
    fn test_capability_checks() {
        let parent = AuthUser {
            user: sample_user(UserRole::Parent),
        };
        assert!(parent.require_admin().is_err());
        assert!(parent.ensure_can_view_parent(7).is_ok());
        assert!(parent.ensure_can_view_parent(8).is_err());
        assert_eq!(parent.scope_parent(None).unwrap(), Some(7));
        assert!(parent.scope_parent(Some(8)).is_err());

        let admin = AuthUser {
            user: sample_user(UserRole::Admin),
        };
        assert!(admin.require_admin().is_ok());
        assert_eq!(admin.scope_parent(None).unwrap(), None);
        assert_eq!(admin.scope_parent(Some(8)).unwrap(), Some(8));
    }

    async fn otp_user(db: &DatabaseConnection) -> user::Model {
        let now = chrono::Utc::now().naive_utc();
        user::ActiveModel {
            email: Set("otp@example.com".to_string()),
            password_hash: Set(String::new()),
            first_name: Set("Otp".to_string()),
            last_name: Set("Holder".to_string()),
            phone: Set(None),
            role: Set(UserRole::Parent),
            is_active: Set(true),
            is_verified: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    fn wrong_code(code: &str) -> &'static str {
        if code == "000000" { "111111" } else { "000000" }
    }

    fn otp_clock() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 6, 14)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn minutes_after(start: NaiveDateTime, minutes: i64) -> NaiveDateTime {
        start + Duration::minutes(minutes)
    }

    async fn codes_for(db: &DatabaseConnection, user_id: i32) -> Vec<otp_code::Model> {
        otp_code::Entity::find()
            .filter(otp_code::Column::UserId.eq(user_id))
            .order_by_asc(otp_code::Column::Id)
            .all(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_otp_is_burned_after_max_attempts() {
        let db = setup_test_db().await;
        let user = otp_user(&db).await;
        let start = otp_clock();
        let purpose = OtpPurpose::EmailVerification;

        let code = issue_otp(&db, user.id, purpose, 10, start).await.unwrap();
        for attempt in 0..MAX_OTP_ATTEMPTS {
            let when = minutes_after(start, i64::from(attempt));
            assert!(verify_otp(&db, user.id, purpose, wrong_code(&code), when).await.is_err());
        }

        let stored = codes_for(&db, user.id).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].attempts, MAX_OTP_ATTEMPTS);
        assert!(stored[0].consumed_at.is_some());

        // the right code no longer helps once the code is burned
        let err = verify_otp(&db, user.id, purpose, &code, minutes_after(start, 6))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired code");
    }

    #[tokio::test]
    async fn test_otp_expires_and_is_single_use() {
        let db = setup_test_db().await;
        let user = otp_user(&db).await;
        let start = otp_clock();
        let purpose = OtpPurpose::PasswordReset;

        let stale = issue_otp(&db, user.id, purpose, 10, start).await.unwrap();
        assert!(verify_otp(&db, user.id, purpose, &stale, minutes_after(start, 11)).await.is_err());

        let fresh = issue_otp(&db, user.id, purpose, 10, start).await.unwrap();
        verify_otp(&db, user.id, purpose, &fresh, minutes_after(start, 10)).await.unwrap();
        assert!(verify_otp(&db, user.id, purpose, &fresh, minutes_after(start, 10)).await.is_err());

        // codes for another purpose are kept apart
        let verification = issue_otp(&db, user.id, OtpPurpose::EmailVerification, 10, start)
            .await
            .unwrap();
        assert!(
            verify_otp(&db, user.id, purpose, &verification, start)
                .await
                .is_err()
        );
        verify_otp(&db, user.id, OtpPurpose::EmailVerification, &verification, start)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_new_otp_consumes_older_codes() {
        let db = setup_test_db().await;
        let user = otp_user(&db).await;
        let start = otp_clock();
        let purpose = OtpPurpose::EmailVerification;

        let first = issue_otp(&db, user.id, purpose, 10, start).await.unwrap();
        let second = issue_otp(&db, user.id, purpose, 10, minutes_after(start, 1))
            .await
            .unwrap();

        let stored = codes_for(&db, user.id).await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].consumed_at, Some(minutes_after(start, 1)));
        assert!(stored[1].consumed_at.is_none());

        if first != second {
            assert!(verify_otp(&db, user.id, purpose, &first, minutes_after(start, 2)).await.is_err());
        }
        verify_otp(&db, user.id, purpose, &second, minutes_after(start, 2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_password_hashing() {
        let hash = hash_password("correct horse".to_string(), 4).await.unwrap();
        assert!(verify_password("correct horse".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".to_string(), hash).await.unwrap());
        assert!(!verify_password("x".to_string(), "not-a-hash".to_string()).await.unwrap());
    }
}
