mod password;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{map_db_error, AppError, AppResult};
use crate::models::{UserRole, UserRow};

pub use password::{
    hash_password, hash_password_with_iterations, verify_against_dummy, verify_password,
    MIN_PASSWORD_LEN,
};

pub const NOT_AUTHORIZED: &str = "Not authorized to access this route";
pub const USER_NOT_FOUND: &str = "User not found";
pub const USER_DEACTIVATED: &str = "User account is deactivated";
pub const ROLE_NOT_AUTHORIZED: &str = "User role is not authorized to access this route";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies HS256 bearer tokens.
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(secret: &[u8], ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_seconds,
        }
    }

    pub fn issue(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue_with_ttl(user_id, self.ttl_seconds)
    }

    fn issue_with_ttl(&self, user_id: Uuid, ttl_seconds: i64) -> anyhow::Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_seconds),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Returns the user id for a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Option<Uuid> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).ok()?;
        Uuid::parse_str(&data.claims.sub).ok()
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

/// Requires a bearer token that resolves to an existing, active user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<TokenManager>: FromRef<S>,
    PgPool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let tokens = Arc::<TokenManager>::from_ref(state);
        let db = PgPool::from_ref(state);
        let user_id = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .and_then(|token| tokens.verify(token))
            .ok_or_else(|| AppError::unauthorized(NOT_AUTHORIZED));

        async move {
            let user_id = user_id?;
            let row = crate::services::users::find_by_id(&db, user_id)
                .await
                .map_err(map_db_error)?;
            Ok(AuthUser(authenticated_from_row(row)?))
        }
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn authenticated_from_row(row: Option<UserRow>) -> AppResult<AuthenticatedUser> {
    let row = row.ok_or_else(|| AppError::unauthorized(USER_NOT_FOUND))?;
    if !row.is_active {
        return Err(AppError::unauthorized(USER_DEACTIVATED));
    }
    Ok(AuthenticatedUser {
        id: row.id,
        role: row.role(),
        email: row.email,
        name: row.name,
    })
}

pub fn require_roles(user: &AuthenticatedUser, allowed: &[UserRole]) -> AppResult<()> {
    if allowed.contains(&user.role) {
        return Ok(());
    }
    tracing::warn!(user_id = %user.id, role = %user.role, "role not authorized");
    Err(AppError::forbidden(ROLE_NOT_AUTHORIZED))
}
