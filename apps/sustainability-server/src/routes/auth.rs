use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::{ApiJson, ApiResponse};
use crate::auth::{AuthUser, MIN_PASSWORD_LEN, USER_NOT_FOUND};
use crate::error::{internal_error, map_db_error, AppError, AppResult};
use crate::models::{UserResponse, UserRow};
use crate::services::users::{self, ProfileChanges};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const ACCOUNT_DEACTIVATED: &str = "Account is deactivated";
const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct LoginResponse {
    token: String,
    user: UserResponse,
}

#[derive(Debug, Clone, Default, serde::Deserialize, utoipa::ToSchema)]
pub(crate) struct ProfileUpdateRequest {
    name: Option<String>,
    department: Option<String>,
    unit: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordRequest {
    #[serde(default)]
    current_password: Option<String>,
    #[serde(default)]
    new_password: String,
}

fn validate_login(payload: &LoginRequest) -> AppResult<&str> {
    if !users::is_valid_email(&payload.email) {
        return Err(AppError::bad_request("Please include a valid email"));
    }
    payload
        .password
        .as_deref()
        .ok_or_else(|| AppError::bad_request("Password is required"))
}

/// Unknown email and wrong password answer identically; the active flag is only
/// consulted once the password matched.
fn check_credentials(row: Option<UserRow>, password: &str) -> AppResult<UserRow> {
    let Some(row) = row else {
        crate::auth::verify_against_dummy(password);
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };
    if !crate::auth::verify_password(password, &row.password_hash) {
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }
    if !row.is_active {
        return Err(AppError::unauthorized(ACCOUNT_DEACTIVATED));
    }
    Ok(row)
}

fn validate_profile(payload: ProfileUpdateRequest) -> AppResult<ProfileChanges> {
    let name = match payload.name {
        Some(name) if name.trim().is_empty() => {
            return Err(AppError::bad_request("Name cannot be empty"));
        }
        Some(name) if name.trim().chars().count() > MAX_NAME_LEN => {
            return Err(AppError::bad_request(
                "Name cannot be more than 50 characters",
            ));
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };
    Ok(ProfileChanges {
        name,
        department: payload.department.map(|value| value.trim().to_string()),
        unit: payload.unit.map(|value| value.trim().to_string()),
    })
}

fn validate_password_change(payload: &ChangePasswordRequest) -> AppResult<&str> {
    let current = payload
        .current_password
        .as_deref()
        .ok_or_else(|| AppError::bad_request("Current password is required"))?;
    if payload.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "New password must be at least 8 characters",
        ));
    }
    Ok(current)
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Auth token and user", body = LoginResponse),
        (status = 400, description = "Invalid email or missing password"),
        (status = 401, description = "Invalid credentials or deactivated account")
    )
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let password = validate_login(&payload)?;
    let email = users::normalize_email(&payload.email);

    let row = users::find_by_email(&state.db, &email)
        .await
        .map_err(map_db_error)?;
    let mut row = check_credentials(row, password).inspect_err(|err| {
        tracing::warn!(email = %email, reason = %err.message, "login failed");
    })?;

    if let Err(err) = users::touch_last_login(&state.db, row.id).await {
        tracing::warn!(user_id = %row.id, error = %err, "failed to record last login");
    }
    row.last_login = Some(Utc::now());

    let token = state.tokens.issue(row.id).map_err(internal_error)?;
    tracing::info!(user_id = %row.id, role = %row.role(), "login succeeded");
    Ok(Json(
        ApiResponse::ok(LoginResponse {
            token,
            user: UserResponse::from(row),
        })
        .with_message("Login successful"),
    ))
}

#[utoipa::path(
    get,
    path = "/api/auth/profile",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("HTTPBearer" = []))
)]
pub(crate) async fn profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let row = users::find_by_id(&state.db, user.id)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;
    Ok(Json(ApiResponse::ok(UserResponse::from(row))))
}

#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "auth",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid profile"),
        (status = 401, description = "Unauthorized")
    ),
    security(("HTTPBearer" = []))
)]
pub(crate) async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<ProfileUpdateRequest>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let changes = validate_profile(payload)?;
    let row = users::update_profile(&state.db, user.id, &changes)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;
    Ok(Json(
        ApiResponse::ok(UserResponse::from(row)).with_message("Profile updated successfully"),
    ))
}

#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Invalid or incorrect password"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(("HTTPBearer" = []))
)]
pub(crate) async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let current = validate_password_change(&payload)?;
    let row = users::find_by_id(&state.db, user.id)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;
    if !crate::auth::verify_password(current, &row.password_hash) {
        return Err(AppError::bad_request("Current password is incorrect"));
    }

    let hash = crate::auth::hash_password(&payload.new_password).map_err(internal_error)?;
    let updated = users::update_password(&state.db, row.id, &hash)
        .await
        .map_err(map_db_error)?;
    if !updated {
        return Err(AppError::not_found(USER_NOT_FOUND));
    }
    tracing::info!(user_id = %row.id, "password changed");
    Ok(Json(ApiResponse::message_only("Password changed successfully")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/profile", get(profile).put(update_profile))
        .route("/auth/me", get(profile))
        .route("/auth/change-password", put(change_password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn login_request(email: &str, password: Option<&str>) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn login_requires_valid_email_then_password() {
        let err = validate_login(&login_request("not-an-email", Some("x"))).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Please include a valid email");

        let err = validate_login(&login_request("viewer@sustainability.com", None)).unwrap_err();
        assert_eq!(err.message, "Password is required");

        assert_eq!(
            validate_login(&login_request("viewer@sustainability.com", Some(""))).unwrap(),
            ""
        );
    }

    fn stored_user(password: &str, is_active: bool) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: uuid::Uuid::new_v4(),
            email: "operator@sustainability.com".to_string(),
            name: "Operator".to_string(),
            password_hash: crate::auth::hash_password_with_iterations(password, 1_000).unwrap(),
            role: "operator".to_string(),
            department: None,
            unit: None,
            is_active,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unknown_email_and_wrong_password_answer_the_same() {
        let unknown = check_credentials(None, "password123").unwrap_err();
        assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.message, INVALID_CREDENTIALS);

        let row = stored_user("password123", true);
        let wrong = check_credentials(Some(row.clone()), "password124").unwrap_err();
        assert_eq!(wrong.status, unknown.status);
        assert_eq!(wrong.message, unknown.message);

        assert_eq!(check_credentials(Some(row.clone()), "password123").unwrap().id, row.id);
    }

    #[test]
    fn deactivated_account_is_refused_only_after_password_matches() {
        let row = stored_user("password123", false);

        let err = check_credentials(Some(row.clone()), "password123").unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, ACCOUNT_DEACTIVATED);

        let err = check_credentials(Some(row), "not-the-password").unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, INVALID_CREDENTIALS);
    }

    #[test]
    fn profile_update_rejects_blank_name_and_trims_fields() {
        let err = validate_profile(ProfileUpdateRequest {
            name: Some("   ".to_string()),
            ..ProfileUpdateRequest::default()
        })
        .unwrap_err();
        assert_eq!(err.message, "Name cannot be empty");

        let changes = validate_profile(ProfileUpdateRequest {
            name: Some(" Data Analyst ".to_string()),
            department: Some(" Analytics ".to_string()),
            unit: None,
        })
        .unwrap();
        assert_eq!(changes.name.as_deref(), Some("Data Analyst"));
        assert_eq!(changes.department.as_deref(), Some("Analytics"));
        assert!(changes.unit.is_none());
    }

    #[test]
    fn profile_update_caps_name_length() {
        let err = validate_profile(ProfileUpdateRequest {
            name: Some("x".repeat(51)),
            ..ProfileUpdateRequest::default()
        })
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn password_change_validation_order() {
        let err = validate_password_change(&ChangePasswordRequest {
            current_password: None,
            new_password: "long-enough".to_string(),
        })
        .unwrap_err();
        assert_eq!(err.message, "Current password is required");

        let err = validate_password_change(&ChangePasswordRequest {
            current_password: Some("password123".to_string()),
            new_password: "short".to_string(),
        })
        .unwrap_err();
        assert_eq!(err.message, "New password must be at least 8 characters");
    }
}
