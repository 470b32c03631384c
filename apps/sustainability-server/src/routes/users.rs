use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::{ApiJson, ApiResponse, Created};
use crate::auth::{require_roles, AuthUser, MIN_PASSWORD_LEN};
use crate::error::{internal_error, map_db_conflict, map_db_error, AppError, AppResult};
use crate::models::{UserResponse, UserRole};
use crate::services::users::{self, NewUser};
use crate::state::AppState;

const USER_EXISTS: &str = "User already exists";

#[derive(Debug, Clone, Default, serde::Deserialize, utoipa::ToSchema)]
pub(crate) struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    role: String,
    department: Option<String>,
    unit: Option<String>,
}

fn validate_register(payload: &RegisterRequest) -> AppResult<UserRole> {
    if !users::is_valid_email(&payload.email) {
        return Err(AppError::bad_request("Please include a valid email"));
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    if payload.name.trim().chars().count() > 50 {
        return Err(AppError::bad_request(
            "Name cannot be more than 50 characters",
        ));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    payload.role.parse::<UserRole>().map_err(AppError::bad_request)
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Created user", body = UserResponse),
        (status = 400, description = "Invalid request or user already exists"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("HTTPBearer" = []))
)]
pub(crate) async fn register(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<Created<UserResponse>> {
    require_roles(&user, &[UserRole::Admin])?;
    let role = validate_register(&payload)?;

    if users::email_exists(&state.db, &payload.email)
        .await
        .map_err(map_db_error)?
    {
        return Err(AppError::bad_request(USER_EXISTS));
    }

    let password_hash = crate::auth::hash_password(&payload.password).map_err(internal_error)?;
    let row = users::insert(
        &state.db,
        &NewUser {
            email: &payload.email,
            name: &payload.name,
            password_hash: &password_hash,
            role,
            department: payload.department.as_deref(),
            unit: payload.unit.as_deref(),
        },
    )
    .await
    .map_err(|err| map_db_conflict(err, USER_EXISTS))?;

    tracing::info!(created_by = %user.id, user_id = %row.id, role = %role, "user created");
    Ok(Created(
        ApiResponse::ok(UserResponse::from(row)).with_message("User created successfully"),
    ))
}

#[utoipa::path(
    get,
    path = "/api/auth/users",
    tag = "users",
    responses(
        (status = 200, description = "Users", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("HTTPBearer" = []))
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<ApiResponse<Vec<UserResponse>>>> {
    require_roles(&user, &[UserRole::Admin])?;
    let rows = users::list_all(&state.db).await.map_err(map_db_error)?;
    Ok(Json(ApiResponse::ok(
        rows.into_iter().map(UserResponse::from).collect(),
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/users", get(list_users))
}
