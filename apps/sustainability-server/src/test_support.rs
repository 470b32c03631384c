use crate::auth::{AuthenticatedUser, TokenManager};
use crate::config::AppConfig;
use crate::db;
use crate::models::UserRole;
use crate::state::AppState;
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "sustainability-test-secret";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgresql://postgres@localhost/postgres".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_expire_seconds: 3600,
        static_root: None,
        cors_origin: None,
        db_max_connections: 2,
    }
}

pub fn test_state() -> AppState {
    let config = test_config();
    let pool =
        db::connect_lazy(&config.database_url, config.db_max_connections).expect("connect_lazy");
    let tokens = Arc::new(TokenManager::new(
        config.jwt_secret.as_bytes(),
        config.jwt_expire_seconds,
    ));
    AppState {
        config,
        db: pool,
        tokens,
    }
}

pub fn test_user(role: UserRole) -> AuthenticatedUser {
    AuthenticatedUser {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", role.as_str()),
        name: "Test User".to_string(),
        role,
    }
}
