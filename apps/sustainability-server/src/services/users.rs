use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{UserRole, UserRow};

const USER_COLUMNS: &str = "id, email, name, password_hash, role, department, unit, is_active, \
                            last_login, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a str,
    pub role: UserRole,
    pub department: Option<&'a str>,
    pub unit: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub department: Option<String>,
    pub unit: Option<String>,
}

/// Emails are stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose shape check: one `@`, a non-empty local part and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1"
    ))
    .bind(normalize_email(email))
    .fetch_optional(db)
    .await
}

pub async fn email_exists(db: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(normalize_email(email))
        .fetch_one(db)
        .await
}

pub async fn list_all(db: &PgPool) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY name ASC, email ASC"
    ))
    .fetch_all(db)
    .await
}

pub async fn insert(db: &PgPool, user: &NewUser<'_>) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as(&format!(
        r#"
        INSERT INTO users (id, email, name, password_hash, role, department, unit)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(normalize_email(user.email))
    .bind(user.name.trim())
    .bind(user.password_hash)
    .bind(user.role.as_str())
    .bind(user.department.map(str::trim))
    .bind(user.unit.map(str::trim))
    .fetch_one(db)
    .await
}

/// Applies only the fields present in `changes`; returns `None` for an unknown id.
pub async fn update_profile(
    db: &PgPool,
    id: Uuid,
    changes: &ProfileChanges,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            department = CASE WHEN $3::BOOLEAN THEN $4 ELSE department END,
            unit = CASE WHEN $5::BOOLEAN THEN $6 ELSE unit END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(changes.name.as_deref())
    .bind(changes.department.is_some())
    .bind(changes.department.as_deref())
    .bind(changes.unit.is_some())
    .bind(changes.unit.as_deref())
    .fetch_optional(db)
    .await
}

pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(password_hash)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn touch_last_login(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Admin@Sustainability.COM "), "admin@sustainability.com");
    }

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("analyst@sustainability.com"));
        assert!(is_valid_email(" head@plant-a.example.org "));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("@sustainability.com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@@sustainability.com"));
        assert!(!is_valid_email("user@sustainability..com"));
        assert!(!is_valid_email("us er@sustainability.com"));
    }
}
