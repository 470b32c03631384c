//! Units, departments, machines and shifts that readings are attributed to.

use sqlx::PgPool;
use uuid::Uuid;

pub async fn insert_unit(db: &PgPool, name: &str, location: &str) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar("INSERT INTO units (id, name, location) VALUES ($1, $2, $3) RETURNING id")
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(location)
        .fetch_one(db)
        .await
}

pub async fn insert_department(db: &PgPool, name: &str, unit_id: Uuid) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO departments (id, name, unit_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(unit_id)
    .fetch_one(db)
    .await
}

pub async fn insert_machine(
    db: &PgPool,
    name: &str,
    machine_type: &str,
    department_id: Uuid,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO machines (id, name, machine_type, department_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(machine_type)
    .bind(department_id)
    .fetch_one(db)
    .await
}

pub async fn insert_shift(
    db: &PgPool,
    name: &str,
    start_time: &str,
    end_time: &str,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO shifts (id, name, start_time, end_time) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(start_time)
    .bind(end_time)
    .fetch_one(db)
    .await
}

/// Empties every application table, users included.
pub async fn clear_all(db: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("TRUNCATE meter_readings, machines, departments, units, shifts, users")
        .execute(db)
        .await?;
    Ok(())
}
