use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use sustainability_server::auth::hash_password;
use sustainability_server::db;
use sustainability_server::models::{MetricType, QualityFlag, UserRole};
use sustainability_server::services::readings::{insert_readings, NewReading};
use sustainability_server::services::{reference, users};
use uuid::Uuid;

const SAMPLE_PASSWORD: &str = "password123";
const CHUNK_DAYS: i64 = 14;

#[derive(Parser, Debug)]
#[command(about = "Wipe the database and load sample users, reference data and hourly meter readings.")]
struct Args {
    #[arg(long)]
    database_url: Option<String>,
    /// Calendar months of history before the current month.
    #[arg(long, default_value_t = 12)]
    months: u32,
    /// Fixed RNG seed for reproducible data.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = false)]
    skip_migrations: bool,
}

struct SampleUser {
    email: &'static str,
    name: &'static str,
    role: UserRole,
    department: &'static str,
    unit: &'static str,
}

const SAMPLE_USERS: [SampleUser; 4] = [
    SampleUser {
        email: "admin@sustainability.com",
        name: "Admin User",
        role: UserRole::Admin,
        department: "IT",
        unit: "Headquarters",
    },
    SampleUser {
        email: "head@sustainability.com",
        name: "Head of Sustainability",
        role: UserRole::HeadOfSustainability,
        department: "Sustainability",
        unit: "Headquarters",
    },
    SampleUser {
        email: "analyst@sustainability.com",
        name: "Data Analyst",
        role: UserRole::Analyst,
        department: "Analytics",
        unit: "Headquarters",
    },
    SampleUser {
        email: "viewer@sustainability.com",
        name: "Viewer User",
        role: UserRole::Viewer,
        department: "Operations",
        unit: "Plant A",
    },
];

const UNITS: [(&str, &str); 4] = [
    ("Headquarters", "New York, NY"),
    ("Plant A", "Atlanta, GA"),
    ("Plant B", "Dallas, TX"),
    ("Plant C", "Los Angeles, CA"),
];

/// (department, owning unit)
const DEPARTMENTS: [(&str, &str); 6] = [
    ("Production", "Plant A"),
    ("Maintenance", "Plant A"),
    ("Quality Control", "Plant A"),
    ("Production", "Plant B"),
    ("Maintenance", "Plant B"),
    ("Production", "Plant C"),
];

/// (machine, type, index into DEPARTMENTS)
const MACHINES: [(&str, &str, usize); 4] = [
    ("Spinning Machine 1", "Spinner", 0),
    ("Weaving Machine 1", "Loom", 0),
    ("Dyeing Machine 1", "Dyer", 0),
    ("Compressor 1", "Compressor", 1),
];

const SHIFTS: [(&str, &str, &str); 3] = [
    ("Morning Shift", "06:00", "14:00"),
    ("Afternoon Shift", "14:00", "22:00"),
    ("Night Shift", "22:00", "06:00"),
];

#[derive(Debug, Clone)]
struct Site {
    unit_id: Uuid,
    department_id: Uuid,
    machine_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
struct References {
    sites: Vec<Site>,
    /// Morning, afternoon, night.
    shift_ids: [Uuid; 3],
}

fn base_range(metric: MetricType) -> (f64, f64) {
    match metric {
        MetricType::Energy => (100.0, 300.0),
        MetricType::Water => (50.0, 150.0),
        MetricType::Waste => (20.0, 50.0),
        MetricType::Emissions => (5.0, 15.0),
    }
}

fn shift_index(hour: u32) -> usize {
    match hour {
        6..=13 => 0,
        14..=21 => 1,
        _ => 2,
    }
}

fn history_start(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|date| date.checked_sub_months(Months::new(months)))
        .unwrap_or_else(|| now.date_naive());
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}

fn sample_value<R: Rng>(rng: &mut R, metric: MetricType, ts: DateTime<Utc>) -> f64 {
    let (low, high) = base_range(metric);
    let base = low + rng.gen::<f64>() * (high - low);
    let seasonal = 1.0 + 0.2 * (f64::from(ts.month0()) / 12.0 * 2.0 * PI).sin();
    let work_hours = if (6..=18).contains(&ts.hour()) { 1.5 } else { 0.3 };
    let noise = 0.8 + rng.gen::<f64>() * 0.4;
    (base * seasonal * work_hours * noise * 100.0).round() / 100.0
}

fn sample_quality<R: Rng>(rng: &mut R) -> QualityFlag {
    let mut flag = QualityFlag::Good;
    if rng.gen::<f64>() < 0.05 {
        flag = QualityFlag::Suspicious;
    }
    if rng.gen::<f64>() < 0.01 {
        flag = QualityFlag::Bad;
    }
    flag
}

/// One reading per metric per hour in `[start, end)`.
fn generate_readings<R: Rng>(
    rng: &mut R,
    refs: &References,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<NewReading> {
    let mut readings = Vec::new();
    if refs.sites.is_empty() {
        return readings;
    }
    let mut ts = start;
    while ts < end {
        for metric in MetricType::ALL {
            let site = &refs.sites[rng.gen_range(0..refs.sites.len())];
            let machine_id = if site.machine_ids.is_empty() {
                None
            } else {
                Some(site.machine_ids[rng.gen_range(0..site.machine_ids.len())])
            };
            readings.push(NewReading {
                metric,
                timestamp: ts,
                value: sample_value(rng, metric, ts),
                unit_id: site.unit_id,
                department_id: site.department_id,
                machine_id,
                shift_id: refs.shift_ids[shift_index(ts.hour())],
                quality_flag: sample_quality(rng),
            });
        }
        ts += Duration::hours(1);
    }
    readings
}

async fn seed_references(pool: &sqlx::PgPool) -> Result<References> {
    let mut unit_ids = Vec::with_capacity(UNITS.len());
    for (name, location) in UNITS {
        unit_ids.push((name, reference::insert_unit(pool, name, location).await?));
    }

    let mut sites = Vec::with_capacity(DEPARTMENTS.len());
    for (name, unit_name) in DEPARTMENTS {
        let unit_id = unit_ids
            .iter()
            .find(|(unit, _)| *unit == unit_name)
            .map(|(_, id)| *id)
            .with_context(|| format!("unknown unit {unit_name}"))?;
        let department_id = reference::insert_department(pool, name, unit_id).await?;
        sites.push(Site {
            unit_id,
            department_id,
            machine_ids: Vec::new(),
        });
    }

    for (name, machine_type, department) in MACHINES {
        let site = sites
            .get_mut(department)
            .with_context(|| format!("machine {name} references a missing department"))?;
        let id = reference::insert_machine(pool, name, machine_type, site.department_id).await?;
        site.machine_ids.push(id);
    }

    let mut shift_ids = [Uuid::nil(); 3];
    for (slot, (name, start, end)) in shift_ids.iter_mut().zip(SHIFTS) {
        *slot = reference::insert_shift(pool, name, start, end).await?;
    }

    Ok(References { sites, shift_ids })
}

async fn seed_users(pool: &sqlx::PgPool) -> Result<()> {
    for user in &SAMPLE_USERS {
        let password_hash = hash_password(SAMPLE_PASSWORD)?;
        users::insert(
            pool,
            &users::NewUser {
                email: user.email,
                name: user.name,
                password_hash: &password_hash,
                role: user.role,
                department: Some(user.department),
                unit: Some(user.unit),
            },
        )
        .await
        .with_context(|| format!("failed to create user {}", user.email))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let database_url = args
        .database_url
        .or_else(|| std::env::var("SUSTAINABILITY_DATABASE_URL").ok())
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .context("pass --database-url or set SUSTAINABILITY_DATABASE_URL")?;

    let pool = db::connect_lazy(&database_url, 4)?;
    if !args.skip_migrations {
        db::run_migrations(&pool).await?;
    }

    tracing::info!("clearing existing data");
    reference::clear_all(&pool)
        .await
        .context("failed to clear tables")?;

    seed_users(&pool).await?;
    tracing::info!(count = SAMPLE_USERS.len(), "sample users created");

    let refs = seed_references(&pool)
        .await
        .context("failed to create reference data")?;
    tracing::info!(
        units = UNITS.len(),
        departments = DEPARTMENTS.len(),
        machines = MACHINES.len(),
        shifts = SHIFTS.len(),
        "reference data created"
    );

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let now = Utc::now();
    let mut chunk_start = history_start(now, args.months);
    let mut total = 0u64;
    while chunk_start < now {
        let chunk_end = (chunk_start + Duration::days(CHUNK_DAYS)).min(now);
        let readings = generate_readings(&mut rng, &refs, chunk_start, chunk_end);
        total += insert_readings(&pool, &readings)
            .await
            .context("failed to insert meter readings")?;
        tracing::info!(through = %chunk_end, total, "meter readings inserted");
        chunk_start = chunk_end;
    }

    tracing::info!(total, "seeding complete");
    for user in &SAMPLE_USERS {
        println!("{} / {SAMPLE_PASSWORD}", user.email);
    }
    Ok(())
}
