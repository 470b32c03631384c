use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "/etc/sustainability-dashboard/config.json";
const DEFAULT_JWT_EXPIRE: &str = "30d";
const MIN_JWT_SECRET_BYTES: usize = 16;

pub(crate) fn config_file_path() -> PathBuf {
    if let Some(path) = env_optional_string("SUSTAINABILITY_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFileOverrides {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    jwt_secret: Option<String>,
    #[serde(default)]
    jwt_expire: Option<String>,
    #[serde(default)]
    static_root: Option<String>,
    #[serde(default)]
    cors_origin: Option<String>,
    #[serde(default)]
    db_max_connections: Option<u32>,
}

fn load_config_file_overrides() -> Option<ConfigFileOverrides> {
    let path = config_file_path();
    if !path.exists() {
        return None;
    }
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read config file; using env only"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse config file; using env only"
            );
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expire_seconds: i64,
    pub static_root: Option<PathBuf>,
    pub cors_origin: Option<String>,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env(cli_static_root: Option<PathBuf>) -> Result<Self> {
        let overrides = load_config_file_overrides().unwrap_or_default();
        Self::resolve(cli_static_root, &overrides)
    }

    fn resolve(cli_static_root: Option<PathBuf>, file: &ConfigFileOverrides) -> Result<Self> {
        let database_url = env_first(&["SUSTAINABILITY_DATABASE_URL", "DATABASE_URL"])
            .or_else(|| non_empty(file.database_url.as_deref()))
            .context("SUSTAINABILITY_DATABASE_URL must be set (or database_url in the config file)")?;

        let jwt_secret = env_first(&["SUSTAINABILITY_JWT_SECRET", "JWT_SECRET"])
            .or_else(|| non_empty(file.jwt_secret.as_deref()))
            .context("SUSTAINABILITY_JWT_SECRET must be set (or jwt_secret in the config file)")?;
        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            anyhow::bail!(
                "SUSTAINABILITY_JWT_SECRET must be at least {MIN_JWT_SECRET_BYTES} bytes"
            );
        }

        let jwt_expire_raw = env_first(&["SUSTAINABILITY_JWT_EXPIRE", "JWT_EXPIRE"])
            .or_else(|| non_empty(file.jwt_expire.as_deref()))
            .unwrap_or_else(|| DEFAULT_JWT_EXPIRE.to_string());
        let jwt_expire_seconds = parse_expire(&jwt_expire_raw)
            .with_context(|| format!("invalid SUSTAINABILITY_JWT_EXPIRE value {jwt_expire_raw:?}"))?;

        let static_root = cli_static_root
            .or_else(|| env_optional_string("SUSTAINABILITY_STATIC_ROOT").map(PathBuf::from))
            .or_else(|| non_empty(file.static_root.as_deref()).map(PathBuf::from));
        let cors_origin = env_optional_string("SUSTAINABILITY_CORS_ORIGIN")
            .or_else(|| non_empty(file.cors_origin.as_deref()));
        let db_max_connections = env_optional_string("SUSTAINABILITY_DB_MAX_CONNECTIONS")
            .and_then(|value| value.parse::<u32>().ok())
            .or(file.db_max_connections)
            .unwrap_or(10)
            .clamp(1, 100);

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expire_seconds,
            static_root,
            cors_origin,
            db_max_connections,
        })
    }
}

/// Parses token lifetimes such as `30d`, `12h`, `45m`, `90s` or a bare number of seconds.
pub(crate) fn parse_expire(value: &str) -> Result<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        anyhow::bail!("duration is empty");
    }
    let (digits, multiplier) = match trimmed.chars().last() {
        Some('d') => (&trimmed[..trimmed.len() - 1], 86_400),
        Some('h') => (&trimmed[..trimmed.len() - 1], 3_600),
        Some('m') => (&trimmed[..trimmed.len() - 1], 60),
        Some('s') => (&trimmed[..trimmed.len() - 1], 1),
        _ => (trimmed, 1),
    };
    let amount: i64 = digits
        .trim()
        .parse()
        .with_context(|| format!("{trimmed:?} is not a duration"))?;
    if amount <= 0 {
        anyhow::bail!("duration must be positive");
    }
    amount
        .checked_mul(multiplier)
        .context("duration overflows")
}

fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| env_optional_string(key))
}

fn env_optional_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
