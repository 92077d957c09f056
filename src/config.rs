use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

/// Process-wide service configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub public_rps: u32,
    pub completion_webhook_url: Option<String>,
    pub webhook_secret: String,
    pub quiz_catalog_path: Option<String>,
    pub sweep_interval_seconds: u64,
    pub engine: EngineSettings,
}

/// Engine tunables. Kept separate from the rest of the config so services
/// can be constructed with explicit values in tests.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Violations that close an attempt as TERMINATED.
    pub violation_threshold: u32,
    /// Default absolute tolerance for numeric answers without their own.
    pub numeric_tolerance: f64,
    /// Optimistic-concurrency retries before surfacing a conflict.
    pub cas_retry_limit: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            violation_threshold: 3,
            numeric_tolerance: 1e-6,
            cas_retry_limit: 5,
        }
    }
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            completion_webhook_url: env::var("COMPLETION_WEBHOOK_URL").ok(),
            webhook_secret: get_env("WEBHOOK_SECRET")?,
            quiz_catalog_path: env::var("QUIZ_CATALOG_PATH").ok(),
            sweep_interval_seconds: get_env_parse_or("SWEEP_INTERVAL_SECONDS", 30)?,
            engine: EngineSettings {
                violation_threshold: get_env_parse_or("VIOLATION_THRESHOLD", 3)?,
                numeric_tolerance: get_env_parse_or("NUMERIC_TOLERANCE", 1e-6)?,
                cas_retry_limit: get_env_parse_or("CAS_RETRY_LIMIT", 5)?,
            },
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
