//! Environment-sourced settings.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use catalog_etl_shared::EntityClass;

use crate::retry::RetryPolicy;
use crate::CatalogEtlError;

const DEFAULT_POSTGRES_USER: &str = "postgres";
const DEFAULT_POSTGRES_HOST: &str = "localhost";
const DEFAULT_POSTGRES_PORT: u16 = 5432;
const DEFAULT_POSTGRES_DB: &str = "movies_database";
const DEFAULT_REDIS_HOST: &str = "localhost";
const DEFAULT_REDIS_PORT: u16 = 6379;
const DEFAULT_ELASTIC_HOST: &str = "localhost";
const DEFAULT_ELASTIC_PORT: u16 = 9200;

/// How startup reacts to a dependency that cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection every `connect_retry_interval` until successful.
    Retry,
}

impl FromStr for ConnectionMode {
    type Err = CatalogEtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Ok(Self::FailFast),
            "retry" => Ok(Self::Retry),
            other => Err(CatalogEtlError::config(format!(
                "ETL_CONNECTION_MODE must be 'fail-fast' or 'retry', got '{}'",
                other
            ))),
        }
    }
}

/// Everything the service reads from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub postgres_max_connections: u32,
    pub redis_url: String,
    pub elastic_url: String,
    pub elastic_credentials: Option<(String, String)>,
    pub check_interval: Duration,
    pub chunk_size: usize,
    pub extract_concurrency: usize,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    pub pipelines: Vec<EntityClass>,
    pub connection_mode: ConnectionMode,
    pub connect_retry_interval: Duration,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, CatalogEtlError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable
    /// if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CatalogEtlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let database_url = match vars.string("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                vars.string_or("POSTGRES_USER", DEFAULT_POSTGRES_USER),
                vars.string_or("POSTGRES_PASSWORD", ""),
                vars.string_or("POSTGRES_HOST", DEFAULT_POSTGRES_HOST),
                vars.parse_or("POSTGRES_PORT", DEFAULT_POSTGRES_PORT)?,
                vars.string_or("POSTGRES_DB", DEFAULT_POSTGRES_DB),
            ),
        };

        let redis_url = match vars.string("REDIS_URL") {
            Some(url) => url,
            None => format!(
                "redis://{}:{}",
                vars.string_or("REDIS_HOST", DEFAULT_REDIS_HOST),
                vars.parse_or("REDIS_PORT", DEFAULT_REDIS_PORT)?,
            ),
        };

        let elastic_url = match vars.string("ELASTIC_URL") {
            Some(url) => url,
            None => format!(
                "http://{}:{}",
                vars.string_or("ELASTIC_HOST", DEFAULT_ELASTIC_HOST),
                vars.parse_or("ELASTIC_PORT", DEFAULT_ELASTIC_PORT)?,
            ),
        };

        let elastic_credentials = match (
            vars.string("ELASTIC_USERNAME"),
            vars.string("ELASTIC_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        };

        let chunk_size: usize = vars.parse_or("ETL_CHUNK_SIZE", 100)?;
        if chunk_size == 0 {
            return Err(CatalogEtlError::config("ETL_CHUNK_SIZE must be greater than 0"));
        }
        let extract_concurrency: usize = vars.parse_or("ETL_EXTRACT_CONCURRENCY", 4)?;
        if extract_concurrency == 0 {
            return Err(CatalogEtlError::config(
                "ETL_EXTRACT_CONCURRENCY must be greater than 0",
            ));
        }

        let retry = RetryPolicy {
            initial_delay: Duration::from_millis(vars.parse_or("ETL_RETRY_INITIAL_MS", 100)?),
            max_delay: Duration::from_secs(vars.parse_or("ETL_RETRY_MAX_DELAY_SECS", 30)?),
            max_attempts: vars.parse("ETL_RETRY_MAX_ATTEMPTS")?,
            call_timeout: Duration::from_secs(vars.parse_or("ETL_CALL_TIMEOUT_SECS", 30)?),
        };

        let pipelines = match vars.string("ETL_PIPELINES") {
            Some(list) => parse_pipelines(&list)?,
            None => EntityClass::ALL.to_vec(),
        };

        Ok(Self {
            database_url,
            postgres_max_connections: vars.parse_or("POSTGRES_MAX_CONNECTIONS", 10)?,
            redis_url,
            elastic_url,
            elastic_credentials,
            check_interval: Duration::from_secs(vars.parse_or("ETL_CHECK_INTERVAL_SECS", 30)?),
            chunk_size,
            extract_concurrency,
            connect_timeout: Duration::from_secs(vars.parse_or("ETL_CONNECT_TIMEOUT_SECS", 10)?),
            retry,
            pipelines,
            connection_mode: vars.parse_or("ETL_CONNECTION_MODE", ConnectionMode::FailFast)?,
            connect_retry_interval: Duration::from_secs(vars.parse_or("ETL_CONNECT_RETRY_SECS", 15)?),
        })
    }
}

fn parse_pipelines(list: &str) -> Result<Vec<EntityClass>, CatalogEtlError> {
    let mut classes = Vec::new();
    for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let class: EntityClass = name
            .parse()
            .map_err(|_| CatalogEtlError::config(format!("unknown pipeline '{}' in ETL_PIPELINES", name)))?;
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    if classes.is_empty() {
        return Err(CatalogEtlError::config("ETL_PIPELINES names no pipeline"));
    }
    Ok(classes)
}

/// Typed access to looked-up variables. Empty values count as unset.
struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>, CatalogEtlError>
    where
        T: FromStr,
    {
        self.string(key)
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map_err(|_| CatalogEtlError::config(format!("invalid value '{}' for {}", raw, key)))
            })
            .transpose()
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, CatalogEtlError>
    where
        T: FromStr,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }
}
