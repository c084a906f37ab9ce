//! config: explicit configuration objects for the gateway and the services.
//!
//! Values come from environment variables (optionally seeded from a `.env`
//! file). Unset variables fall back to a default, which is logged; a value
//! that is set but does not parse is a [`ConfigError`].
//!
//! Tests build configs from any key lookup with the `from_lookup`
//! constructors instead of touching the process environment.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::retry::RetryPolicy;

/// A key → value lookup, normally backed by `std::env::var`.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key} value `{value}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("unsupported STORE_URL `{0}`; expected `memory` or `sqlite:<path>`")]
    UnsupportedStore(String),

    #[error("STORE_URL `{0}` is an in-memory sqlite database; use `memory` instead")]
    InMemorySqlite(String),

    #[error("STORE_URL `{0}` needs the `sqlite` feature")]
    SqliteDisabled(String),
}

/// Which downstream service a [`ServiceConfig`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Todo,
    Calculation,
}

impl ServiceKind {
    /// Name reported in health payloads.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Todo => "todo",
            ServiceKind::Calculation => "calculation",
        }
    }

    fn port_key(&self) -> &'static str {
        match self {
            ServiceKind::Todo => "TODO_SERVICE_PORT",
            ServiceKind::Calculation => "CALC_SERVICE_PORT",
        }
    }

    fn default_port(&self) -> &'static str {
        match self {
            ServiceKind::Todo => "3002",
            ServiceKind::Calculation => "3001",
        }
    }
}

/// Where a service keeps its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUrl {
    Memory,
    Sqlite(PathBuf),
}

impl FromStr for StoreUrl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("memory") {
            return Ok(StoreUrl::Memory);
        }

        match trimmed.strip_prefix("sqlite:") {
            Some(path) if is_in_memory_sqlite(path) => {
                Err(ConfigError::InMemorySqlite(trimmed.to_string()))
            }
            Some(path) if !path.is_empty() => {
                if cfg!(feature = "sqlite") {
                    Ok(StoreUrl::Sqlite(PathBuf::from(path)))
                } else {
                    Err(ConfigError::SqliteDisabled(trimmed.to_string()))
                }
            }
            _ => Err(ConfigError::UnsupportedStore(trimmed.to_string())),
        }
    }
}

/// `:memory:` and `mode=memory` URIs give each connection its own database,
/// which a connection pool cannot share.
pub fn is_in_memory_sqlite(path: &str) -> bool {
    path == ":memory:" || path.starts_with("file::memory:") || path.contains("mode=memory")
}

/// Store connection settings shared by both services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: StoreUrl,
    /// Upper bound on concurrently open store connections.
    pub pool_max: usize,
    /// How long a call may wait for a free connection.
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            url: StoreUrl::Memory,
            pool_max: 10,
            acquire_timeout: Duration::from_millis(30_000),
        }
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let url = match lookup("STORE_URL") {
            Some(raw) => raw.parse()?,
            None => {
                info!("STORE_URL not set, using default: memory");
                StoreUrl::Memory
            }
        };

        Ok(Self {
            url,
            pool_max: load(lookup, "DB_POOL_MAX", "10")?,
            acquire_timeout: Duration::from_millis(load(lookup, "DB_POOL_ACQUIRE", "30000")?),
        })
    }
}

/// Configuration for the todo and calculation services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub kind: ServiceKind,
    pub port: u16,
    pub hostname: String,
    pub store: StoreConfig,
    /// Policy around every store call made while handling a request.
    pub store_retry: RetryPolicy,
    /// Policy around the initial store connection at startup.
    pub connect_retry: RetryPolicy,
}

impl ServiceConfig {
    pub fn from_env(kind: ServiceKind) -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_lookup(kind, &|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup(kind: ServiceKind, lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            kind,
            port: load(lookup, kind.port_key(), kind.default_port())?,
            hostname: hostname(lookup),
            store: StoreConfig::from_lookup(lookup)?,
            store_retry: RetryPolicy::from_millis(
                load(lookup, "STORE_RETRY_ATTEMPTS", "3")?,
                load(lookup, "STORE_RETRY_DELAY_MS", "3000")?,
            ),
            connect_retry: RetryPolicy::from_millis(
                load(lookup, "STORE_CONNECT_ATTEMPTS", "5")?,
                load(lookup, "STORE_CONNECT_DELAY_MS", "3000")?,
            ),
        })
    }
}

/// Configuration for the API gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub port: u16,
    pub calc_service_url: String,
    pub todo_service_url: String,
    pub hostname: String,
    /// Policy around every downstream call.
    pub retry: RetryPolicy,
    /// Per-request downstream timeout. `None` leaves it to the HTTP client.
    pub upstream_timeout: Option<Duration>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let upstream_timeout = match lookup("UPSTREAM_TIMEOUT_MS") {
            Some(raw) => Some(Duration::from_millis(parse("UPSTREAM_TIMEOUT_MS", &raw)?)),
            None => None,
        };

        Ok(Self {
            port: load(lookup, "PORT", "3000")?,
            calc_service_url: base_url(load(lookup, "CALC_SERVICE_URL", "http://calc-service:3001")?),
            todo_service_url: base_url(load(lookup, "TODO_SERVICE_URL", "http://todo-service:3002")?),
            hostname: hostname(lookup),
            retry: RetryPolicy::from_millis(
                load(lookup, "GATEWAY_RETRY_ATTEMPTS", "5")?,
                load(lookup, "GATEWAY_RETRY_DELAY_MS", "2000")?,
            ),
            upstream_timeout,
        })
    }
}

/// Seed the process environment from `.env` when one exists.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }
}

fn load<T: FromStr>(lookup: Lookup<'_>, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse(key, &raw)
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

/// `HOSTNAME` when exported, else the system hostname, else `unknown`.
fn hostname(lookup: Lookup<'_>) -> String {
    lookup("HOSTNAME")
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            info!("HOSTNAME not set, using default: unknown");
            "unknown".to_string()
        })
}

fn base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn gateway_defaults() {
        let config = GatewayConfig::from_lookup(&lookup_from(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.calc_service_url, "http://calc-service:3001");
        assert_eq!(config.todo_service_url, "http://todo-service:3002");
        assert!(!config.hostname.is_empty());
        assert_eq!(config.retry, RetryPolicy::from_millis(5, 2000));
        assert_eq!(config.upstream_timeout, None);
    }

    #[test]
    fn gateway_overrides_and_trims_urls() {
        let lookup = lookup_from(&[
            ("PORT", "8080"),
            ("CALC_SERVICE_URL", "http://localhost:4001/"),
            ("GATEWAY_RETRY_ATTEMPTS", "2"),
            ("GATEWAY_RETRY_DELAY_MS", "10"),
            ("UPSTREAM_TIMEOUT_MS", "1500"),
        ]);
        let config = GatewayConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.calc_service_url, "http://localhost:4001");
        assert_eq!(config.retry, RetryPolicy::from_millis(2, 10));
        assert_eq!(config.upstream_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn hostname_prefers_the_environment() {
        let lookup = lookup_from(&[("HOSTNAME", " gw-7 \n")]);
        assert_eq!(GatewayConfig::from_lookup(&lookup).unwrap().hostname, "gw-7");

        let service = ServiceConfig::from_lookup(ServiceKind::Todo, &lookup).unwrap();
        assert_eq!(service.hostname, "gw-7");
    }

    #[test]
    fn hostname_falls_back_to_the_system_name() {
        let config = GatewayConfig::from_lookup(&lookup_from(&[])).unwrap();
        let expected = std::fs::read_to_string("/etc/hostname")
            .map(|name| name.trim().to_string())
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        assert_eq!(config.hostname, expected);
    }

    #[test]
    fn invalid_number_is_rejected() {
        let lookup = lookup_from(&[("PORT", "eighty")]);
        let err = GatewayConfig::from_lookup(&lookup).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn service_defaults_per_kind() {
        let todo = ServiceConfig::from_lookup(ServiceKind::Todo, &lookup_from(&[])).unwrap();
        assert_eq!(todo.port, 3002);
        assert_eq!(todo.store, StoreConfig::memory());
        assert_eq!(todo.store_retry, RetryPolicy::from_millis(3, 3000));
        assert_eq!(todo.connect_retry, RetryPolicy::from_millis(5, 3000));

        let calc =
            ServiceConfig::from_lookup(ServiceKind::Calculation, &lookup_from(&[])).unwrap();
        assert_eq!(calc.port, 3001);
        assert_eq!(calc.kind.name(), "calculation");
    }

    #[test]
    fn store_url_parsing() {
        assert_eq!("memory".parse::<StoreUrl>(), Ok(StoreUrl::Memory));
        assert_eq!(
            "postgres://db".parse::<StoreUrl>(),
            Err(ConfigError::UnsupportedStore("postgres://db".into()))
        );
        assert!(matches!(
            "sqlite:".parse::<StoreUrl>(),
            Err(ConfigError::UnsupportedStore(_))
        ));
        assert_eq!(
            "sqlite::memory:".parse::<StoreUrl>(),
            Err(ConfigError::InMemorySqlite("sqlite::memory:".into()))
        );
        assert!(matches!(
            "sqlite:file:app?mode=memory&cache=shared".parse::<StoreUrl>(),
            Err(ConfigError::InMemorySqlite(_))
        ));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_store_url() {
        assert_eq!(
            "sqlite:/tmp/app.db".parse::<StoreUrl>(),
            Ok(StoreUrl::Sqlite(PathBuf::from("/tmp/app.db")))
        );
    }

    #[cfg(not(feature = "sqlite"))]
    #[test]
    fn sqlite_store_url_without_feature() {
        assert!(matches!(
            "sqlite:/tmp/app.db".parse::<StoreUrl>(),
            Err(ConfigError::SqliteDisabled(_))
        ));
    }
}
