use std::time::Duration;

use crate::service_bus_queue::{parse_broker_connection_string, BrokerConfig};

pub const DEFAULT_QUEUE_NAME: &str = "gmail_sync_queue";
const DEFAULT_PEEK_LOCK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_PREFETCH_LIMIT: usize = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
    #[error("prefetch limit {0} is unsupported, the worker processes one job at a time")]
    UnsupportedPrefetch(usize),
    #[error("unknown fetcher kind {0:?}, expected \"imap\" or \"fixture\"")]
    InvalidFetcher(String),
    #[error("broker config error: {0}")]
    Broker(String),
}

/// Which mail source the worker talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherKind {
    Imap,
    Fixture,
}

impl FetcherKind {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "imap" => Ok(Self::Imap),
            "fixture" => Ok(Self::Fixture),
            other => Err(ConfigError::InvalidFetcher(other.to_string())),
        }
    }
}

/// Everything the worker binary needs, resolved once at startup so a bad
/// environment fails fast instead of mid-job.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub broker: BrokerConfig,
    pub prefetch_limit: usize,
    pub db_url: String,
    pub db_allow_invalid_certs: bool,
    pub imap_host: String,
    pub imap_port: u16,
    pub fetcher: FetcherKind,
    pub poll_interval: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let broker = resolve_broker_config_from_env()?;

        let prefetch_limit = resolve_parsed_env("SYNC_PREFETCH_LIMIT", DEFAULT_PREFETCH_LIMIT)?;
        if prefetch_limit != DEFAULT_PREFETCH_LIMIT {
            return Err(ConfigError::UnsupportedPrefetch(prefetch_limit));
        }

        let db_url = resolve_required_env("DATABASE_URL")?;
        let db_allow_invalid_certs = resolve_flag_env("SYNC_TLS_ALLOW_INVALID_CERTS");

        let imap_host =
            resolve_optional_env("MAIL_IMAP_HOST").unwrap_or_else(|| "imap.gmail.com".to_string());
        let imap_port = resolve_parsed_env("MAIL_IMAP_PORT", 993u16)?;

        let fetcher = match resolve_optional_env("MAIL_FETCHER") {
            Some(value) => FetcherKind::parse(&value)?,
            None => FetcherKind::Imap,
        };

        let poll_interval = Duration::from_secs(resolve_parsed_env(
            "SYNC_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?);

        Ok(Self {
            broker,
            prefetch_limit,
            db_url,
            db_allow_invalid_certs,
            imap_host,
            imap_port,
            fetcher,
            poll_interval,
        })
    }
}

/// Broker settings come either from a full connection string or from the
/// individual namespace/policy variables. The queue name defaults to the
/// shared sync queue; an EntityPath in the connection string wins over the
/// default but not over an explicit SYNC_QUEUE_NAME.
pub fn resolve_broker_config_from_env() -> Result<BrokerConfig, ConfigError> {
    dotenvy::dotenv().ok();

    let peek_lock_timeout = Duration::from_secs(resolve_parsed_env(
        "SYNC_PEEK_LOCK_TIMEOUT_SECS",
        DEFAULT_PEEK_LOCK_TIMEOUT_SECS,
    )?);
    let explicit_queue_name = resolve_optional_env("SYNC_QUEUE_NAME");

    if let Some(conn_str) = resolve_optional_env("SYNC_BROKER_CONNECTION_STRING") {
        let parsed = parse_broker_connection_string(&conn_str)
            .map_err(|err| ConfigError::Broker(err.to_string()))?;
        let queue_name = explicit_queue_name
            .or(parsed.entity_path)
            .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string());
        return Ok(BrokerConfig {
            namespace: parsed.namespace,
            policy_name: parsed.policy_name,
            policy_key: parsed.policy_key,
            queue_name,
            peek_lock_timeout,
        });
    }

    Ok(BrokerConfig {
        namespace: resolve_required_env("SYNC_BROKER_NAMESPACE")?,
        policy_name: resolve_required_env("SYNC_BROKER_POLICY_NAME")?,
        policy_key: resolve_required_env("SYNC_BROKER_POLICY_KEY")?,
        queue_name: explicit_queue_name.unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string()),
        peek_lock_timeout,
    })
}

fn resolve_optional_env(name: &'static str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn resolve_required_env(name: &'static str) -> Result<String, ConfigError> {
    resolve_optional_env(name).ok_or(ConfigError::MissingVar(name))
}

fn resolve_flag_env(name: &'static str) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_ascii_lowercase())
        .map(|value| matches!(value.as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn resolve_parsed_env<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match resolve_optional_env(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidVar(name, value)),
        None => Ok(default),
    }
}
