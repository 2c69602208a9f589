use {
    crate::domain::money::{CommissionRate, Currency},
    std::{net::SocketAddr, str::FromStr, time::Duration},
    thiserror::Error,
};

const DEFAULT_API_URL: &str = "https://api.yookassa.ru/v3";
const DEFAULT_COMMISSION: &str = "0.10";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub shop_id: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_url: String,
    pub currency: Currency,
    pub web_app_url: String,
    pub gateway_timeout: Duration,
    pub gateway_max_attempts: u32,
    pub gateway_retry_base: Duration,
    pub default_commission: CommissionRate,
    pub event_bus_url: Option<String>,
    pub event_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let secret_key = required("YOOKASSA_SECRET_KEY")?;
        let timeout_ms: u64 = parse(&get, "GATEWAY_TIMEOUT_MS", 10_000)?;
        let retry_base_ms: u64 = parse(&get, "GATEWAY_RETRY_BASE_MS", 200)?;

        let currency = get("PAYMENT_CURRENCY").unwrap_or_else(|| "RUB".into());
        let currency = Currency::try_from(currency.as_str()).map_err(|e| ConfigError::Invalid {
            name: "PAYMENT_CURRENCY",
            reason: e.to_string(),
        })?;

        let commission = get("DEFAULT_COMMISSION_RATE").unwrap_or_else(|| DEFAULT_COMMISSION.into());
        let default_commission =
            CommissionRate::from_decimal_str(&commission).map_err(|e| ConfigError::Invalid {
                name: "DEFAULT_COMMISSION_RATE",
                reason: e.to_string(),
            })?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse(&get, "DATABASE_MAX_CONNECTIONS", 20)?,
            bind_addr: parse(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3002)))?,
            shop_id: required("YOOKASSA_SHOP_ID")?,
            webhook_secret: get("YOOKASSA_WEBHOOK_SECRET").unwrap_or_else(|| secret_key.clone()),
            secret_key,
            api_url: get("YOOKASSA_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            currency,
            web_app_url: get("WEB_APP_URL").unwrap_or_else(|| "http://localhost:3000".into()),
            gateway_timeout: Duration::from_millis(timeout_ms),
            gateway_max_attempts: parse(&get, "GATEWAY_MAX_ATTEMPTS", 3)?,
            gateway_retry_base: Duration::from_millis(retry_base_ms),
            default_commission,
            event_bus_url: get("EVENT_BUS_URL"),
            event_queue_capacity: parse(&get, "EVENT_QUEUE_CAPACITY", 1024)?,
        })
    }
}

fn parse<T>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
