use crate::domain::Decimal;
use crate::engine::SessionConfig;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub backend_url: String,
    pub transaction_store: StoreKind,
    pub database_path: Option<String>,
    pub price_csv_path: Option<String>,
    pub initial_window: usize,
    pub tick_interval_ms: u64,
    pub trade_quantity: Decimal,
    pub initial_balance: Decimal,
    pub instrument_pair: String,
    pub auto_start: bool,
}

/// Where trades are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// The remote `/transactions` service at `BACKEND_URL`.
    Http,
    /// Embedded sqlite file at `DATABASE_PATH`.
    Sqlite,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue(name.to_string(), reason.into())
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    name: &str,
    default: &str,
    expected: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(name)
        .map(|s| s.trim())
        .unwrap_or(default)
        .parse::<T>()
        .map_err(|_| invalid(name, format!("must be {}", expected)))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port: u16 = parse_or(&env_map, "PORT", "8080", "a valid u16")?;

        let backend_url = env_map
            .get("BACKEND_URL")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8000".to_string());

        let transaction_store = match env_map
            .get("TRANSACTION_STORE")
            .map(|s| s.as_str())
            .unwrap_or("http")
        {
            "http" => StoreKind::Http,
            "sqlite" => StoreKind::Sqlite,
            other => {
                return Err(invalid(
                    "TRANSACTION_STORE",
                    format!("must be http or sqlite, got {}", other),
                ))
            }
        };

        let database_path = env_map.get("DATABASE_PATH").cloned();
        if transaction_store == StoreKind::Sqlite && database_path.is_none() {
            return Err(ConfigError::MissingEnv("DATABASE_PATH".to_string()));
        }

        let price_csv_path = env_map
            .get("PRICE_CSV_PATH")
            .filter(|s| !s.trim().is_empty())
            .cloned();

        let initial_window: usize =
            parse_or(&env_map, "INITIAL_WINDOW", "4000", "a positive integer")?;
        if initial_window == 0 {
            return Err(invalid("INITIAL_WINDOW", "must be at least 1"));
        }

        let tick_interval_ms: u64 =
            parse_or(&env_map, "TICK_INTERVAL_MS", "1000", "a positive integer")?;
        if tick_interval_ms == 0 {
            return Err(invalid("TICK_INTERVAL_MS", "must be greater than 0"));
        }

        let trade_quantity: Decimal =
            parse_or(&env_map, "TRADE_QUANTITY", "10000", "a decimal number")?;
        if !trade_quantity.is_positive() {
            return Err(invalid("TRADE_QUANTITY", "must be greater than 0"));
        }

        let initial_balance: Decimal =
            parse_or(&env_map, "INITIAL_BALANCE", "1000000", "a decimal number")?;

        let instrument_pair = env_map
            .get("INSTRUMENT_PAIR")
            .cloned()
            .unwrap_or_else(|| "USD/JPY".to_string());

        let auto_start = match env_map
            .get("AUTO_START")
            .map(|s| s.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                return Err(invalid(
                    "AUTO_START",
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        Ok(Config {
            port,
            backend_url,
            transaction_store,
            database_path,
            price_csv_path,
            initial_window,
            tick_interval_ms,
            trade_quantity,
            initial_balance,
            instrument_pair,
            auto_start,
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            initial_window: self.initial_window,
            trade_quantity: self.trade_quantity,
            initial_balance: self.initial_balance,
            pair: self.instrument_pair.clone(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
