//! Process configuration, read from the environment.
//!
//! `main` loads a `.env` file first (if present), so everything here can also
//! be set there.

use std::net::SocketAddr;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

pub const BIND_ADDR_VAR: &str = "STOREOPS_BIND_ADDR";
pub const STORE_VAR: &str = "STOREOPS_STORE";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const DB_MAX_CONNECTIONS_VAR: &str = "STOREOPS_DB_MAX_CONNECTIONS";
pub const DEFAULT_LOYALTY_RATE_VAR: &str = "STOREOPS_DEFAULT_LOYALTY_RATE";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when STOREOPS_STORE=postgres")]
    Missing(&'static str),
}

/// Which event store backs the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    /// Points per currency unit of the default loyalty program.
    pub default_loyalty_rate: Decimal,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset and blank values use defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_addr = parse(BIND_ADDR_VAR, get(BIND_ADDR_VAR), || {
            Ok(SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))
        })?;
        let default_loyalty_rate = parse(DEFAULT_LOYALTY_RATE_VAR, get(DEFAULT_LOYALTY_RATE_VAR), || Ok(Decimal::ONE))?;
        if default_loyalty_rate.is_sign_negative() {
            return Err(ConfigError::Invalid {
                var: DEFAULT_LOYALTY_RATE_VAR,
                value: default_loyalty_rate.to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        let store = match get(STORE_VAR).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("postgres") => StoreBackend::Postgres {
                database_url: get(DATABASE_URL_VAR).ok_or(ConfigError::Missing(DATABASE_URL_VAR))?,
                max_connections: parse(DB_MAX_CONNECTIONS_VAR, get(DB_MAX_CONNECTIONS_VAR), || {
                    Ok(DEFAULT_DB_MAX_CONNECTIONS)
                })?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: STORE_VAR,
                    value: other.to_string(),
                    reason: "expected 'memory' or 'postgres'".to_string(),
                });
            }
        };

        Ok(Self {
            bind_addr,
            store,
            default_loyalty_rate,
        })
    }
}

fn parse<T>(
    var: &'static str,
    raw: Option<String>,
    default: impl FnOnce() -> Result<T, ConfigError>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => default(),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
