use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::workflows::pricing::PricingConfig;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pricing: PricingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pricing: load_pricing()?,
        })
    }
}

fn load_pricing() -> Result<PricingConfig, ConfigError> {
    let defaults = PricingConfig::default();

    let pricing = PricingConfig {
        default_mileage: env_or("LEASE_DEFAULT_MILEAGE", defaults.default_mileage)?,
        default_deposit: env_or("LEASE_DEFAULT_DEPOSIT", defaults.default_deposit)?,
        default_term: match env::var("LEASE_DEFAULT_TERM") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_var("LEASE_DEFAULT_TERM", &raw)?),
            _ => defaults.default_term,
        },
        best_anchor_percent: env_or("LEASE_BEST_ANCHOR_PERCENT", defaults.best_anchor_percent)?,
        worst_anchor_percent: env_or(
            "LEASE_WORST_ANCHOR_PERCENT",
            defaults.worst_anchor_percent,
        )?,
        min_retail_price: env_or("LEASE_MIN_RETAIL_PRICE", defaults.min_retail_price)?,
        max_retail_price: env_or("LEASE_MAX_RETAIL_PRICE", defaults.max_retail_price)?,
    };

    if !(pricing.best_anchor_percent < pricing.worst_anchor_percent) {
        return Err(ConfigError::InvertedAnchors {
            best: pricing.best_anchor_percent,
            worst: pricing.worst_anchor_percent,
        });
    }

    Ok(pricing)
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_var(key, &raw),
        _ => Ok(default),
    }
}

fn parse_var<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("{key} has an invalid value '{value}'")]
    InvalidValue { key: &'static str, value: String },
    #[error("score anchors are inverted (best {best}% must be below worst {worst}%)")]
    InvertedAnchors { best: f64, worst: f64 },
}
