use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,

    pub search_radius_km: f64,
    pub driver_response_timeout: Duration,
    pub total_matching_timeout: Duration,

    pub geohash_precision: usize,
    pub lock_sweep_interval: Duration,

    pub response_inbox_size: usize,
    pub event_buffer_size: usize,

    pub base_fare: f64,
    pub per_km_rate: f64,
    pub per_minute_rate: f64,
    pub minimum_fare: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 8080)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            search_radius_km: parse_or_default("SEARCH_RADIUS_KM", 5.0)?,
            driver_response_timeout: Duration::from_secs(parse_or_default(
                "DRIVER_RESPONSE_TIMEOUT_SECS",
                10,
            )?),
            total_matching_timeout: Duration::from_secs(parse_or_default(
                "TOTAL_MATCHING_TIMEOUT_SECS",
                60,
            )?),
            geohash_precision: parse_or_default("GEOHASH_PRECISION", 6)?,
            lock_sweep_interval: Duration::from_millis(parse_or_default(
                "LOCK_SWEEP_INTERVAL_MS",
                1000,
            )?),
            response_inbox_size: parse_or_default("RESPONSE_INBOX_SIZE", 100)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            base_fare: parse_or_default("BASE_FARE", 2.50)?,
            per_km_rate: parse_or_default("PER_KM_RATE", 1.50)?,
            per_minute_rate: parse_or_default("PER_MINUTE_RATE", 0.25)?,
            minimum_fare: parse_or_default("MINIMUM_FARE", 5.00)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            log_level: "info".to_string(),
            search_radius_km: 5.0,
            driver_response_timeout: Duration::from_secs(10),
            total_matching_timeout: Duration::from_secs(60),
            geohash_precision: 6,
            lock_sweep_interval: Duration::from_millis(1000),
            response_inbox_size: 100,
            event_buffer_size: 1024,
            base_fare: 2.50,
            per_km_rate: 1.50,
            per_minute_rate: 0.25,
            minimum_fare: 5.00,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
