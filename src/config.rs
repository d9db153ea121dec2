//! Configuration management

use anyhow::{self, Context, Result};

use crate::defaults;
use crate::types::Coordinates;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Valhalla routing engine URL (optional, falls back to mock if unavailable)
    pub valhalla_url: Option<String>,

    /// JWT secret key for token signing/validation
    pub jwt_secret: String,

    /// Headquarters used when a location carries no coordinates of its own
    pub hq: Coordinates,

    /// Longest route a planner may commit, in minutes
    pub max_route_duration_minutes: u32,

    /// Time budget for one clustering solve
    pub cluster_max_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let valhalla_url = std::env::var("VALHALLA_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET must be set (generate one with: openssl rand -base64 48)")?;

        if jwt_secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 bytes (current: {} bytes). Generate one with: openssl rand -base64 48",
                jwt_secret.len()
            );
        }

        let hq = Coordinates {
            lat: parse_var("HQ_LATITUDE", defaults::HQ_LATITUDE)?,
            lng: parse_var("HQ_LONGITUDE", defaults::HQ_LONGITUDE)?,
        };
        if !hq.is_valid() {
            anyhow::bail!("HQ_LATITUDE/HQ_LONGITUDE out of range: {}, {}", hq.lat, hq.lng);
        }

        let max_route_duration_minutes = parse_var(
            "MAX_ROUTE_DURATION_MINUTES",
            defaults::MAX_ROUTE_DURATION_MINUTES,
        )?;

        let cluster_max_seconds =
            parse_var("CLUSTER_MAX_SECONDS", defaults::CLUSTER_MAX_SECONDS)?;

        Ok(Self {
            nats_url,
            database_url,
            valhalla_url,
            jwt_secret,
            hq,
            max_route_duration_minutes,
            cluster_max_seconds,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        std::env::remove_var("SHUTTLE_TEST_UNSET_VAR");
        let value: u32 = parse_var("SHUTTLE_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_var_reads_value() {
        std::env::set_var("SHUTTLE_TEST_PARSE_VAR", " 17 ");
        let value: u32 = parse_var("SHUTTLE_TEST_PARSE_VAR", 42).unwrap();
        assert_eq!(value, 17);
        std::env::remove_var("SHUTTLE_TEST_PARSE_VAR");
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        std::env::set_var("SHUTTLE_TEST_BAD_VAR", "ninety");
        let result: Result<u32> = parse_var("SHUTTLE_TEST_BAD_VAR", 90);
        assert!(result.is_err());
        std::env::remove_var("SHUTTLE_TEST_BAD_VAR");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_defaults() {
        std::env::remove_var("VALHALLA_URL");
        std::env::remove_var("HQ_LATITUDE");
        std::env::remove_var("HQ_LONGITUDE");
        std::env::remove_var("MAX_ROUTE_DURATION_MINUTES");
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", SECRET);

        let config = Config::from_env().unwrap();
        assert!(config.valhalla_url.is_none());
        assert_eq!(config.max_route_duration_minutes, 90);
        assert!((config.hq.lat - defaults::HQ_LATITUDE).abs() < 1e-12);
        assert!((config.hq.lng - defaults::HQ_LONGITUDE).abs() < 1e-12);
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_rejects_short_jwt_secret() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", "short");

        assert!(Config::from_env().is_err());
        std::env::set_var("JWT_SECRET", SECRET);
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_empty_valhalla_url_is_none() {
        std::env::set_var("VALHALLA_URL", "  ");
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", SECRET);

        let config = Config::from_env().unwrap();
        assert!(config.valhalla_url.is_none());
        std::env::remove_var("VALHALLA_URL");
    }
}
