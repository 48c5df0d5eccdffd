//! Process configuration from environment variables.
//!
//!   DATABASE_URL                 Postgres connection string
//!   DATABASE_POOL_SIZE           pool size (default: 10)
//!   MINECTL_BIND_ADDR            listen address (default: 0.0.0.0:3000)
//!   MINECTL_SITE_UTC_OFFSET      site local zone as `+HH:MM` (default: +09:00)
//!   MINECTL_RESET_INTERVAL_SECS  shift reset scheduler tick (default: 60)
//!   MINECTL_RESET_ON_REQUEST     also reconcile before medical reads (default: false)
//!   MINECTL_RUN_MIGRATIONS       apply embedded migrations on start (default: true)
//!
//! Invalid values are logged and replaced by the default.

use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use minectl_postgres::DatabaseConfig;
use tracing::warn;

const DEFAULT_SITE_OFFSET_SECS: i32 = 9 * 3600;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database: DatabaseConfig,
    pub bind_addr: String,
    pub site_offset: FixedOffset,
    pub reset_interval: Duration,
    pub reset_on_request: bool,
    pub run_migrations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            bind_addr: "0.0.0.0:3000".to_string(),
            site_offset: default_site_offset(),
            reset_interval: Duration::from_secs(60),
            reset_on_request: false,
            run_migrations: true,
        }
    }
}

fn default_site_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_SITE_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

impl ServerConfig {
    /// Read configuration from the process environment (after `.env`).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database = DatabaseConfig {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database.database_url),
            max_connections: parsed(&lookup, "DATABASE_POOL_SIZE", defaults.database.max_connections),
            ..defaults.database
        };

        let site_offset = match lookup("MINECTL_SITE_UTC_OFFSET") {
            Some(raw) => parse_utc_offset(&raw).unwrap_or_else(|| {
                warn!("Invalid MINECTL_SITE_UTC_OFFSET={raw:?}, using +09:00");
                defaults.site_offset
            }),
            None => defaults.site_offset,
        };

        let interval_secs: u64 = parsed(&lookup, "MINECTL_RESET_INTERVAL_SECS", 60);

        Self {
            database,
            bind_addr: lookup("MINECTL_BIND_ADDR").unwrap_or(defaults.bind_addr),
            site_offset,
            reset_interval: Duration::from_secs(interval_secs.max(1)),
            reset_on_request: flag(&lookup, "MINECTL_RESET_ON_REQUEST", defaults.reset_on_request),
            run_migrations: flag(&lookup, "MINECTL_RUN_MIGRATIONS", defaults.run_migrations),
        }
    }
}

fn parsed<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid {key}={raw:?}, using default");
            default
        }),
        None => default,
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) => {
            warn!("Invalid {key}={v:?}, using default");
            default
        }
        None => default,
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HH` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let c = config(&[]);
        assert_eq!(c.bind_addr, "0.0.0.0:3000");
        assert_eq!(c.database.max_connections, 10);
        assert_eq!(c.site_offset.local_minus_utc(), 9 * 3600);
        assert_eq!(c.reset_interval, Duration::from_secs(60));
        assert!(!c.reset_on_request);
        assert!(c.run_migrations);
    }

    #[test]
    fn environment_overrides() {
        let c = config(&[
            ("DATABASE_URL", "postgresql://db/site"),
            ("DATABASE_POOL_SIZE", "4"),
            ("MINECTL_SITE_UTC_OFFSET", "+10:30"),
            ("MINECTL_RESET_INTERVAL_SECS", "15"),
            ("MINECTL_RESET_ON_REQUEST", "true"),
            ("MINECTL_RUN_MIGRATIONS", "0"),
        ]);
        assert_eq!(c.database.database_url, "postgresql://db/site");
        assert_eq!(c.database.max_connections, 4);
        assert_eq!(c.site_offset.local_minus_utc(), 10 * 3600 + 30 * 60);
        assert_eq!(c.reset_interval, Duration::from_secs(15));
        assert!(c.reset_on_request);
        assert!(!c.run_migrations);
    }

    #[test]
    fn invalid_values_fall_back() {
        let c = config(&[
            ("DATABASE_POOL_SIZE", "many"),
            ("MINECTL_SITE_UTC_OFFSET", "Asia/Yakutsk"),
            ("MINECTL_RESET_ON_REQUEST", "maybe"),
            ("MINECTL_RESET_INTERVAL_SECS", "0"),
        ]);
        assert_eq!(c.database.max_connections, 10);
        assert_eq!(c.site_offset.local_minus_utc(), 9 * 3600);
        assert!(!c.reset_on_request);
        assert_eq!(c.reset_interval, Duration::from_secs(1));
    }

    #[test]
    fn utc_offsets() {
        assert_eq!(parse_utc_offset("-03:00").unwrap().local_minus_utc(), -3 * 3600);
        assert_eq!(parse_utc_offset("+9").unwrap().local_minus_utc(), 9 * 3600);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("09:00").is_none());
        assert!(parse_utc_offset("+25:00").is_none());
    }
}
