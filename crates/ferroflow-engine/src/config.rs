// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine configuration from environment variables.

use std::str::FromStr;
use std::time::Duration;

use ferroflow_store::Dialect;

/// Process-wide engine configuration.
///
/// Loaded from the environment; every field except the database settings has
/// a default.
///
/// | Key | Meaning | Default |
/// |-----|---------|---------|
/// | `DATABASE_TYPE` | `POSTGRES`, `MYSQL` or `SQLITE` | (required) |
/// | `DATABASE_URL` | Connection string | (required unless SQLite) |
/// | `DATABASE_FILE` | SQLite file path | `./gflow.db` |
/// | `SERVER_PORT` | HTTP control-plane port | `8080` |
/// | `CHECK_DB_INTERVAL` | Scheduler tick period | `3s` |
/// | `STUCK_INTERVAL` | Repair tick period | `60s` |
/// | `STUCK_AFTER_MINUTES` | Repair cutoff | `5` |
/// | `BATCH_SIZE` | Queue capacity and poll batch | `5` |
/// | `EXECUTOR_GROUP` | Partition tag | `default` |
/// | `EXECUTOR_SIZE` | Worker count | `5` |
/// | `SESSION_EXPIRY_HOURS` | Web session lifetime | `1` |
/// | `EXECUTOR_NAME` | Executor display name | hostname |
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub dialect: Dialect,
    pub database_url: Option<String>,
    pub database_file: String,
    pub server_port: u16,
    pub check_db_interval: Duration,
    pub stuck_interval: Duration,
    pub stuck_after_minutes: i64,
    pub batch_size: usize,
    pub executor_group: String,
    pub executor_size: usize,
    /// Consumed by the external web session layer, carried here so one
    /// config struct covers the whole process.
    pub session_expiry_hours: i64,
    pub executor_name: Option<String>,
}

impl EngineConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dialect_tag =
            std::env::var("DATABASE_TYPE").map_err(|_| ConfigError::Missing("DATABASE_TYPE"))?;
        let dialect = Dialect::from_str(&dialect_tag).map_err(|_| {
            ConfigError::Invalid("DATABASE_TYPE", "must be POSTGRES, MYSQL or SQLITE")
        })?;

        let database_url = std::env::var("DATABASE_URL").ok();
        if database_url.is_none() && dialect != Dialect::Sqlite {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            dialect,
            database_url,
            database_file: env_or("DATABASE_FILE", "./gflow.db"),
            server_port: parse_env("SERVER_PORT", "8080", "must be a valid port number")?,
            check_db_interval: parse_duration_env("CHECK_DB_INTERVAL", "3s")?,
            stuck_interval: parse_duration_env("STUCK_INTERVAL", "60s")?,
            stuck_after_minutes: parse_env(
                "STUCK_AFTER_MINUTES",
                "5",
                "must be a number of minutes",
            )?,
            batch_size: parse_env("BATCH_SIZE", "5", "must be a positive integer")?,
            executor_group: env_or("EXECUTOR_GROUP", "default"),
            executor_size: parse_env("EXECUTOR_SIZE", "5", "must be a positive integer")?,
            session_expiry_hours: parse_env(
                "SESSION_EXPIRY_HOURS",
                "1",
                "must be a number of hours",
            )?,
            executor_name: std::env::var("EXECUTOR_NAME").ok(),
        })
    }

    /// Connection URL for the configured backend. SQLite derives it from
    /// `DATABASE_FILE` with create-if-missing semantics.
    pub fn connection_url(&self) -> String {
        match (&self.database_url, self.dialect) {
            (Some(url), _) => url.clone(),
            (None, Dialect::Sqlite) => format!("sqlite:{}?mode=rwc", self.database_file),
            (None, _) => String::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(
    key: &'static str,
    default: &str,
    message: &'static str,
) -> Result<T, ConfigError> {
    env_or(key, default)
        .parse()
        .map_err(|_| ConfigError::Invalid(key, message))
}

fn parse_duration_env(key: &'static str, default: &str) -> Result<Duration, ConfigError> {
    parse_duration(&env_or(key, default))
        .ok_or(ConfigError::Invalid(key, "must be a duration like 3s or 250ms"))
}

/// Parse a suffixed duration: a sequence of `<integer><unit>` terms with
/// units `ms`, `s`, `m`, `h`, summed. `"1m30s"` is ninety seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let amount: u64 = digits.parse().ok()?;
        digits.clear();
        let unit = match c {
            'h' => Duration::from_secs(3600),
            's' => Duration::from_secs(1),
            'm' => {
                if chars.peek() == Some(&'s') {
                    chars.next();
                    Duration::from_millis(1)
                } else {
                    Duration::from_secs(60)
                }
            }
            _ => return None,
        };
        total += unit * amount as u32;
    }
    if !digits.is_empty() {
        // Trailing bare number has no unit.
        return None;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse() {
        assert_eq!(parse_duration("3s"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("60s"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
    }

    #[test]
    fn bad_durations_are_rejected() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("5"), None);
        assert_eq!(parse_duration("fast"), None);
        assert_eq!(parse_duration("3x"), None);
    }
}
