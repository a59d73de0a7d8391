// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQL dialect differences between the three supported backends.
//!
//! The stores assemble their statements at runtime, so everything that
//! varies per backend is concentrated here: bind-variable syntax, the
//! current-time literal, before-now predicates, and RETURNING support.
//!
//! Timestamps are persisted as fixed-width UTC text. The width makes
//! lexicographic order equal chronological order (which the predicates rely
//! on) and the format round-trips exactly, which the `modified`
//! compare-and-set token requires. SQLite stores millisecond precision, the
//! server backends microseconds.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};

use ferroflow_core::Clock;

use crate::error::StoreError;

const FORMAT_MILLIS: &str = "%Y-%m-%d %H:%M:%S%.3f";
const FORMAT_MICROS: &str = "%Y-%m-%d %H:%M:%S%.6f";
const FORMAT_SECONDS: &str = "%Y-%m-%d %H:%M:%S";

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl FromStr for Dialect {
    type Err = StoreError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.to_ascii_uppercase().as_str() {
            "POSTGRES" => Ok(Dialect::Postgres),
            "MYSQL" => Ok(Dialect::MySql),
            "SQLITE" => Ok(Dialect::Sqlite),
            other => Err(StoreError::UnknownDialect(other.to_string())),
        }
    }
}

impl Dialect {
    /// Positional bind variable for the 1-based index `i`.
    ///
    /// PostgreSQL wants indexed `$n`; MySQL and SQLite use anonymous `?`.
    pub fn placeholder(self, i: usize) -> String {
        match self {
            Dialect::Postgres => format!("${i}"),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Quoted UTC timestamp literal for the injected clock's current time,
    /// at the backend's precision.
    pub fn now_expr(self, clock: &dyn Clock) -> String {
        format!("'{}'", self.format_datetime(clock.now()))
    }

    /// Predicate that is true when `column` is strictly before the injected
    /// clock's current time.
    ///
    /// SQLite compares on a seconds-precision prefix so that rows written
    /// with any sub-second precision coerce cleanly; the server backends
    /// compare the full literal.
    pub fn before_now(self, column: &str, clock: &dyn Clock) -> String {
        match self {
            Dialect::Sqlite => format!(
                "substr({column}, 1, 19) < '{}'",
                clock.now().format(FORMAT_SECONDS)
            ),
            Dialect::Postgres | Dialect::MySql => {
                format!("{column} < '{}'", self.format_datetime(clock.now()))
            }
        }
    }

    /// Whether the backend can return the generated primary key from the
    /// insert statement itself.
    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Serialize a timestamp the way this backend stores it.
    pub fn format_datetime(self, at: DateTime<Utc>) -> String {
        match self {
            Dialect::Sqlite => at.format(FORMAT_MILLIS).to_string(),
            Dialect::Postgres | Dialect::MySql => at.format(FORMAT_MICROS).to_string(),
        }
    }

    /// Parse a timestamp column back. Accepts any sub-second precision plus
    /// RFC 3339, so values written by other tooling still read.
    pub fn parse_datetime(self, column: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
            return Ok(parsed.and_utc());
        }
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        Err(StoreError::Timestamp {
            column,
            value: raw.to_string(),
        })
    }
}
