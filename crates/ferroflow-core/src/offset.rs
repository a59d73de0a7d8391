// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Human-friendly scheduling offsets.
//!
//! Grammar: a sequence of `<number> <unit>` terms, summed. Units are
//! `hour[s]`, `minute[s]`, `second[s]` and `ms`/`millisecond[s]`. A bare
//! integer is read as minutes. Negative terms are permitted.

use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(-?\d+(?:\.\d*)?)\s*(hours?|minutes?|seconds?|ms|milliseconds?)")
        .expect("offset term regex")
});

/// Failure to interpret an offset string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OffsetError {
    #[error("invalid offset format: {0:?}")]
    Invalid(String),
}

/// Parse an offset like `"2 hours 30 minutes"` into a duration.
///
/// An empty string is zero; a bare integer such as `"5"` means five minutes.
pub fn parse_offset(offset: &str) -> Result<Duration, OffsetError> {
    let offset = offset.trim();
    if offset.is_empty() {
        return Ok(Duration::zero());
    }

    let mut total = Duration::zero();
    let mut matched = false;
    for capture in TERM.captures_iter(offset) {
        matched = true;
        let value: f64 = capture[1]
            .parse()
            .map_err(|_| OffsetError::Invalid(offset.to_string()))?;
        let millis = match capture[2].to_ascii_lowercase().as_str() {
            "hour" | "hours" => value * 3_600_000.0,
            "minute" | "minutes" => value * 60_000.0,
            "second" | "seconds" => value * 1_000.0,
            _ => value,
        };
        total += Duration::milliseconds(millis as i64);
    }
    if matched {
        return Ok(total);
    }

    // No unit terms at all; a leading integer is read as minutes.
    match offset.parse::<i64>() {
        Ok(minutes) => Ok(Duration::minutes(minutes)),
        Err(_) => Err(OffsetError::Invalid(offset.to_string())),
    }
}
