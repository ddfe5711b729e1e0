//! Timestamp handling for the two input reference frames
//!
//! Billing rows and the target hour are expressed in the billing frame, a fixed
//! UTC+8 offset with no zone marker. RI snapshot timestamps are UTC. Everything
//! is compared as a naive datetime in the billing frame.

use crate::error::CoverageError;
use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Offset of the billing frame from UTC, in hours.
pub const BILLING_UTC_OFFSET_HOURS: i32 = 8;

const BILLING_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S",
];

/// Handles parsing timestamps from the billing export, the RI snapshot and the CLI
pub struct TimestampParser;

impl TimestampParser {
    /// Parse a target hour of the form `YYYY-MM-DD/HH`.
    pub fn parse_target_hour(input: &str) -> std::result::Result<NaiveDateTime, CoverageError> {
        let invalid = |reason: &str| CoverageError::InvalidTargetHour {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (date_part, hour_part) = input
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("missing '/' between date and hour"))?;

        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|e| invalid(&format!("bad date: {}", e)))?;

        if hour_part.is_empty() || hour_part.len() > 2 {
            return Err(invalid("hour must have one or two digits"));
        }
        let hour: u32 = hour_part
            .parse()
            .map_err(|_| invalid("hour is not a number"))?;

        date.and_hms_opt(hour, 0, 0)
            .ok_or_else(|| invalid("hour must be between 00 and 23"))
    }

    /// Parse a billing row timestamp, already in the billing frame.
    pub fn parse_billing(timestamp_str: &str) -> Result<NaiveDateTime> {
        let trimmed = timestamp_str.trim();
        for format in BILLING_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(naive);
            }
        }
        anyhow::bail!("Failed to parse billing timestamp: {}", timestamp_str)
    }

    /// Parse a UTC snapshot timestamp such as `2018-12-24T00:00:00.000Z`
    /// and shift it into the billing frame.
    pub fn parse_subscription(timestamp_str: &str) -> Result<NaiveDateTime> {
        let utc = Self::parse_utc(timestamp_str)?;
        Ok(Self::to_billing_frame(utc))
    }

    fn parse_utc(timestamp_str: &str) -> Result<DateTime<Utc>> {
        // Handle both Z suffix and timezone info
        let timestamp = if timestamp_str.ends_with('Z') {
            timestamp_str.replace('Z', "+00:00")
        } else {
            timestamp_str.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&timestamp) {
            return Ok(dt.with_timezone(&Utc));
        }

        // Naive snapshot timestamps are assumed to be UTC
        if let Ok(naive) = NaiveDateTime::parse_from_str(&timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }

        anyhow::bail!("Failed to parse timestamp: {}", timestamp_str)
    }

    pub fn to_billing_frame(utc: DateTime<Utc>) -> NaiveDateTime {
        match FixedOffset::east_opt(BILLING_UTC_OFFSET_HOURS * 3600) {
            Some(offset) => utc.with_timezone(&offset).naive_local(),
            None => utc.naive_utc() + Duration::hours(i64::from(BILLING_UTC_OFFSET_HOURS)),
        }
    }

    /// Display form matching the CLI input, e.g. `2018-12-24/08`.
    pub fn format_hour(hour: &NaiveDateTime) -> String {
        hour.format("%Y-%m-%d/%H").to_string()
    }
}
