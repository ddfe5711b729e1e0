//! Usage extraction from billing rows
//!
//! Turns the DBR line items of one target hour into signed [`CoverageRecord`]s.
//!
//! ## Row selection
//!
//! A row is kept when it is EC2 running-instance usage (`BoxUsage` on-demand or
//! `HeavyUsage` reserved) that starts at the target hour and ends exactly one
//! hour later. Historical exports contain monthly summary rows starting at the
//! first hour of the month; the end-time check keeps them out.
//!
//! ## Derived dimensions
//!
//! - `platform` comes from the operation code via [`LookupTables`]
//! - `ri_model` is the model the reservation was actually applied with, taken
//!   from the item description. An instance can be covered by a different size
//!   than it runs as, e.g. `0.75 x c4.xlarge + 0.25 x c4.4xlarge` for one hour
//! - `normalized_value` is negative for RI-covered usage and zero otherwise
//!
//! Rows are derived independently. When one instance shows up as several line
//! items in the same hour (partial or stacked coverage), the per-group sum in
//! [`crate::reconcile`] brings them back together.

use crate::config::BillingConfig;
use crate::error::CoverageError;
use crate::instance::{reserved_model_from_description, InstanceType};
use crate::models::{AnomalyKind, AnomalyLog, BillingRow, CoverageRecord, ObservedRange, RecordSource};
use crate::tables::{is_linux_unix, LookupTables, IGNORED_MODEL};
use crate::timestamp_parser::TimestampParser;
use chrono::{Duration, NaiveDateTime};
use tracing::{debug, warn};

/// Decides which billing rows describe running EC2 instances
#[derive(Debug, Clone)]
pub struct RowFilter {
    product_name: String,
    usage_type_markers: Vec<String>,
}

impl Default for RowFilter {
    fn default() -> Self {
        Self::from_config(&BillingConfig::default())
    }
}

impl RowFilter {
    pub fn from_config(config: &BillingConfig) -> Self {
        Self {
            product_name: config.product_name.clone(),
            usage_type_markers: config.usage_type_markers.clone(),
        }
    }

    /// True for EC2 running-instance usage, regardless of time.
    pub fn is_running_instance(&self, row: &BillingRow) -> bool {
        row.product_name.trim() == self.product_name && self.is_running_usage_type(&row.usage_type)
    }

    /// `BoxUsage:m4.large`, `CNN1-HeavyUsage:c4.xlarge` and bare `BoxUsage` all
    /// qualify; `CNN1-EBS:VolumeUsage` and `SpotUsage:m4.large` do not.
    fn is_running_usage_type(&self, usage_type: &str) -> bool {
        let prefix = usage_type
            .split_once(':')
            .map(|(prefix, _)| prefix)
            .unwrap_or(usage_type)
            .trim();
        self.usage_type_markers.iter().any(|marker| {
            prefix == marker
                || prefix
                    .strip_suffix(marker.as_str())
                    .is_some_and(|region| region.ends_with('-'))
        })
    }
}

/// Records derived for one hour, plus what was learned along the way
#[derive(Debug, Clone, PartialEq)]
pub struct UsageExtraction {
    pub records: Vec<CoverageRecord>,
    pub observed_range: ObservedRange,
    pub anomalies: AnomalyLog,
}

/// Extract usage records for `hour` from billing rows.
///
/// Fails with [`CoverageError::HourOutOfRange`] when `hour` lies outside the
/// observed span of running-instance rows, and with
/// [`CoverageError::NoComputeUsage`] when there are no such rows at all. A
/// valid hour with no matching rows is a successful, empty extraction.
pub fn extract_usage_records(
    rows: &[BillingRow],
    hour: NaiveDateTime,
    filter: &RowFilter,
    tables: &LookupTables,
) -> Result<UsageExtraction, CoverageError> {
    let mut anomalies = AnomalyLog::default();
    let mut range: Option<ObservedRange> = None;
    let mut in_hour = Vec::new();
    let hour_end = hour + Duration::hours(1);

    for row in rows.iter().filter(|row| filter.is_running_instance(row)) {
        let start = match TimestampParser::parse_billing(&row.usage_start_date) {
            Ok(start) => start,
            Err(_) => {
                warn!(
                    usage_type = %row.usage_type,
                    value = %row.usage_start_date,
                    "Skipping row with unparseable UsageStartDate"
                );
                anomalies.record(AnomalyKind::UnparseableTimestamp, row.usage_start_date.clone());
                continue;
            }
        };
        range = Some(ObservedRange::include(range, start));

        if start != hour {
            continue;
        }
        match TimestampParser::parse_billing(&row.usage_end_date) {
            Ok(end) if end == hour_end => in_hour.push(row),
            Ok(end) => debug!(
                usage_type = %row.usage_type,
                %end,
                "Skipping row that does not span exactly one hour"
            ),
            Err(_) => {
                warn!(
                    usage_type = %row.usage_type,
                    value = %row.usage_end_date,
                    "Skipping row with unparseable UsageEndDate"
                );
                anomalies.record(AnomalyKind::UnparseableTimestamp, row.usage_end_date.clone());
            }
        }
    }

    let observed_range = range.ok_or(CoverageError::NoComputeUsage { hour })?;
    if !observed_range.contains(&hour) {
        return Err(CoverageError::HourOutOfRange {
            hour,
            first: observed_range.first,
            last: observed_range.last,
        });
    }

    let records = in_hour
        .into_iter()
        .filter_map(|row| derive_usage_record(row, tables, &mut anomalies))
        .collect::<Vec<_>>();

    debug!(
        hour = %TimestampParser::format_hour(&hour),
        records = records.len(),
        "Derived usage records"
    );

    Ok(UsageExtraction {
        records,
        observed_range,
        anomalies,
    })
}

/// Derive the coverage record of a single billing row.
///
/// Returns `None` only when the usage type carries no `family.size`; the row
/// cannot be keyed and is counted as an anomaly.
pub fn derive_usage_record(
    row: &BillingRow,
    tables: &LookupTables,
    anomalies: &mut AnomalyLog,
) -> Option<CoverageRecord> {
    let Some(usage_model) = InstanceType::from_usage_type(&row.usage_type) else {
        warn!(usage_type = %row.usage_type, "Usage type carries no instance model, row skipped");
        anomalies.record(AnomalyKind::MalformedUsageType, row.usage_type.clone());
        return None;
    };

    let platform = tables.platform_for_operation(&row.operation).map(str::to_string);
    if platform.is_none() {
        warn!(operation = %row.operation, "Operation not in platform table");
        anomalies.record(AnomalyKind::UnmappedOperation, row.operation.clone());
    }
    let linux = platform.as_deref().is_some_and(is_linux_unix);

    let mut ri_model = usage_model.clone();
    let normalized = if row.is_reserved() {
        match reserved_model_from_description(&row.item_description) {
            Some(reserved) => ri_model = reserved,
            None => {
                warn!(
                    description = %row.item_description,
                    fallback = %usage_model,
                    "No reserved model in item description, using usage type model"
                );
                anomalies.record(AnomalyKind::DescriptionFallback, row.item_description.clone());
            }
        }

        if linux {
            let factor = match tables.normalization_factor(&ri_model.size) {
                Some(factor) => factor,
                None => {
                    warn!(size = %ri_model.size, model = %ri_model, "Unknown instance size, factor 0 used");
                    anomalies.record(AnomalyKind::UnknownSize, ri_model.size.clone());
                    0.0
                }
            };
            let quantity = match row.usage_quantity {
                Some(quantity) => quantity,
                None => {
                    warn!(usage_type = %row.usage_type, "Reserved row has no usage quantity, 0 used");
                    anomalies.record(AnomalyKind::MissingQuantity, row.usage_type.clone());
                    0.0
                }
            };
            factor * quantity
        } else {
            // Licensed platforms reserve per instance: one unit per covered row
            1.0
        }
    } else {
        0.0
    };

    Some(CoverageRecord {
        source: RecordSource::Usage,
        ri_model: if linux {
            IGNORED_MODEL.to_string()
        } else {
            ri_model.to_string()
        },
        platform,
        normalized_value: if normalized == 0.0 { 0.0 } else { -normalized },
    })
}
