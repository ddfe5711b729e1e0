//! Core Data Models
//!
//! This module defines the data structures flowing through one coverage run,
//! from raw input rows to the classified report.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`BillingRow`] from the DBR export and [`Subscription`]
//!    entries from the RI snapshot
//! 2. **Derivation**: [`CoverageRecord`] - one keyed, signed record per kept row
//!    or active subscription
//! 3. **Aggregation**: [`CoverageGroup`] - records summed per
//!    `(platform, ri_model)` key
//! 4. **Report**: [`CoverageReport`] - groups split into on-demand, unused and
//!    covered sections
//!
//! Soft data problems found along the way are tallied in [`AnomalyLog`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One line item of the detailed billing report.
///
/// Only the columns the analysis reads are deserialized; the rest of the
/// export is ignored by the CSV reader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingRow {
    #[serde(rename = "LinkedAccountId", default)]
    pub linked_account_id: Option<String>,
    #[serde(rename = "ProductName")]
    pub product_name: String,
    #[serde(rename = "UsageType")]
    pub usage_type: String,
    #[serde(rename = "Operation")]
    pub operation: String,
    #[serde(rename = "AvailabilityZone", default)]
    pub availability_zone: Option<String>,
    #[serde(rename = "ReservedInstance")]
    pub reserved_instance: String,
    #[serde(rename = "ItemDescription")]
    pub item_description: String,
    #[serde(rename = "UsageStartDate")]
    pub usage_start_date: String,
    #[serde(rename = "UsageEndDate")]
    pub usage_end_date: String,
    #[serde(rename = "UsageQuantity", deserialize_with = "csv::invalid_option")]
    pub usage_quantity: Option<f64>,
    #[serde(rename = "ResourceId", default)]
    pub resource_id: Option<String>,
}

impl BillingRow {
    pub fn is_reserved(&self) -> bool {
        self.reserved_instance.trim().eq_ignore_ascii_case("Y")
    }
}

/// Top-level shape of an RI snapshot (`aws ec2 describe-reserved-instances`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    #[serde(rename = "ReservedInstances")]
    pub reserved_instances: Vec<Subscription>,
}

/// One RI subscription entry. Every field is optional at the decoding layer so
/// that a single incomplete entry is skipped rather than failing the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "ReservedInstancesId", default)]
    pub reserved_instances_id: Option<String>,
    #[serde(rename = "Start", default)]
    pub start: Option<String>,
    #[serde(rename = "End", default)]
    pub end: Option<String>,
    #[serde(rename = "InstanceType", default)]
    pub instance_type: Option<String>,
    #[serde(rename = "ProductDescription", default)]
    pub product_description: Option<String>,
    #[serde(rename = "InstanceCount", default)]
    pub instance_count: Option<u32>,
    /// State at export time. Never used for validity.
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    /// Set when the raw entry could not be decoded; the entry is then skipped.
    #[serde(skip)]
    pub decode_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Usage,
    Subscription,
}

/// A keyed, signed normalized value derived from a billing row or a subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRecord {
    pub source: RecordSource,
    /// `None` when the billing operation code is not in the platform table.
    pub platform: Option<String>,
    pub ri_model: String,
    pub normalized_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    OnDemand,
    UnusedReservation,
    Covered,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageGroup {
    pub platform: String,
    #[serde(rename = "riModel")]
    pub ri_model: String,
    #[serde(rename = "normalizedValue")]
    pub normalized_value: f64,
    #[serde(rename = "usageRecords")]
    pub usage_records: usize,
    #[serde(rename = "subscriptionRecords")]
    pub subscription_records: usize,
}

impl CoverageGroup {
    pub fn magnitude(&self) -> f64 {
        self.normalized_value.abs()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageReport {
    #[serde(rename = "onDemand")]
    pub on_demand: Vec<CoverageGroup>,
    #[serde(rename = "unusedReservations")]
    pub unused: Vec<CoverageGroup>,
    pub covered: Vec<CoverageGroup>,
    /// Records dropped from grouping because they had no platform.
    #[serde(rename = "unkeyedRecords")]
    pub unkeyed_records: usize,
}

impl CoverageReport {
    pub fn group_count(&self) -> usize {
        self.on_demand.len() + self.unused.len() + self.covered.len()
    }

    pub fn section(&self, coverage: Coverage) -> &[CoverageGroup] {
        match coverage {
            Coverage::OnDemand => &self.on_demand,
            Coverage::UnusedReservation => &self.unused,
            Coverage::Covered => &self.covered,
        }
    }
}

/// First and last `UsageStartDate` among EC2 running-instance rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObservedRange {
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

impl ObservedRange {
    pub fn contains(&self, hour: &NaiveDateTime) -> bool {
        self.first <= *hour && *hour <= self.last
    }

    pub fn include(range: Option<Self>, at: NaiveDateTime) -> Self {
        match range {
            Some(r) => Self {
                first: r.first.min(at),
                last: r.last.max(at),
            },
            None => Self { first: at, last: at },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    UnmappedOperation,
    UnknownSize,
    MissingQuantity,
    DescriptionFallback,
    MalformedUsageType,
    UnparseableTimestamp,
    MalformedSubscription,
    UnkeyedRecord,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UnmappedOperation => "unmapped operation",
            Self::UnknownSize => "unknown instance size",
            Self::MissingQuantity => "missing usage quantity",
            Self::DescriptionFallback => "reserved model fallback",
            Self::MalformedUsageType => "malformed usage type",
            Self::UnparseableTimestamp => "unparseable timestamp",
            Self::MalformedSubscription => "malformed subscription",
            Self::UnkeyedRecord => "record without platform",
        };
        f.write_str(label)
    }
}

/// Tally of soft data anomalies, keyed by kind and offending value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnomalyLog {
    counts: BTreeMap<AnomalyKind, BTreeMap<String, usize>>,
}

impl AnomalyLog {
    pub fn record(&mut self, kind: AnomalyKind, value: impl Into<String>) {
        *self
            .counts
            .entry(kind)
            .or_default()
            .entry(value.into())
            .or_insert(0) += 1;
    }

    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.counts
            .get(&kind)
            .map(|values| values.values().sum())
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().flat_map(|values| values.values()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn merge(&mut self, other: AnomalyLog) {
        for (kind, values) in other.counts {
            let entry = self.counts.entry(kind).or_default();
            for (value, count) in values {
                *entry.entry(value).or_insert(0) += count;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnomalyKind, &str, usize)> + '_ {
        self.counts.iter().flat_map(|(kind, values)| {
            values
                .iter()
                .map(move |(value, count)| (*kind, value.as_str(), *count))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_anomaly_log_counts_and_merges() {
        let mut log = AnomalyLog::default();
        log.record(AnomalyKind::UnmappedOperation, "RunInstances:0800");
        log.record(AnomalyKind::UnmappedOperation, "RunInstances:0800");
        log.record(AnomalyKind::UnknownSize, "metal");

        let mut other = AnomalyLog::default();
        other.record(AnomalyKind::UnknownSize, "metal");
        log.merge(other);

        assert_eq!(log.count(AnomalyKind::UnmappedOperation), 2);
        assert_eq!(log.count(AnomalyKind::UnknownSize), 2);
        assert_eq!(log.count(AnomalyKind::DescriptionFallback), 0);
        assert_eq!(log.total(), 4);
        assert_eq!(log.iter().count(), 2);
    }

    #[test]
    fn test_observed_range_include() {
        let h = |hour| {
            NaiveDate::from_ymd_opt(2018, 12, 24)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap()
        };
        let range = ObservedRange::include(None, h(5));
        let range = ObservedRange::include(Some(range), h(2));
        let range = ObservedRange::include(Some(range), h(9));

        assert_eq!(range.first, h(2));
        assert_eq!(range.last, h(9));
        assert!(range.contains(&h(2)));
        assert!(range.contains(&h(9)));
        assert!(!range.contains(&h(10)));
    }

    #[test]
    fn test_reserved_flag() {
        let mut row = BillingRow::default();
        row.reserved_instance = "Y".to_string();
        assert!(row.is_reserved());
        row.reserved_instance = "N".to_string();
        assert!(!row.is_reserved());
    }
}
