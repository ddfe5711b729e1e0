//! RI subscription extraction
//!
//! Turns the entries of an RI snapshot that are valid at the target hour into
//! positive [`CoverageRecord`]s. Validity is decided from the `Start`/`End`
//! window alone: the snapshot's `State` is the state at export time and says
//! nothing about an hour in the past.

use crate::error::CoverageError;
use crate::instance::InstanceType;
use crate::models::{AnomalyKind, AnomalyLog, CoverageRecord, RecordSource, Subscription, SubscriptionSnapshot};
use crate::tables::{is_linux_unix, LookupTables, IGNORED_MODEL};
use crate::timestamp_parser::TimestampParser;
use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionExtraction {
    pub records: Vec<CoverageRecord>,
    /// Entries whose window does not contain the target hour
    pub inactive: usize,
    pub anomalies: AnomalyLog,
}

/// Read and decode an RI snapshot file.
pub fn load_snapshot(path: &Path) -> Result<SubscriptionSnapshot, CoverageError> {
    let content = fs::read_to_string(path)
        .map_err(|e| CoverageError::snapshot(path, format!("cannot read: {}", e)))?;
    let snapshot = parse_snapshot(&content).map_err(|message| CoverageError::snapshot(path, message))?;
    info!(
        path = %path.display(),
        entries = snapshot.reserved_instances.len(),
        "Loaded RI snapshot"
    );
    Ok(snapshot)
}

fn parse_snapshot(content: &str) -> Result<SubscriptionSnapshot, String> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| format!("invalid JSON: {}", e))?;
    let Some(entries) = value.get("ReservedInstances") else {
        return Err("missing key ReservedInstances".to_string());
    };
    let Some(entries) = entries.as_array() else {
        return Err("ReservedInstances is not a list".to_string());
    };

    // Decode entry by entry so one odd entry does not reject the file
    let reserved_instances = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value::<Subscription>(entry.clone()).unwrap_or_else(|e| {
                warn!(index, error = %e, "RI entry has unexpected field types");
                Subscription {
                    reserved_instances_id: entry
                        .get("ReservedInstancesId")
                        .and_then(|id| id.as_str())
                        .map(str::to_string),
                    decode_error: Some(e.to_string()),
                    ..Subscription::default()
                }
            })
        })
        .collect();

    Ok(SubscriptionSnapshot { reserved_instances })
}

/// Extract subscription records valid at `hour` (billing frame).
pub fn extract_subscription_records(
    snapshot: &SubscriptionSnapshot,
    hour: NaiveDateTime,
    tables: &LookupTables,
) -> SubscriptionExtraction {
    let mut anomalies = AnomalyLog::default();
    let mut records = Vec::new();
    let mut inactive = 0;

    for (index, subscription) in snapshot.reserved_instances.iter().enumerate() {
        match derive_subscription_record(subscription, hour, tables, &mut anomalies) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => inactive += 1,
            Err(reason) => {
                let id = subscription
                    .reserved_instances_id
                    .clone()
                    .unwrap_or_else(|| format!("#{}", index));
                warn!(subscription = %id, reason = %reason, "Skipping malformed RI subscription");
                anomalies.record(AnomalyKind::MalformedSubscription, format!("{}: {}", id, reason));
            }
        }
    }

    debug!(
        hour = %TimestampParser::format_hour(&hour),
        active = records.len(),
        inactive,
        "Derived subscription records"
    );

    SubscriptionExtraction {
        records,
        inactive,
        anomalies,
    }
}

/// `Ok(None)` means the subscription is well formed but not active at `hour`.
fn derive_subscription_record(
    subscription: &Subscription,
    hour: NaiveDateTime,
    tables: &LookupTables,
    anomalies: &mut AnomalyLog,
) -> Result<Option<CoverageRecord>, String> {
    if let Some(error) = &subscription.decode_error {
        return Err(error.clone());
    }
    let start = subscription.start.as_deref().ok_or("missing Start")?;
    let end = subscription.end.as_deref().ok_or("missing End")?;
    let instance_type = subscription
        .instance_type
        .as_deref()
        .ok_or("missing InstanceType")?;
    let platform = subscription
        .product_description
        .as_deref()
        .ok_or("missing ProductDescription")?;
    let count = subscription.instance_count.ok_or("missing InstanceCount")?;

    let start = TimestampParser::parse_subscription(start).map_err(|e| e.to_string())?;
    let end = TimestampParser::parse_subscription(end).map_err(|e| e.to_string())?;
    let model = InstanceType::parse(instance_type)
        .ok_or_else(|| format!("unparseable InstanceType '{}'", instance_type))?;

    if !(start <= hour && hour <= end) {
        return Ok(None);
    }

    let linux = is_linux_unix(platform);
    let factor = if linux {
        tables.normalization_factor(&model.size).unwrap_or_else(|| {
            warn!(size = %model.size, model = %model, "Unknown instance size, factor 0 used");
            anomalies.record(AnomalyKind::UnknownSize, model.size.clone());
            0.0
        })
    } else {
        1.0
    };

    Ok(Some(CoverageRecord {
        source: RecordSource::Subscription,
        platform: Some(platform.to_string()),
        ri_model: if linux {
            IGNORED_MODEL.to_string()
        } else {
            model.to_string()
        },
        normalized_value: factor * f64::from(count),
    }))
}
