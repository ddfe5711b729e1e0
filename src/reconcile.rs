//! Reconciliation of usage against reservations
//!
//! Usage records are negative, subscription records positive. Summed per
//! `(platform, ri_model)` the sign alone tells the story: below zero is demand
//! no reservation covers, above zero is reservation nobody used, zero is an
//! exact match.

use crate::models::{AnomalyKind, AnomalyLog, Coverage, CoverageGroup, CoverageRecord, CoverageReport, RecordSource};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Sums this close to zero count as exact coverage.
pub const COVERAGE_EPSILON: f64 = 1e-6;

pub fn classify(sum: f64) -> Coverage {
    if sum.abs() <= COVERAGE_EPSILON {
        Coverage::Covered
    } else if sum < 0.0 {
        Coverage::OnDemand
    } else {
        Coverage::UnusedReservation
    }
}

#[derive(Default)]
struct GroupTotals {
    sum: f64,
    usage_records: usize,
    subscription_records: usize,
}

/// Union both record sets, sum per key and split the groups by coverage.
///
/// Records without a platform cannot be keyed; they are left out of the
/// groups, counted in [`CoverageReport::unkeyed_records`] and noted in
/// `anomalies`.
pub fn reconcile(
    usage: &[CoverageRecord],
    subscriptions: &[CoverageRecord],
    anomalies: &mut AnomalyLog,
) -> CoverageReport {
    let mut totals: BTreeMap<(String, String), GroupTotals> = BTreeMap::new();
    let mut report = CoverageReport::default();

    for record in usage.iter().chain(subscriptions) {
        let Some(platform) = &record.platform else {
            report.unkeyed_records += 1;
            anomalies.record(AnomalyKind::UnkeyedRecord, record.ri_model.clone());
            continue;
        };

        let group = totals
            .entry((platform.clone(), record.ri_model.clone()))
            .or_default();
        group.sum += record.normalized_value;
        match record.source {
            RecordSource::Usage => group.usage_records += 1,
            RecordSource::Subscription => group.subscription_records += 1,
        }
    }

    if report.unkeyed_records > 0 {
        warn!(
            records = report.unkeyed_records,
            "Records without platform left out of reconciliation"
        );
    }

    for ((platform, ri_model), group) in totals {
        let coverage = classify(group.sum);
        let entry = CoverageGroup {
            platform,
            ri_model,
            normalized_value: if coverage == Coverage::Covered { 0.0 } else { group.sum },
            usage_records: group.usage_records,
            subscription_records: group.subscription_records,
        };
        match coverage {
            Coverage::OnDemand => report.on_demand.push(entry),
            Coverage::UnusedReservation => report.unused.push(entry),
            Coverage::Covered => report.covered.push(entry),
        }
    }

    for section in [&mut report.on_demand, &mut report.unused, &mut report.covered] {
        section.sort_by(compare_groups);
    }

    debug!(
        on_demand = report.on_demand.len(),
        unused = report.unused.len(),
        covered = report.covered.len(),
        "Reconciled coverage groups"
    );

    report
}

fn compare_groups(a: &CoverageGroup, b: &CoverageGroup) -> Ordering {
    a.platform
        .cmp(&b.platform)
        .then_with(|| a.ri_model.cmp(&b.ri_model))
        .then_with(|| a.normalized_value.total_cmp(&b.normalized_value))
}
