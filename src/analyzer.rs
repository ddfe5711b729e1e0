//! Coverage Analysis Engine
//!
//! [`CoverageAnalyzer`] runs one batch computation end to end:
//!
//! 1. **Load**: stream the billing export, keeping running-instance rows only
//! 2. **Extract usage**: validate the target hour and derive usage records
//! 3. **Load snapshot**: decode the RI snapshot
//! 4. **Extract subscriptions**: derive records for subscriptions active at the hour
//! 5. **Reconcile**: sum per `(platform, ri_model)` and classify
//!
//! The billing side (1-2) and the snapshot side (3-4) share nothing. With the
//! `parallel` feature they run on rayon's pool via `rayon::join`.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ri_coverage::{AnalysisRequest, CoverageAnalyzer};
//! use ri_coverage::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let analyzer = CoverageAnalyzer::new(&Config::default());
//! let request = AnalysisRequest::new("dbr.csv.zip", "ri.json", "2018-12-24/08")?;
//! let outcome = analyzer.analyze(&request)?;
//! println!("{} groups", outcome.report.group_count());
//! # Ok(())
//! # }
//! ```

use crate::billing::{load_billing_rows, LoadStats};
use crate::config::Config;
use crate::error::CoverageError;
use crate::models::{AnomalyLog, CoverageReport, ObservedRange};
use crate::reconcile::reconcile;
use crate::reservation::{extract_subscription_records, load_snapshot, SubscriptionExtraction};
use crate::tables::LookupTables;
use crate::timestamp_parser::TimestampParser;
use crate::usage::{extract_usage_records, RowFilter, UsageExtraction};
use chrono::NaiveDateTime;
use std::path::PathBuf;
use tracing::{info, info_span};

/// Inputs of one run
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub billing_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub hour: NaiveDateTime,
}

impl AnalysisRequest {
    pub fn new(
        billing_path: impl Into<PathBuf>,
        snapshot_path: impl Into<PathBuf>,
        hour: &str,
    ) -> Result<Self, CoverageError> {
        Ok(Self {
            billing_path: billing_path.into(),
            snapshot_path: snapshot_path.into(),
            hour: TimestampParser::parse_target_hour(hour)?,
        })
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct CoverageOutcome {
    pub hour: NaiveDateTime,
    pub observed_range: ObservedRange,
    pub report: CoverageReport,
    pub anomalies: AnomalyLog,
    pub billing_stats: LoadStats,
    pub usage_records: usize,
    pub subscription_records: usize,
    pub inactive_subscriptions: usize,
}

pub struct CoverageAnalyzer {
    filter: RowFilter,
    tables: LookupTables,
}

impl Default for CoverageAnalyzer {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl CoverageAnalyzer {
    pub fn new(config: &Config) -> Self {
        Self {
            filter: RowFilter::from_config(&config.billing),
            tables: config.lookup_tables(),
        }
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<CoverageOutcome, CoverageError> {
        let span = info_span!("analyze", hour = %TimestampParser::format_hour(&request.hour));
        let _enter = span.enter();

        let (usage, subscriptions) = self.extract_both(request);
        let (usage, billing_stats) = usage?;
        let subscriptions = subscriptions?;

        let mut anomalies = usage.anomalies;
        anomalies.merge(subscriptions.anomalies);

        let report = reconcile(&usage.records, &subscriptions.records, &mut anomalies);

        info!(
            usage_records = usage.records.len(),
            subscription_records = subscriptions.records.len(),
            groups = report.group_count(),
            anomalies = anomalies.total(),
            "Coverage analysis complete"
        );

        Ok(CoverageOutcome {
            hour: request.hour,
            observed_range: usage.observed_range,
            usage_records: usage.records.len(),
            subscription_records: subscriptions.records.len(),
            inactive_subscriptions: subscriptions.inactive,
            report,
            anomalies,
            billing_stats,
        })
    }

    #[cfg(feature = "parallel")]
    fn extract_both(
        &self,
        request: &AnalysisRequest,
    ) -> (
        Result<(UsageExtraction, LoadStats), CoverageError>,
        Result<SubscriptionExtraction, CoverageError>,
    ) {
        rayon::join(|| self.usage_side(request), || self.subscription_side(request))
    }

    #[cfg(not(feature = "parallel"))]
    fn extract_both(
        &self,
        request: &AnalysisRequest,
    ) -> (
        Result<(UsageExtraction, LoadStats), CoverageError>,
        Result<SubscriptionExtraction, CoverageError>,
    ) {
        (self.usage_side(request), self.subscription_side(request))
    }

    pub fn usage_side(
        &self,
        request: &AnalysisRequest,
    ) -> Result<(UsageExtraction, LoadStats), CoverageError> {
        let (rows, stats) = load_billing_rows(&request.billing_path, |row| {
            self.filter.is_running_instance(row)
        })?;
        let extraction = extract_usage_records(&rows, request.hour, &self.filter, &self.tables)?;
        Ok((extraction, stats))
    }

    pub fn subscription_side(
        &self,
        request: &AnalysisRequest,
    ) -> Result<SubscriptionExtraction, CoverageError> {
        let snapshot = load_snapshot(&request.snapshot_path)?;
        Ok(extract_subscription_records(&snapshot, request.hour, &self.tables))
    }
}
