//! Output Formatting and Display Management
//!
//! Renders a [`CoverageOutcome`] either as a colored terminal report or as JSON.
//!
//! ## Terminal Report
//!
//! - A validation line placing the target hour in the billing data range
//! - **Ondemand**: groups with uncovered demand (negative sum)
//! - **Unused RI**: groups with idle reservations (positive sum)
//! - **Used RI**: groups covered exactly (zero sum)
//! - A summary of soft data anomalies, when there are any
//!
//! ## JSON Output
//!
//! ```json
//! {
//!   "hour": "2018-12-24/08",
//!   "range": { "first": "2018-12-01T00:00:00", "last": "2018-12-31T23:00:00" },
//!   "onDemand": [],
//!   "unusedReservations": [],
//!   "covered": [
//!     { "platform": "Linux/UNIX", "riModel": "ignored", "normalizedValue": 0.0,
//!       "usageRecords": 1, "subscriptionRecords": 1 }
//!   ],
//!   "unkeyedRecords": 0,
//!   "anomalies": []
//! }
//! ```

use crate::analyzer::CoverageOutcome;
use crate::config::OutputConfig;
use crate::error::CoverageError;
use crate::models::{Coverage, CoverageGroup, ObservedRange};
use crate::timestamp_parser::TimestampParser;
use chrono::NaiveDateTime;
use colored::Colorize;
use serde_json::json;

const SECTION_RULE: usize = 17;
const PLATFORM_WIDTH: usize = 34;
const MODEL_WIDTH: usize = 14;

pub struct ReportDisplay {
    json_pretty: bool,
    precision: usize,
}

impl Default for ReportDisplay {
    fn default() -> Self {
        Self::new(&OutputConfig::default())
    }
}

impl ReportDisplay {
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            json_pretty: output.json_pretty,
            precision: output.value_precision,
        }
    }

    /// Line confirming the target hour lies inside the billing data range.
    pub fn range_confirmation(hour: &NaiveDateTime, range: &ObservedRange) -> String {
        format!(
            "[v] Date hour you provided ({}) in date range of DBR data ({} - {})",
            TimestampParser::format_hour(hour),
            range.first,
            range.last
        )
    }

    /// Line reporting a target hour outside the billing data range.
    pub fn range_failure(hour: &NaiveDateTime, first: &NaiveDateTime, last: &NaiveDateTime) -> String {
        format!(
            "[Failed] Date hour you provided ({}) is out of date range of DBR data ({} - {})",
            TimestampParser::format_hour(hour),
            first,
            last
        )
    }

    /// Validation line for an error that left the target hour unplaced.
    pub fn range_failure_for(error: &CoverageError) -> Option<String> {
        match error {
            CoverageError::HourOutOfRange { hour, first, last } => Some(Self::range_failure(hour, first, last)),
            CoverageError::NoComputeUsage { hour } => Some(format!(
                "[Failed] Date hour you provided ({}) cannot be checked, DBR data has no EC2 running-instance rows",
                TimestampParser::format_hour(hour)
            )),
            _ => None,
        }
    }

    pub fn display(&self, outcome: &CoverageOutcome, json_output: bool) {
        if json_output {
            match self.render_json(outcome) {
                Ok(json_str) => println!("{}", json_str),
                Err(e) => eprintln!("Error serializing coverage report to JSON: {}", e),
            }
            return;
        }

        println!(
            "{}",
            Self::range_confirmation(&outcome.hour, &outcome.observed_range).bright_green()
        );
        println!(
            "{} {} usage records • {} active subscriptions ({} inactive)",
            "📊".bright_yellow(),
            outcome.usage_records.to_string().bright_white().bold(),
            outcome.subscription_records.to_string().bright_white().bold(),
            outcome.inactive_subscriptions
        );

        for coverage in [Coverage::OnDemand, Coverage::UnusedReservation, Coverage::Covered] {
            let groups = outcome.report.section(coverage);
            println!("{}", Self::section_header(coverage).bright_cyan().bold());
            if groups.is_empty() {
                println!("   {}", "(none)".dimmed());
                continue;
            }
            println!(
                "   {:<pw$} {:<mw$} {:>12}",
                "EC2Platform",
                "EC2RIModel",
                "EC2NP",
                pw = PLATFORM_WIDTH,
                mw = MODEL_WIDTH
            );
            for group in groups {
                println!("   {}", self.format_group(group, coverage));
            }
        }

        if outcome.report.unkeyed_records > 0 {
            println!(
                "\n{} {} usage records had no platform and were left out",
                "⚠️".bright_yellow(),
                outcome.report.unkeyed_records.to_string().bright_white().bold()
            );
        }

        if !outcome.anomalies.is_empty() {
            println!(
                "\n{} Data anomalies ({} total):",
                "⚠️".bright_yellow(),
                outcome.anomalies.total().to_string().bright_white().bold()
            );
            for (kind, value, count) in outcome.anomalies.iter() {
                println!("   {}: {} ({}x)", kind.to_string().bright_yellow(), value, count);
            }
        }
    }

    pub fn section_header(coverage: Coverage) -> String {
        let title = match coverage {
            Coverage::OnDemand => "Ondemand",
            Coverage::UnusedReservation => "Unused RI",
            Coverage::Covered => "Used RI",
        };
        let rule = "=".repeat(SECTION_RULE);
        format!("{} {} {}", rule, title, rule)
    }

    pub fn format_group(&self, group: &CoverageGroup, coverage: Coverage) -> String {
        let value = format!("{:.*}", self.precision, group.normalized_value);
        let value = match coverage {
            Coverage::OnDemand => value.bright_red(),
            Coverage::UnusedReservation => value.bright_yellow(),
            Coverage::Covered => value.bright_green(),
        };
        format!(
            "{:<pw$} {:<mw$} {:>12}",
            group.platform,
            group.ri_model,
            value,
            pw = PLATFORM_WIDTH,
            mw = MODEL_WIDTH
        )
    }

    pub fn render_json(&self, outcome: &CoverageOutcome) -> serde_json::Result<String> {
        let anomalies: Vec<_> = outcome
            .anomalies
            .iter()
            .map(|(kind, value, count)| json!({"kind": kind, "value": value, "count": count}))
            .collect();

        let output = json!({
            "hour": TimestampParser::format_hour(&outcome.hour),
            "range": outcome.observed_range,
            "onDemand": outcome.report.on_demand,
            "unusedReservations": outcome.report.unused,
            "covered": outcome.report.covered,
            "unkeyedRecords": outcome.report.unkeyed_records,
            "anomalies": anomalies,
        });

        if self.json_pretty {
            serde_json::to_string_pretty(&output)
        } else {
            serde_json::to_string(&output)
        }
    }
}
