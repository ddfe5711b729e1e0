//! RI Coverage Library
//!
//! Computes, for one hour, how EC2 usage was covered by Reserved Instances.
//! It reconciles a detailed billing report (DBR) against an RI subscription
//! snapshot and reports, per platform and instance model, which demand ran
//! on-demand, which reservations sat unused and which were matched exactly.
//!
//! ## How the reconciliation works
//!
//! Both inputs are reduced to records keyed by `(platform, ri_model)` carrying
//! a signed normalized value:
//!
//! - RI-covered usage counts negative: normalization factor x quantity for
//!   Linux/UNIX, one per covered line item for licensed platforms
//! - Active subscriptions count positive, with the same weights
//! - Linux/UNIX reservations are size-flexible, so their model collapses to
//!   `ignored` and all Linux/UNIX capacity lands in one group
//!
//! Summing per key then yields negative (uncovered demand), positive (unused
//! reservation) or zero (exact coverage).
//!
//! ## Architecture Overview
//!
//! - [`billing`] - DBR loading (zip, gzip or plain CSV)
//! - [`usage`] - usage extraction: row filtering and dimension derivation
//! - [`reservation`] - RI snapshot loading and subscription extraction
//! - [`reconcile`] - aggregation and classification
//! - [`analyzer`] - end-to-end orchestration
//! - [`display`] - terminal and JSON output
//! - [`instance`] - instance type parsing
//! - [`tables`] - operation and normalization factor lookup tables
//! - [`timestamp_parser`] - target hour and time zone handling
//! - [`config`] - configuration with environment variable support
//! - [`logging`] - structured logging setup
//! - [`error`] - fatal error taxonomy and exit codes
//!
//! ## Main Entry Point
//!
//! ```rust,no_run
//! use ri_coverage::{AnalysisRequest, CoverageAnalyzer};
//! use ri_coverage::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let analyzer = CoverageAnalyzer::new(&Config::default());
//! let request = AnalysisRequest::new("dbr.csv.zip", "ri.json", "2018-12-24/08")?;
//! let outcome = analyzer.analyze(&request)?;
//! for group in &outcome.report.on_demand {
//!     println!("{} {} {}", group.platform, group.ri_model, group.normalized_value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod billing;
pub mod config;
pub mod display;
pub mod error;
pub mod instance;
pub mod logging;
pub mod models;
pub mod reconcile;
pub mod reservation;
pub mod tables;
pub mod timestamp_parser;
pub mod usage;

pub use analyzer::{AnalysisRequest, CoverageAnalyzer, CoverageOutcome};
pub use error::CoverageError;
pub use models::*;
