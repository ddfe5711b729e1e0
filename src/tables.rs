//! Static lookup tables
//!
//! Operation codes map to platform names and instance sizes map to
//! normalization factors. Platform names must match the `ProductDescription`
//! values used in RI subscriptions, otherwise usage and reservations land in
//! different groups.
//!
//! Normalization factors follow the EC2 sizing table:
//! <https://docs.aws.amazon.com/AWSEC2/latest/UserGuide/apply_ri.html>

use std::collections::{BTreeMap, HashMap};

/// Platform whose reservations are size-flexible within a family.
pub const LINUX_UNIX: &str = "Linux/UNIX";

/// `ri_model` value for platforms where the per-model distinction is moot.
pub const IGNORED_MODEL: &str = "ignored";

pub const OPERATION_PLATFORMS: &[(&str, &str)] = &[
    ("RunInstances", LINUX_UNIX),
    ("RunInstances:0002", "Windows"),
    ("RunInstances:0010", "Red Hat Enterprise Linux"),
    ("RunInstances:000g", "SUSE Linux"),
    ("RunInstances:00g0", "Red Hat Enterprise Linux with HA"),
    ("RunInstances:0006", "Windows with SQL Server Standard"),
    ("RunInstances:0102", "Windows with SQL Server Enterprise"),
    ("RunInstances:0202", "Windows with SQL Server Web"),
    ("RunInstances:0004", "Linux with SQL Server Standard"),
    ("RunInstances:0100", "Linux with SQL Server Enterprise"),
    ("RunInstances:0200", "Linux with SQL Server Web"),
];

pub const NORMALIZATION_FACTORS: &[(&str, f64)] = &[
    ("nano", 0.25),
    ("micro", 0.5),
    ("small", 1.0),
    ("medium", 2.0),
    ("large", 4.0),
    ("xlarge", 8.0),
    ("2xlarge", 16.0),
    ("3xlarge", 24.0),
    ("4xlarge", 32.0),
    ("6xlarge", 48.0),
    ("8xlarge", 64.0),
    ("9xlarge", 72.0),
    ("10xlarge", 80.0),
    ("12xlarge", 96.0),
    ("16xlarge", 128.0),
    ("18xlarge", 144.0),
    ("24xlarge", 192.0),
    ("32xlarge", 256.0),
    ("48xlarge", 384.0),
];

/// Read-only lookup tables for one analysis run.
#[derive(Debug, Clone)]
pub struct LookupTables {
    platforms: HashMap<String, String>,
    factors: HashMap<String, f64>,
}

impl Default for LookupTables {
    fn default() -> Self {
        Self {
            platforms: OPERATION_PLATFORMS
                .iter()
                .map(|(op, platform)| (op.to_string(), platform.to_string()))
                .collect(),
            factors: NORMALIZATION_FACTORS
                .iter()
                .map(|(size, factor)| (size.to_string(), *factor))
                .collect(),
        }
    }
}

impl LookupTables {
    /// Built-in tables with configured entries layered on top.
    pub fn with_overrides(
        operation_platforms: &BTreeMap<String, String>,
        normalization_factors: &BTreeMap<String, f64>,
    ) -> Self {
        let mut tables = Self::default();
        for (op, platform) in operation_platforms {
            tables.platforms.insert(op.clone(), platform.clone());
        }
        for (size, factor) in normalization_factors {
            tables.factors.insert(size.clone(), *factor);
        }
        tables
    }

    pub fn platform_for_operation(&self, operation: &str) -> Option<&str> {
        self.platforms.get(operation.trim()).map(String::as_str)
    }

    pub fn normalization_factor(&self, size: &str) -> Option<f64> {
        self.factors.get(size).copied()
    }
}

pub fn is_linux_unix(platform: &str) -> bool {
    platform == LINUX_UNIX
}
