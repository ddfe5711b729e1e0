//! Instance type parsing
//!
//! Instance types come from three places: the `UsageType` billing code
//! (`CNN1-BoxUsage:c4.2xlarge`), the free-text `ItemDescription` of RI-covered
//! rows, and the subscription's `InstanceType`. All of them reduce to an
//! [`InstanceType`] so that both extractors build identical model keys.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceType {
    pub family: String,
    pub size: String,
}

impl InstanceType {
    /// Parse a clean `family.size` string such as `m4.xlarge`.
    pub fn parse(model: &str) -> Option<Self> {
        let (family, size) = model.trim().split_once('.')?;
        if family.is_empty() || size.is_empty() || size.contains('.') {
            return None;
        }
        Some(Self {
            family: family.to_string(),
            size: size.to_string(),
        })
    }

    /// Parse the model out of a usage type code: everything after the first `:`.
    pub fn from_usage_type(usage_type: &str) -> Option<Self> {
        let (_, model) = usage_type.split_once(':')?;
        Self::parse(model)
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.family, self.size)
    }
}

fn description_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // family letter, generation digit, optional class letters, then the size token
    PATTERN.get_or_init(|| {
        Regex::new(r"\b([a-z]\d[a-z]*)\.(\w+)\b").expect("reserved model pattern is valid")
    })
}

/// Extract the reserved instance type from an RI-covered item description,
/// e.g. `CNY 0.0 per Linux/UNIX (Amazon VPC), c4.4xlarge reserved instance applied`.
///
/// Returns `None` when the text carries no recognizable model; callers fall
/// back to the usage type's own model.
pub fn reserved_model_from_description(description: &str) -> Option<InstanceType> {
    let captures = description_pattern().captures(description)?;
    Some(InstanceType {
        family: captures.get(1)?.as_str().to_string(),
        size: captures.get(2)?.as_str().to_string(),
    })
}
