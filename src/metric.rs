//! Metric definitions: what a KPI is, how it is judged and how it prints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Whether lower or higher values are the better outcome.
///
/// Always declared explicitly on a definition; never inferred from the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

/// Closed set of display units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Unit {
    Percentage,
    Currency,
    Ratio,
    DayCount,
    PlainCount,
    /// Two decimals followed by a free-form suffix, e.g. `" hours"`.
    CustomSuffix(String),
}

impl Unit {
    /// Whole-number units; synthetic values for these are rounded.
    pub fn is_count(&self) -> bool {
        matches!(self, Unit::DayCount | Unit::PlainCount)
    }
}

impl FromStr for Unit {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" | "%" => Ok(Unit::Percentage),
            "currency" | "$" => Ok(Unit::Currency),
            "ratio" => Ok(Unit::Ratio),
            "day_count" | "days" => Ok(Unit::DayCount),
            "plain_count" | "count" => Ok(Unit::PlainCount),
            other => match other.strip_prefix("suffix:") {
                Some(suffix) if !suffix.is_empty() => Ok(Unit::CustomSuffix(suffix.to_string())),
                _ => Err(EngineError::UnsupportedUnit(other.to_string())),
            },
        }
    }
}

impl TryFrom<String> for Unit {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.to_string()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Percentage => f.write_str("percentage"),
            Unit::Currency => f.write_str("currency"),
            Unit::Ratio => f.write_str("ratio"),
            Unit::DayCount => f.write_str("day_count"),
            Unit::PlainCount => f.write_str("plain_count"),
            Unit::CustomSuffix(suffix) => write!(f, "suffix:{}", suffix),
        }
    }
}

/// Chart axis bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Static, immutable description of one KPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub key: String,
    pub display_name: String,
    /// Explanatory text or formula; opaque to the engine.
    #[serde(default)]
    pub description: String,
    pub unit: Unit,
    pub benchmark: f64,
    pub polarity: Polarity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_range: Option<ValueRange>,
}

impl MetricDefinition {
    pub fn new(key: &str, display_name: &str, unit: Unit, benchmark: f64, polarity: Polarity) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            description: String::new(),
            unit,
            benchmark,
            polarity,
            value_range: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.value_range = Some(ValueRange { min, max });
        self
    }

    /// Check the invariants a definition must hold before it is shared.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: &str| EngineError::InvalidDefinition {
            key: self.key.clone(),
            reason: reason.to_string(),
        };
        if self.key.trim().is_empty() {
            return Err(invalid("empty key"));
        }
        if self.display_name.trim().is_empty() {
            return Err(invalid("empty display name"));
        }
        if !self.benchmark.is_finite() {
            return Err(invalid("benchmark must be finite"));
        }
        if let Some(range) = self.value_range {
            if !range.min.is_finite() || !range.max.is_finite() || range.min >= range.max {
                return Err(invalid("value range requires finite min < max"));
            }
        }
        Ok(())
    }
}
