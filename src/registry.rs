//! Read-only catalogue of metric definitions, validated once at load.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::logging::{log, log_rejected, obj, v_str, Domain, Level};
use crate::metric::{MetricDefinition, Polarity, Unit, ValueRange};

/// On-disk shape; the unit stays a string until the definition is checked so
/// an unknown unit surfaces as `UnsupportedUnit` rather than a parse error.
#[derive(Debug, Deserialize)]
struct RawDefinition {
    key: String,
    display_name: String,
    #[serde(default, alias = "formula")]
    description: String,
    unit: String,
    benchmark: f64,
    polarity: Polarity,
    #[serde(default)]
    value_range: Option<ValueRange>,
}

impl RawDefinition {
    fn into_definition(self) -> Result<MetricDefinition> {
        Ok(MetricDefinition {
            unit: self.unit.parse::<Unit>()?,
            key: self.key,
            display_name: self.display_name,
            description: self.description,
            benchmark: self.benchmark,
            polarity: self.polarity,
            value_range: self.value_range,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    definitions: Vec<MetricDefinition>,
    index: HashMap<String, usize>,
}

impl MetricRegistry {
    pub fn from_definitions(definitions: Vec<MetricDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            def.validate()?;
            if index.insert(def.key.clone(), i).is_some() {
                return Err(EngineError::DuplicateDefinition(def.key.clone()));
            }
        }
        Ok(Self { definitions, index })
    }

    /// Parse a JSON array of definitions.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: Vec<RawDefinition> = serde_json::from_str(json)?;
        let definitions = raw
            .into_iter()
            .map(RawDefinition::into_definition)
            .collect::<Result<Vec<_>>>()?;
        Self::from_definitions(definitions)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let registry = Self::from_json_str(&raw)?;
        log(
            Level::Info,
            Domain::Registry,
            "loaded",
            obj(&[
                ("path", v_str(&path.to_string_lossy())),
                ("metrics", serde_json::json!(registry.len())),
            ]),
        );
        Ok(registry)
    }

    pub fn get(&self, key: &str) -> Result<&MetricDefinition> {
        match self.index.get(key) {
            Some(&i) => Ok(&self.definitions[i]),
            None => {
                log_rejected(Domain::Registry, "missing_definition", key);
                Err(EngineError::MissingDefinition(key.to_string()))
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Definitions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.definitions)?)
    }

    /// Company-level KPI catalogue used when no registry file is configured.
    pub fn builtin() -> Self {
        use Polarity::{HigherIsBetter as Higher, LowerIsBetter as Lower};
        let defs = vec![
            MetricDefinition::new("cac", "Customer Acquisition Cost (CAC)", Unit::Currency, 200.0, Lower)
                .with_description("(Sales + Marketing Spend) / New Customers")
                .with_range(0.0, 1000.0),
            MetricDefinition::new("ltv", "Customer Lifetime Value (LTV)", Unit::Currency, 100_000.0, Higher)
                .with_description("Average Purchase x Number of Purchases x Retention Period")
                .with_range(0.0, 200_000.0),
            MetricDefinition::new("cac_ratio", "CAC Ratio (LTV:CAC)", Unit::Ratio, 3.0, Higher)
                .with_description("LTV / CAC")
                .with_range(0.0, 10.0),
            MetricDefinition::new("profit_ratio", "Profit Allocation Ratio", Unit::Percentage, 10.0, Higher)
                .with_description("(Profit Allocated / Total Revenue) x 100")
                .with_range(0.0, 100.0),
            MetricDefinition::new("revenue_growth", "Revenue Growth Rate", Unit::Percentage, 20.0, Higher)
                .with_description("(Current Revenue - Previous Revenue) / Previous Revenue x 100")
                .with_range(-20.0, 100.0),
            MetricDefinition::new("operating_cash_flow", "Operating Cash Flow", Unit::Currency, 0.0, Higher)
                .with_description("Operating inflows - operating outflows")
                .with_range(-50_000.0, 200_000.0),
            MetricDefinition::new("net_profit_margin", "Net Profit Margin", Unit::Percentage, 10.0, Higher)
                .with_description("(Net Profit / Total Revenue) x 100")
                .with_range(-20.0, 40.0),
            MetricDefinition::new("operating_margin", "Operating Margin", Unit::Percentage, 20.0, Higher)
                .with_description("(Revenue - Operating Expenses) / Revenue x 100")
                .with_range(-10.0, 50.0),
            MetricDefinition::new("contractor_efficiency", "Contractor Efficiency Ratio", Unit::Currency, 100_000.0, Higher)
                .with_description("Revenue / Number of Contractors")
                .with_range(0.0, 200_000.0),
            MetricDefinition::new("incentive_comp", "Incentive-Based Compensation", Unit::Percentage, 30.0, Higher)
                .with_description("(Incentive Compensation / Total Wages) x 100")
                .with_range(0.0, 100.0),
            MetricDefinition::new("demo_conversion", "Demo-to-Contract Conversion Rate", Unit::Percentage, 20.0, Higher)
                .with_description("(Contracts Signed / Demo Calls Completed) x 100")
                .with_range(0.0, 100.0),
            MetricDefinition::new("acv", "Average Contract Value (ACV)", Unit::Currency, 20_000.0, Higher)
                .with_description("Total Contract Value / Contracts Signed")
                .with_range(0.0, 50_000.0),
            MetricDefinition::new("mrr_growth", "Monthly Recurring Revenue Growth", Unit::Percentage, 10.0, Higher)
                .with_description("(Current MRR - Previous MRR) / Previous MRR x 100")
                .with_range(-20.0, 50.0),
            MetricDefinition::new("demo_booking_rate", "Demo Call Booking Rate", Unit::Percentage, 80.0, Higher)
                .with_description("(Demo Calls Booked / Discovery Calls Completed) x 100")
                .with_range(0.0, 100.0),
            MetricDefinition::new("time_to_close", "Time to Close", Unit::DayCount, 60.0, Lower)
                .with_description("Average days from discovery call to contract signing")
                .with_range(0.0, 120.0),
            MetricDefinition::new("churn_rate", "Customer Churn Rate", Unit::Percentage, 5.0, Lower)
                .with_description("(Customers Lost / Customers at Start) x 100")
                .with_range(0.0, 20.0),
            MetricDefinition::new("mttr", "Mean Time to Recovery (MTTR)", Unit::CustomSuffix(" hours".to_string()), 1.0, Lower)
                .with_description("Average time to resolve incidents")
                .with_range(0.0, 4.0),
            MetricDefinition::new("deployment_frequency", "Deployment Frequency", Unit::PlainCount, 20.0, Higher)
                .with_description("Deployments per month")
                .with_range(0.0, 40.0),
        ];
        // Static catalogue; validated by test_builtin_is_valid.
        let index = defs.iter().enumerate().map(|(i, d)| (d.key.clone(), i)).collect();
        Self { definitions: defs, index }
    }
}
