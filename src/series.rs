//! Series assembly: periods + resolved values -> evaluated points.
//!
//! The previous-value carry lives inside one `assemble_series` call. Nothing
//! is shared between series, so independent metrics and entities can be
//! assembled in any order or in parallel with identical results.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::evaluate::{BenchmarkSummary, Evaluator, Trend};
use crate::logging::{log, log_rejected, obj, v_str, Domain, Level};
use crate::metric::MetricDefinition;
use crate::period::Period;

/// Resolved raw values keyed by period start date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodValues(BTreeMap<NaiveDate, f64>);

impl PeriodValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, period_start: NaiveDate, value: f64) {
        self.0.insert(period_start, value);
    }

    pub fn get(&self, period_start: NaiveDate) -> Option<f64> {
        self.0.get(&period_start).copied()
    }

    pub fn value_for(&self, period: &Period) -> Option<f64> {
        self.get(period.start_date)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.0.iter().map(|(d, v)| (*d, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(NaiveDate, f64)> for PeriodValues {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One (period x metric) observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint<'p> {
    pub period: &'p Period,
    pub raw_value: f64,
    pub previous_value: Option<f64>,
    pub percent_change: Option<f64>,
    pub is_favorable: Option<bool>,
    pub meets_benchmark: bool,
    pub trend: Trend,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries<'p> {
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    pub points: Vec<SeriesPoint<'p>>,
}

impl<'p> MetricSeries<'p> {
    pub fn with_entity(mut self, entity: &str) -> Self {
        self.entity = Some(entity.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&SeriesPoint<'p>> {
        self.points.last()
    }

    pub fn raw_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.raw_value).collect()
    }

    /// SHA-256 over (period start, raw value) pairs, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.metric.as_bytes());
        for p in &self.points {
            hasher.update(p.period.start_date.to_string().as_bytes());
            hasher.update(p.raw_value.to_bits().to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn summary(&self, evaluator: &Evaluator, def: &MetricDefinition) -> Option<BenchmarkSummary> {
        evaluator.summarize(def, &self.raw_values())
    }

    /// Current-vs-previous row for tabular views; absent for an empty series.
    pub fn recap(&self, evaluator: &Evaluator, def: &MetricDefinition) -> Option<RecapRow> {
        let latest = self.latest()?;
        let formatter = evaluator.formatter();
        Some(RecapRow {
            metric: def.key.clone(),
            display_name: def.display_name.clone(),
            entity: self.entity.clone(),
            period: latest.period.label.clone(),
            current: latest.raw_value,
            previous: latest.previous_value,
            current_display: latest.display.clone(),
            previous_display: latest
                .previous_value
                .map(|v| formatter.format(&def.unit, v))
                .unwrap_or_else(|| "N/A".to_string()),
            percent_change: latest.percent_change,
            is_favorable: latest.is_favorable,
            meets_benchmark: latest.meets_benchmark,
            trend: latest.trend,
            sparkline: self.raw_values(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecapRow {
    pub metric: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    pub period: String,
    pub current: f64,
    pub previous: Option<f64>,
    pub current_display: String,
    pub previous_display: String,
    pub percent_change: Option<f64>,
    pub is_favorable: Option<bool>,
    pub meets_benchmark: bool,
    pub trend: Trend,
    pub sparkline: Vec<f64>,
}

/// Evaluate one value per period, in period order.
///
/// A period the source has no value for, or a non-finite value, fails the
/// whole assembly; nothing is defaulted to zero.
pub fn assemble_series<'p, F>(
    evaluator: &Evaluator,
    def: &MetricDefinition,
    periods: &'p [Period],
    mut value_source: F,
) -> Result<MetricSeries<'p>>
where
    F: FnMut(&Period) -> Option<f64>,
{
    let mut points = Vec::with_capacity(periods.len());
    let mut previous: Option<f64> = None;
    for period in periods {
        let raw = match value_source(period) {
            Some(v) if v.is_finite() => v,
            Some(v) => {
                log_rejected(Domain::Assemble, "non_finite_value", &period.to_string());
                return Err(EngineError::NonFiniteValue {
                    metric: def.key.clone(),
                    period: period.to_string(),
                    value: v,
                });
            }
            None => {
                log_rejected(Domain::Assemble, "missing_value", &period.to_string());
                return Err(EngineError::MissingValue {
                    metric: def.key.clone(),
                    period: period.to_string(),
                });
            }
        };
        let eval = evaluator.evaluate(def, raw, previous);
        points.push(SeriesPoint {
            period,
            raw_value: raw,
            previous_value: previous,
            percent_change: eval.percent_change,
            is_favorable: eval.is_favorable,
            meets_benchmark: eval.meets_benchmark,
            trend: eval.trend,
            display: eval.display,
        });
        previous = Some(raw);
    }
    log(
        Level::Debug,
        Domain::Assemble,
        "assembled",
        obj(&[
            ("metric", v_str(&def.key)),
            ("points", serde_json::json!(points.len())),
        ]),
    );
    Ok(MetricSeries {
        metric: def.key.clone(),
        entity: None,
        points,
    })
}

/// [`assemble_series`] over an already-resolved mapping.
pub fn assemble_from_values<'p>(
    evaluator: &Evaluator,
    def: &MetricDefinition,
    periods: &'p [Period],
    values: &PeriodValues,
) -> Result<MetricSeries<'p>> {
    assemble_series(evaluator, def, periods, |p| values.value_for(p))
}

/// Per-period mean over several entities, with how many entities fed each period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedValues {
    pub values: PeriodValues,
    pub contributors: BTreeMap<NaiveDate, usize>,
    pub entities: usize,
}

impl AggregatedValues {
    /// Period starts whose mean covers fewer than all entities.
    pub fn partial_periods(&self) -> Vec<NaiveDate> {
        self.contributors
            .iter()
            .filter(|(_, n)| **n < self.entities)
            .map(|(d, _)| *d)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.contributors.values().all(|n| *n == self.entities)
    }
}

/// Combine per-entity series into one: the arithmetic mean per period.
///
/// Each period averages the entities that report it; a period no entity
/// reports is left out rather than zero-filled. Use
/// [`aggregate_mean_with_coverage`] to tell partial means apart.
pub fn aggregate_mean(series_per_entity: &[PeriodValues]) -> PeriodValues {
    aggregate_mean_with_coverage(series_per_entity).values
}

pub fn aggregate_mean_with_coverage(series_per_entity: &[PeriodValues]) -> AggregatedValues {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for series in series_per_entity {
        for (date, value) in series.iter() {
            let slot = sums.entry(date).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }
    }
    let contributors = sums.iter().map(|(date, (_, n))| (*date, *n)).collect();
    let values = sums
        .into_iter()
        .map(|(date, (sum, n))| (date, sum / n as f64))
        .collect();
    AggregatedValues {
        values,
        contributors,
        entities: series_per_entity.len(),
    }
}
