//! Value sources: where raw metric values come from.
//!
//! Sources are resolved before assembly so the engine itself stays
//! synchronous. `SyntheticSource` stands in for a real metrics store;
//! `FixtureSource` replays recorded values from a JSON file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::metric::MetricDefinition;
use crate::period::Period;
use crate::series::PeriodValues;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    Fixture,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "synthetic" => Ok(SourceKind::Synthetic),
            "fixture" => Ok(SourceKind::Fixture),
            other => Err(format!("unknown metric source: {}", other)),
        }
    }
}

impl SourceKind {
    pub fn build(self, cfg: &EngineConfig) -> Result<Box<dyn MetricSource>> {
        match self {
            SourceKind::Synthetic => Ok(Box::new(SyntheticSource::new(
                cfg.synthetic_seed,
                cfg.synthetic_spread,
            ))),
            SourceKind::Fixture => Ok(Box::new(FixtureSource::load(Path::new(&cfg.fixture_path))?)),
        }
    }
}

#[async_trait]
pub trait MetricSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw value of `metric` for `entity` over `period`, if recorded.
    async fn fetch(&self, metric: &MetricDefinition, entity: &str, period: &Period) -> Result<Option<f64>>;
}

/// Deterministic pseudo-random values bounded around the benchmark.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    seed: u64,
    spread: f64,
}

impl SyntheticSource {
    pub fn new(seed: u64, spread: f64) -> Self {
        Self {
            seed,
            spread: spread.abs(),
        }
    }

    /// Same (seed, metric, entity, period) always yields the same value.
    ///
    /// Bounds that cannot be sampled (non-finite, inverted, or wider than
    /// `f64` can span) fall back to the benchmark itself.
    pub fn sample(&self, metric: &MetricDefinition, entity: &str, period: &Period) -> f64 {
        let value = match self.bounds(metric) {
            Some((lo, hi)) => {
                let mut rng = StdRng::seed_from_u64(self.derive_seed(&metric.key, entity, period));
                rng.gen_range(lo..=hi)
            }
            None => {
                log(
                    Level::Warn,
                    Domain::Source,
                    "unsampleable_bounds",
                    obj(&[("metric", v_str(&metric.key)), ("benchmark", v_num(metric.benchmark))]),
                );
                metric.benchmark
            }
        };
        if metric.unit.is_count() {
            value.round()
        } else {
            value
        }
    }

    fn bounds(&self, metric: &MetricDefinition) -> Option<(f64, f64)> {
        let (lo, hi) = match metric.value_range {
            Some(range) => (range.min, range.max),
            None if metric.benchmark == 0.0 => (-self.spread, self.spread),
            None => {
                let a = metric.benchmark * (1.0 - self.spread);
                let z = metric.benchmark * (1.0 + self.spread);
                (a.min(z), a.max(z))
            }
        };
        let sampleable = lo.is_finite() && hi.is_finite() && lo <= hi && (hi - lo).is_finite();
        sampleable.then_some((lo, hi))
    }

    fn derive_seed(&self, metric: &str, entity: &str, period: &Period) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(metric.as_bytes());
        hasher.update([0u8]);
        hasher.update(entity.as_bytes());
        hasher.update([0u8]);
        hasher.update(period.start_date.to_string().as_bytes());
        let digest = hasher.finalize();
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(buf)
    }
}

#[async_trait]
impl MetricSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn fetch(&self, metric: &MetricDefinition, entity: &str, period: &Period) -> Result<Option<f64>> {
        Ok(Some(self.sample(metric, entity, period)))
    }
}

/// Recorded values: `{ metric_key: { entity: { "YYYY-MM-DD": value } } }`,
/// dates being period start dates.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    values: HashMap<String, HashMap<String, PeriodValues>>,
}

impl FixtureSource {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let values = serde_json::from_str(json).context("parse metric fixture")?;
        Ok(Self { values })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read metric fixture {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn entities(&self, metric: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .values
            .get(metric)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[async_trait]
impl MetricSource for FixtureSource {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn fetch(&self, metric: &MetricDefinition, entity: &str, period: &Period) -> Result<Option<f64>> {
        Ok(self
            .values
            .get(&metric.key)
            .and_then(|by_entity| by_entity.get(entity))
            .and_then(|series| series.value_for(period)))
    }
}

/// Fetch every period for one entity. Periods without a value are left out.
pub async fn resolve_values(
    source: &dyn MetricSource,
    metric: &MetricDefinition,
    entity: &str,
    periods: &[Period],
) -> Result<PeriodValues> {
    let mut values = PeriodValues::new();
    for period in periods {
        if let Some(v) = source.fetch(metric, entity, period).await? {
            values.insert(period.start_date, v);
        }
    }
    log(
        Level::Debug,
        Domain::Source,
        "resolved",
        obj(&[
            ("source", v_str(source.name())),
            ("metric", v_str(&metric.key)),
            ("entity", v_str(entity)),
            ("periods", serde_json::json!(periods.len())),
            ("values", serde_json::json!(values.len())),
        ]),
    );
    Ok(values)
}

/// Resolve several entities concurrently; output follows `entities` order.
pub async fn resolve_entities(
    source: &dyn MetricSource,
    metric: &MetricDefinition,
    entities: &[String],
    periods: &[Period],
) -> Result<Vec<(String, PeriodValues)>> {
    let pending = entities.iter().map(|entity| async move {
        let values = resolve_values(source, metric, entity, periods).await?;
        Ok::<_, anyhow::Error>((entity.clone(), values))
    });
    try_join_all(pending).await
}
