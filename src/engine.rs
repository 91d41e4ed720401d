//! `MetricsEngine`: one registry, one week convention, one formatter.
//!
//! Presentation layers hold a single engine and call it on every date-range
//! or metric change; nothing computed is cached between calls.

use chrono::NaiveDate;
use std::path::Path;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::evaluate::{BenchmarkSummary, Evaluation, Evaluator, ValueFormatter};
use crate::logging::{log, log_audit, obj, v_str, Domain, Level, ProfileScope};
use crate::metric::MetricDefinition;
use crate::period::{Bucketer, Period, TimeFrame};
use crate::registry::MetricRegistry;
use crate::series::{self, AggregatedValues, MetricSeries, PeriodValues, RecapRow};
use crate::source::{resolve_entities, MetricSource};

pub struct MetricsEngine {
    config: EngineConfig,
    registry: MetricRegistry,
    bucketer: Bucketer,
    evaluator: Evaluator,
}

impl MetricsEngine {
    pub fn new(config: EngineConfig, registry: MetricRegistry) -> Self {
        let bucketer = Bucketer::new(config.week_start);
        let evaluator = Evaluator::new(ValueFormatter::new(
            config.currency_grouping,
            &config.ratio_suffix,
        ));
        Self {
            config,
            registry,
            bucketer,
            evaluator,
        }
    }

    /// Registry from `registry_path` when set, otherwise the built-in catalogue.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let registry = match &config.registry_path {
            Some(path) => MetricRegistry::load(Path::new(path))?,
            None => MetricRegistry::builtin(),
        };
        log(
            Level::Info,
            Domain::System,
            "engine_ready",
            obj(&[
                ("metrics", serde_json::json!(registry.len())),
                ("week_start", serde_json::json!(config.week_start)),
                ("registry", v_str(config.registry_path.as_deref().unwrap_or("builtin"))),
            ]),
        );
        Ok(Self::new(config, registry))
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn definition(&self, key: &str) -> Result<&MetricDefinition> {
        self.registry.get(key)
    }

    pub fn default_time_frame(&self) -> TimeFrame {
        TimeFrame::LastWeeks(self.config.lookback_weeks)
    }

    pub fn bucketize(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Period>> {
        self.bucketer.bucketize(start, end)
    }

    pub fn periods_for(&self, frame: &TimeFrame, today: NaiveDate) -> Result<Vec<Period>> {
        self.bucketer.bucketize_range(&frame.resolve(today)?)
    }

    pub fn evaluate(&self, key: &str, current: f64, previous: Option<f64>) -> Result<Evaluation> {
        let def = self.registry.get(key)?;
        Ok(self.evaluator.evaluate(def, current, previous))
    }

    pub fn format(&self, key: &str, value: f64) -> Result<String> {
        let def = self.registry.get(key)?;
        Ok(self.evaluator.formatter().format(&def.unit, value))
    }

    pub fn assemble_series<'p>(
        &self,
        key: &str,
        periods: &'p [Period],
        values: &PeriodValues,
    ) -> Result<MetricSeries<'p>> {
        self.assemble_with(key, periods, |p| values.value_for(p))
    }

    /// Assemble from a per-period lookup; both assembly paths audit the result.
    pub fn assemble_with<'p, F>(&self, key: &str, periods: &'p [Period], value_source: F) -> Result<MetricSeries<'p>>
    where
        F: FnMut(&Period) -> Option<f64>,
    {
        let def = self.registry.get(key)?;
        let _scope = ProfileScope::with_context("assemble_series", &[("metric", v_str(key))]);
        let series = series::assemble_series(&self.evaluator, def, periods, value_source)?;
        log_audit("assembled", key, "", &series.digest(), series.len());
        Ok(series)
    }

    pub fn aggregate_mean(&self, series_per_entity: &[PeriodValues]) -> PeriodValues {
        series::aggregate_mean(series_per_entity)
    }

    pub fn summary(&self, key: &str, series: &MetricSeries<'_>) -> Result<Option<BenchmarkSummary>> {
        let def = self.registry.get(key)?;
        Ok(series.summary(&self.evaluator, def))
    }

    pub fn recap(&self, key: &str, series: &MetricSeries<'_>) -> Result<Option<RecapRow>> {
        let def = self.registry.get(key)?;
        Ok(series.recap(&self.evaluator, def))
    }

    /// Resolve one metric for every entity, then mean-combine.
    ///
    /// Periods averaged over fewer than all entities are logged and listed in
    /// the returned coverage.
    pub async fn resolve_combined(
        &self,
        source: &dyn MetricSource,
        key: &str,
        entities: &[String],
        periods: &[Period],
    ) -> anyhow::Result<AggregatedValues> {
        let def = self.registry.get(key)?;
        let _scope = ProfileScope::new("resolve_combined");
        let per_entity = resolve_entities(source, def, entities, periods).await?;
        let values: Vec<PeriodValues> = per_entity.into_iter().map(|(_, v)| v).collect();
        let combined = series::aggregate_mean_with_coverage(&values);
        let partial = combined.partial_periods();
        if !partial.is_empty() {
            log(
                Level::Warn,
                Domain::Assemble,
                "partial_mean",
                obj(&[
                    ("metric", v_str(key)),
                    ("entities", serde_json::json!(combined.entities)),
                    ("partial_periods", serde_json::json!(partial)),
                ]),
            );
        }
        Ok(combined)
    }
}
