//! Metric time-series and benchmark evaluation.
//!
//! Buckets a date range into calendar weeks, assembles per-week values of a
//! KPI into an evaluated series (period-over-period change, favorability by
//! polarity, benchmark verdict, display string) and mean-combines entity
//! series for "all entities" views.

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod logging;
pub mod metric;
pub mod period;
pub mod registry;
pub mod series;
pub mod source;

pub use config::EngineConfig;
pub use engine::MetricsEngine;
pub use error::{EngineError, Result};
pub use evaluate::{BenchmarkSummary, Evaluation, Evaluator, Trend, ValueFormatter};
pub use metric::{MetricDefinition, Polarity, Unit, ValueRange};
pub use period::{Bucketer, DateRange, Period, TimeFrame, WeekStart};
pub use registry::MetricRegistry;
pub use series::{aggregate_mean, aggregate_mean_with_coverage, assemble_from_values, AggregatedValues, assemble_series, MetricSeries, PeriodValues, RecapRow, SeriesPoint};
pub use source::{FixtureSource, MetricSource, SourceKind, SyntheticSource};
